// src/dag/script.rs

//! Versioned command grammar for generated post-processing scripts.
//!
//! The rendered script is treated as a serialization format: `render`
//! followed by `parse` reproduces the operation list exactly. The grammar
//! is one operation per line:
//!
//! ```text
//! merge --format <fmt> [--no-merge] [--no-gzip] --out-dir <dir> <inputs...>
//! rm -f <files...>
//! archive --indir <dir>
//! ```
//!
//! Blank lines, the shebang and `#` comments are ignored when parsing.

use std::fmt::Write as _;
use std::path::PathBuf;
use std::str::FromStr;

use crate::types::OutputFormat;

/// Grammar version recorded in every rendered script.
pub const SCRIPT_GRAMMAR_VERSION: u32 = 1;

/// One shell-level operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptOp {
    /// Merge per-chunk trigger files of one channel and format. With
    /// `no_merge` the files are validated and forwarded untouched.
    Merge {
        format: OutputFormat,
        no_merge: bool,
        no_gzip: bool,
        out_dir: PathBuf,
        inputs: Vec<PathBuf>,
    },
    /// Remove intermediate files.
    Remove { files: Vec<PathBuf> },
    /// Archive everything below `in_dir`.
    Archive { in_dir: PathBuf },
}

/// Render a script with a comment header and one line per operation.
pub fn render(header: &[String], ops: &[ScriptOp]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "#!/bin/bash -e");
    let _ = writeln!(out, "# trigflow script grammar v{SCRIPT_GRAMMAR_VERSION}");
    for line in header {
        let _ = writeln!(out, "# {line}");
    }
    let _ = writeln!(out);
    for op in ops {
        let _ = writeln!(out, "{}", render_op(op));
    }
    out
}

fn render_op(op: &ScriptOp) -> String {
    match op {
        ScriptOp::Merge {
            format,
            no_merge,
            no_gzip,
            out_dir,
            inputs,
        } => {
            let mut line = format!("merge --format {format}");
            if *no_merge {
                line.push_str(" --no-merge");
            }
            if *no_gzip {
                line.push_str(" --no-gzip");
            }
            let _ = write!(line, " --out-dir {}", out_dir.display());
            for input in inputs {
                let _ = write!(line, " {}", input.display());
            }
            line
        }
        ScriptOp::Remove { files } => {
            let mut line = "rm -f".to_string();
            for f in files {
                let _ = write!(line, " {}", f.display());
            }
            line
        }
        ScriptOp::Archive { in_dir } => format!("archive --indir {}", in_dir.display()),
    }
}

/// Parse a rendered script back into its operation list.
pub fn parse(text: &str) -> Result<Vec<ScriptOp>, String> {
    let mut ops = Vec::new();
    for (n, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        ops.push(parse_op(line).map_err(|e| format!("line {}: {e}", n + 1))?);
    }
    Ok(ops)
}

fn parse_op(line: &str) -> Result<ScriptOp, String> {
    let mut words = line.split_whitespace();
    match words.next() {
        Some("merge") => parse_merge(words),
        Some("rm") => {
            let rest: Vec<&str> = words.collect();
            match rest.split_first() {
                Some((&"-f", files)) => Ok(ScriptOp::Remove {
                    files: files.iter().map(PathBuf::from).collect(),
                }),
                _ => Err("rm requires -f".to_string()),
            }
        }
        Some("archive") => {
            let rest: Vec<&str> = words.collect();
            match rest.as_slice() {
                ["--indir", dir] => Ok(ScriptOp::Archive {
                    in_dir: PathBuf::from(dir),
                }),
                _ => Err("archive requires --indir <dir>".to_string()),
            }
        }
        Some(other) => Err(format!("unknown operation '{other}'")),
        None => Err("empty operation".to_string()),
    }
}

fn parse_merge<'a>(words: impl Iterator<Item = &'a str>) -> Result<ScriptOp, String> {
    let mut format = None;
    let mut no_merge = false;
    let mut no_gzip = false;
    let mut out_dir = None;
    let mut inputs = Vec::new();

    let mut words = words.peekable();
    while let Some(word) = words.next() {
        match word {
            "--format" => {
                let value = words.next().ok_or("--format requires a value")?;
                format = Some(OutputFormat::from_str(value)?);
            }
            "--no-merge" => no_merge = true,
            "--no-gzip" => no_gzip = true,
            "--out-dir" => {
                let value = words.next().ok_or("--out-dir requires a value")?;
                out_dir = Some(PathBuf::from(value));
            }
            path => inputs.push(PathBuf::from(path)),
        }
    }

    Ok(ScriptOp::Merge {
        format: format.ok_or("merge requires --format")?,
        no_merge,
        no_gzip,
        out_dir: out_dir.ok_or("merge requires --out-dir")?,
        inputs,
    })
}
