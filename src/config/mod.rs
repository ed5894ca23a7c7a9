// src/config/mod.rs

//! Configuration loading, validation and per-run request assembly.
//!
//! - [`model`] maps the TOML file (one `[group.<name>]` table per
//!   processing group) onto plain data types.
//! - [`loader`] reads and deserializes the file.
//! - [`validate`] turns a [`model::RawConfigFile`] into a checked
//!   [`model::ConfigFile`].
//! - [`request`] combines one group section with CLI arguments into the
//!   immutable [`request::ProcessingRequest`] passed through every
//!   component of a run.

pub mod loader;
pub mod model;
pub mod request;
pub mod validate;

pub use loader::{load_and_validate, load_from_path};
pub use model::{ConfigFile, GroupConfig, RawConfigFile, StatePadding};
pub use request::{MergePolicy, ProcessingRequest, RunDirs, StatePredicate};
