// src/segments/algebra.rs

//! Closed-open integer-interval primitives.
//!
//! A [`Segment`] is `[start, end)` in GPS seconds; a [`SegmentList`] is an
//! ordered, coalesced, non-overlapping sequence of them supporting set
//! algebra. Overlapping or touching segments are merged on insertion, so
//! for all adjacent pairs `segs[i].end < segs[i+1].start` holds.

use std::fmt;

/// Half-open interval `[start, end)`. Invariant: `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Segment {
    pub start: u64,
    pub end: u64,
}

impl Segment {
    pub fn new(start: u64, end: u64) -> Self {
        assert!(start <= end, "segment start {start} is after end {end}");
        Self { start, end }
    }

    pub fn duration(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn contains(&self, t: u64) -> bool {
        self.start <= t && t < self.end
    }

    pub fn intersects(&self, other: &Segment) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn intersection(&self, other: &Segment) -> Option<Segment> {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        if start < end {
            Some(Segment::new(start, end))
        } else {
            None
        }
    }

    /// Shrink by `pad` on both sides; `None` when nothing would remain.
    pub fn contract(&self, pad: u64) -> Option<Segment> {
        if self.duration() > 2 * pad {
            Some(Segment::new(self.start + pad, self.end - pad))
        } else {
            None
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// Ordered, coalesced, non-overlapping segment sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SegmentList {
    segs: Vec<Segment>,
}

impl SegmentList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a segment, merging it with any segments it overlaps or
    /// touches. Empty segments are dropped.
    pub fn insert(&mut self, seg: Segment) {
        if seg.is_empty() {
            return;
        }

        // Position of the first existing segment that could merge with `seg`
        // (overlapping or touching from the left).
        let lo = self.segs.partition_point(|s| s.end < seg.start);
        // One past the last segment that could merge with `seg`.
        let hi = self.segs.partition_point(|s| s.start <= seg.end);

        if lo == hi {
            self.segs.insert(lo, seg);
            return;
        }

        let merged = Segment::new(
            seg.start.min(self.segs[lo].start),
            seg.end.max(self.segs[hi - 1].end),
        );
        self.segs.splice(lo..hi, std::iter::once(merged));
    }

    pub fn union(&self, other: &SegmentList) -> SegmentList {
        let mut out = self.clone();
        for seg in other.iter() {
            out.insert(*seg);
        }
        out
    }

    pub fn intersect(&self, other: &SegmentList) -> SegmentList {
        let mut out = Vec::new();
        let (mut i, mut j) = (0, 0);
        while i < self.segs.len() && j < other.segs.len() {
            if let Some(seg) = self.segs[i].intersection(&other.segs[j]) {
                out.push(seg);
            }
            // Advance whichever list ends first.
            if self.segs[i].end <= other.segs[j].end {
                i += 1;
            } else {
                j += 1;
            }
        }
        SegmentList { segs: out }
    }

    pub fn subtract(&self, other: &SegmentList) -> SegmentList {
        let mut out = SegmentList::new();
        for seg in self.iter() {
            let mut cursor = seg.start;
            for hole in other.iter() {
                if hole.end <= cursor {
                    continue;
                }
                if hole.start >= seg.end {
                    break;
                }
                if hole.start > cursor {
                    out.insert(Segment::new(cursor, hole.start.min(seg.end)));
                }
                cursor = cursor.max(hole.end);
                if cursor >= seg.end {
                    break;
                }
            }
            if cursor < seg.end {
                out.insert(Segment::new(cursor, seg.end));
            }
        }
        out
    }

    /// Smallest segment covering the whole list, `None` when empty.
    pub fn extent(&self) -> Option<Segment> {
        match (self.segs.first(), self.segs.last()) {
            (Some(first), Some(last)) => Some(Segment::new(first.start, last.end)),
            _ => None,
        }
    }

    /// Sum of segment durations.
    pub fn total_duration(&self) -> u64 {
        self.segs.iter().map(Segment::duration).sum()
    }

    /// Contract every segment by `pad` on both sides, dropping segments
    /// that would not survive.
    pub fn contract(&self, pad: u64) -> SegmentList {
        SegmentList {
            segs: self.segs.iter().filter_map(|s| s.contract(pad)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.segs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segs.is_empty()
    }

    pub fn first(&self) -> Option<&Segment> {
        self.segs.first()
    }

    pub fn last(&self) -> Option<&Segment> {
        self.segs.last()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Segment> {
        self.segs.iter()
    }

    /// Serialize as one `start end` line per segment, the same format used
    /// by the watermark record.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for seg in self.iter() {
            out.push_str(&format!("{} {}\n", seg.start, seg.end));
        }
        out
    }

    /// Parse the `start end` per-line format; blank lines and `#` comments
    /// are ignored.
    pub fn parse_text(text: &str) -> Result<SegmentList, String> {
        let mut list = SegmentList::new();
        for (n, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut parts = line.split_whitespace();
            let (start, end) = match (parts.next(), parts.next()) {
                (Some(a), Some(b)) => (a, b),
                _ => return Err(format!("line {}: expected 'start end'", n + 1)),
            };
            let start: u64 = start
                .parse()
                .map_err(|e| format!("line {}: bad start: {e}", n + 1))?;
            let end: u64 = end
                .parse()
                .map_err(|e| format!("line {}: bad end: {e}", n + 1))?;
            if start > end {
                return Err(format!("line {}: start {start} is after end {end}", n + 1));
            }
            list.insert(Segment::new(start, end));
        }
        Ok(list)
    }
}

impl FromIterator<Segment> for SegmentList {
    fn from_iter<I: IntoIterator<Item = Segment>>(iter: I) -> Self {
        let mut list = SegmentList::new();
        for seg in iter {
            list.insert(seg);
        }
        list
    }
}

impl From<Vec<Segment>> for SegmentList {
    fn from(segs: Vec<Segment>) -> Self {
        segs.into_iter().collect()
    }
}

impl<'a> IntoIterator for &'a SegmentList {
    type Item = &'a Segment;
    type IntoIter = std::slice::Iter<'a, Segment>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl fmt::Display for SegmentList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, seg) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{seg}")?;
        }
        write!(f, "}}")
    }
}
