//! Element paths inside a structured value.
//!
//! A path is an ASCII string of `.`-separated field names with optional
//! zero-based array indices in brackets:
//!
//! ```text
//! status.code        -> Field("status"), Field("code")
//! samples[3]         -> Field("samples"), Index(3)
//! axes[0].limits[1]  -> Field("axes"), Index(0), Field("limits"), Index(1)
//! [2]                -> Index(2)            (the item value itself is an array)
//! ""                 -> (no segments)       (the item value itself)
//! ```
//!
//! Paths are only used while chains are built; the tree keeps segments, not
//! path strings.

use crate::error::{BridgeError, Result};
use std::fmt;
use std::str::FromStr;

/// One step of an element path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    Field(String),
    Index(usize),
}

impl Segment {
    pub fn is_index(&self) -> bool {
        matches!(self, Segment::Index(_))
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Field(name) => f.write_str(name),
            Segment::Index(i) => write!(f, "[{}]", i),
        }
    }
}

/// A parsed element path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct ElementPath {
    segments: Vec<Segment>,
}

impl ElementPath {
    /// Path of the item value itself.
    pub fn root() -> Self {
        Self::default()
    }

    pub fn parse(path: &str) -> Result<Self> {
        path.parse()
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Path made of the first `n` segments.
    pub fn prefix(&self, n: usize) -> ElementPath {
        ElementPath {
            segments: self.segments[..n.min(self.segments.len())].to_vec(),
        }
    }

    /// Extend the path by one segment.
    pub fn child(&self, segment: Segment) -> ElementPath {
        let mut segments = self.segments.clone();
        segments.push(segment);
        ElementPath { segments }
    }
}

impl fmt::Display for ElementPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 && matches!(segment, Segment::Field(_)) {
                f.write_str(".")?;
            }
            write!(f, "{}", segment)?;
        }
        Ok(())
    }
}

impl FromStr for ElementPath {
    type Err = BridgeError;

    fn from_str(path: &str) -> Result<Self> {
        let invalid = |reason: &str| BridgeError::InvalidPath {
            path: path.to_string(),
            reason: reason.to_string(),
        };

        if path.is_empty() {
            return Ok(ElementPath::root());
        }
        if !path.is_ascii() {
            return Err(invalid("path must be ASCII"));
        }

        let bytes = path.as_bytes();
        let len = bytes.len();
        let mut segments = Vec::new();
        let mut i = 0;

        loop {
            let start = i;
            while i < len && !matches!(bytes[i], b'.' | b'[' | b']') {
                i += 1;
            }
            let name = &path[start..i];
            if !name.is_empty() {
                segments.push(Segment::Field(name.to_string()));
            } else if !(start == 0 && i < len && bytes[i] == b'[') {
                return Err(invalid("empty segment"));
            }

            while i < len && bytes[i] == b'[' {
                let close = path[i + 1..]
                    .find(']')
                    .map(|p| p + i + 1)
                    .ok_or_else(|| invalid("unterminated index"))?;
                let digits = &path[i + 1..close];
                if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(invalid("index must be a non-negative integer"));
                }
                let index = digits
                    .parse::<usize>()
                    .map_err(|_| invalid("index out of range"))?;
                segments.push(Segment::Index(index));
                i = close + 1;
            }

            if i == len {
                break;
            }
            match bytes[i] {
                b'.' => {
                    i += 1;
                    if i == len {
                        return Err(invalid("trailing '.'"));
                    }
                }
                _ => return Err(invalid("unexpected character after index")),
            }
        }

        Ok(ElementPath { segments })
    }
}
