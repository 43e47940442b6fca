//! Source positions and per-line warning suppression.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A span of source text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SourcePos {
    pub file: String,
    pub first_line: u32,
    pub first_column: u32,
    pub last_line: u32,
    pub last_column: u32,
}

impl Default for SourcePos {
    fn default() -> Self {
        SourcePos::point("(unknown)", 1, 1)
    }
}

impl SourcePos {
    /// A zero-width position.
    pub fn point(file: impl Into<String>, line: u32, column: u32) -> Self {
        Self {
            file: file.into(),
            first_line: line,
            first_column: column,
            last_line: line,
            last_column: column,
        }
    }

    /// Smallest span covering both `self` and `other`, in the file of `self`.
    pub fn union(&self, other: &SourcePos) -> SourcePos {
        let (first_line, first_column) = (self.first_line, self.first_column)
            .min((other.first_line, other.first_column));
        let (last_line, last_column) =
            (self.last_line, self.last_column).max((other.last_line, other.last_column));
        SourcePos {
            file: self.file.clone(),
            first_line,
            first_column,
            last_line,
            last_column,
        }
    }
}

impl fmt::Display for SourcePos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.first_line, self.first_column)
    }
}

/// Lines on which warnings have been silenced, keyed by (line, file).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarningSuppressions {
    lines: BTreeSet<(u32, String)>,
}

impl WarningSuppressions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Silence warnings reported on `line` of `file`.
    pub fn suppress(&mut self, line: u32, file: impl Into<String>) {
        self.lines.insert((line, file.into()));
    }

    pub fn is_suppressed(&self, line: u32, file: &str) -> bool {
        self.lines.contains(&(line, file.to_string()))
    }

    /// Whether a diagnostic at `pos` is silenced.
    pub fn covers(&self, pos: &SourcePos) -> bool {
        self.is_suppressed(pos.first_line, &pos.file)
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}
