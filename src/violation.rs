//! The single output currency of the check engine: a weighted, positioned
//! violation record. Every rule family in `checks/` produces these and
//! nothing else — there is no separate "error" type for a failed check,
//! only a violation describing what failed and where.

use serde::Serialize;

use crate::models::Position;

#[derive(Clone, Debug, Serialize)]
pub struct Violation {
    pub path: String,
    pub message: String,
    pub line: usize,
    pub column: usize,
    pub weight: u32,
}

impl Violation {
    pub fn new(path: impl Into<String>, message: impl Into<String>, position: Position, weight: u32) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
            line: position.line,
            column: position.column,
            weight,
        }
    }

    /// A violation with no meaningful source position beyond "the file
    /// itself", such as a missing top-level key. Per §8, these land at
    /// line 1, column 1.
    pub fn at_file(path: impl Into<String>, message: impl Into<String>, weight: u32) -> Self {
        Self::new(path, message, Position::new(1, 1), weight)
    }
}

impl std::fmt::Display for Violation {
    /// `path:line[:col] - message (weight=W)`, per §4.6.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.column > 0 {
            write!(
                f,
                "{}:{}:{} - {} (weight={})",
                self.path, self.line, self.column, self.message, self.weight
            )
        } else {
            write!(
                f,
                "{}:{} - {} (weight={})",
                self.path, self.line, self.message, self.weight
            )
        }
    }
}
