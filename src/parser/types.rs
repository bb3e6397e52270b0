use serde::{Deserialize, Serialize};
use std::fmt;

/// Zero-based (line, column) in a document; columns count characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub const fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }

    /// The position one character to the right on the same line.
    pub fn next_column(self) -> Self {
        Self::new(self.line, self.column + 1)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Range of document text; `stop` is the last character covered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: Position,
    pub stop: Position,
}

impl Span {
    pub fn new(start: Position, stop: Position) -> Self {
        debug_assert!(start <= stop, "span start {} after stop {}", start, stop);
        Self { start, stop }
    }
}

/// A unit of script text sent to the prover in one dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sentence {
    pub span: Span,
    pub text: String,
    pub bullet: bool,
}

/// Where a comment was removed from a sentence: offset into the original
/// text and the number of original characters it occupied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommentSpan {
    pub offset: usize,
    pub length: usize,
}

/// Output of comment stripping: dispatch text plus what was taken out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stripped {
    pub text: String,
    pub comments: Vec<CommentSpan>,
}
