//! Script documents as seen by the stepping engine.
//!
//! A `Document` owns the current lines of a script plus a log of where it
//! was edited, which is what lets a `ScriptMachine` find out how much of
//! its accepted prefix an edit invalidated without rescanning.

use crate::parser::{self, Position, Span};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_EPOCH: AtomicU64 = AtomicU64::new(1);

/// Host-chosen name of a document (a path or URI).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(pub String);

impl DocumentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Marker of a document revision. Two cursors with different `epoch`s
/// belong to different document instances even when the ids match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncCursor {
    pub document: DocumentId,
    pub epoch: u64,
    pub revision: u64,
}

impl SyncCursor {
    pub fn same_document(&self, other: &SyncCursor) -> bool {
        self.document == other.document && self.epoch == other.epoch
    }
}

#[derive(Debug, Clone, Copy)]
struct Edit {
    revision: u64,
    at: Position,
}

#[derive(Debug, Clone)]
pub struct Document {
    id: DocumentId,
    epoch: u64,
    lines: Vec<String>,
    revision: u64,
    edits: Vec<Edit>,
}

impl Document {
    pub fn new(id: DocumentId, text: &str) -> Self {
        Self {
            id,
            epoch: NEXT_EPOCH.fetch_add(1, Ordering::Relaxed),
            lines: split_lines(text),
            revision: 0,
            edits: Vec::new(),
        }
    }

    pub fn id(&self) -> &DocumentId {
        &self.id
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    /// Replace the text between `start` and `end` (exclusive) with `text`.
    /// Positions past the end of a line or of the document are clamped.
    pub fn replace(&mut self, start: Position, end: Position, text: &str) {
        let (start, end) = if end < start { (end, start) } else { (start, end) };
        if self.lines.is_empty() {
            self.lines.push(String::new());
        }

        let last = self.lines.len() - 1;
        let start_line = start.line.min(last);
        let end_line = end.line.min(last);
        let start_col = if start.line > last { usize::MAX } else { start.column };
        let end_col = if end.line > last { usize::MAX } else { end.column };

        let prefix: String = self.lines[start_line].chars().take(start_col).collect();
        let suffix: String = self.lines[end_line].chars().skip(end_col).collect();
        let replacement = split_lines(&format!("{}{}{}", prefix, text, suffix));

        self.lines.splice(start_line..=end_line, replacement);
        let at = Position::new(start_line, prefix.chars().count());
        self.record_edit(at);
    }

    /// Replace the whole text.
    pub fn set_text(&mut self, text: &str) {
        self.lines = split_lines(text);
        self.record_edit(Position::new(0, 0));
    }

    pub fn sync_cursor(&self) -> SyncCursor {
        SyncCursor {
            document: self.id.clone(),
            epoch: self.epoch,
            revision: self.revision,
        }
    }

    /// Earliest position edited after `cursor` was taken, if any.
    pub fn changed_since(&self, cursor: &SyncCursor) -> Option<Position> {
        self.edits
            .iter()
            .filter(|edit| edit.revision > cursor.revision)
            .map(|edit| edit.at)
            .min()
    }

    /// Drop edits already seen through `cursor`. Cursors taken from another
    /// document instance are ignored.
    pub fn forget_until(&mut self, cursor: &SyncCursor) {
        if cursor.document == self.id && cursor.epoch == self.epoch {
            self.edits.retain(|edit| edit.revision > cursor.revision);
        }
    }

    pub fn between(&self, span: Span) -> String {
        parser::between(&self.lines, span)
    }

    fn record_edit(&mut self, at: Position) {
        self.revision += 1;
        self.edits.push(Edit {
            revision: self.revision,
            at,
        });
    }
}

fn split_lines(text: &str) -> Vec<String> {
    text.split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line).to_string())
        .collect()
}
