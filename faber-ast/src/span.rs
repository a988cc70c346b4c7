//! Source positions carried by every node for diagnostics

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a source file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FileId(pub u32);

impl FileId {
    pub const INVALID: FileId = FileId(u32::MAX);

    pub fn new(id: u32) -> Self {
        FileId(id)
    }

    pub fn as_u32(self) -> u32 {
        self.0
    }
}

impl Default for FileId {
    fn default() -> Self {
        FileId(0)
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "file:{}", self.0)
    }
}

/// Position of a node in its source file.
///
/// `line` and `column` are 1-based as produced by the upstream parser;
/// `offset` is the 0-based byte offset of the first character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Span {
    #[serde(default)]
    pub file: FileId,
    pub line: u32,
    pub column: u32,
    #[serde(default)]
    pub offset: u32,
}

impl Span {
    pub fn new(line: u32, column: u32) -> Self {
        Span {
            file: FileId::default(),
            line,
            column,
            offset: 0,
        }
    }

    pub fn with_offset(mut self, offset: u32) -> Self {
        self.offset = offset;
        self
    }

    pub fn in_file(mut self, file: FileId) -> Self {
        self.file = file;
        self
    }

    /// Placeholder for nodes synthesised by the generators themselves
    pub fn synthetic() -> Self {
        Span {
            file: FileId::INVALID,
            line: 0,
            column: 0,
            offset: 0,
        }
    }

    pub fn is_synthetic(&self) -> bool {
        self.file == FileId::INVALID
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_synthetic() {
            write!(f, "<generated>")
        } else {
            write!(f, "{}:{}", self.line, self.column)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_display() {
        assert_eq!(Span::new(3, 14).to_string(), "3:14");
        assert_eq!(Span::synthetic().to_string(), "<generated>");
    }

    #[test]
    fn test_span_deserializes_without_optional_fields() {
        let span: Span = serde_json::from_str(r#"{"line": 2, "column": 5}"#).unwrap();
        assert_eq!(span, Span::new(2, 5));
        assert_eq!(span.file, FileId(0));
    }
}
