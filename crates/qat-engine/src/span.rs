//! Source positions
//!
//! Every AST node and every diagnostic carries a [`FileRange`]: the file it
//! came from and the byte offsets inside that file.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;

/// Identifier of a source file, as assigned by the front end.
///
/// The same index is used for the codespan file database when rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FileId(pub u32);

impl FileId {
    pub fn as_usize(self) -> usize {
        self.0 as usize
    }
}

/// Byte range inside one source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct FileRange {
    pub file: FileId,
    pub start: u32,
    pub end: u32,
}

impl FileRange {
    pub fn new(file: FileId, start: u32, end: u32) -> Self {
        Self { file, start, end }
    }

    pub fn len(&self) -> u32 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Smallest range covering both ranges. The file of `self` wins.
    pub fn merge(&self, other: &FileRange) -> FileRange {
        FileRange {
            file: self.file,
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    pub fn as_range(&self) -> Range<usize> {
        self.start as usize..self.end as usize
    }
}

impl fmt::Display for FileRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "file{}:{}..{}", self.file.0, self.start, self.end)
    }
}

/// A name as written in source, together with where it was written.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier {
    pub value: String,
    pub range: FileRange,
}

impl Identifier {
    pub fn new(value: impl Into<String>, range: FileRange) -> Self {
        Self {
            value: value.into(),
            range,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_ranges() {
        let a = FileRange::new(FileId(1), 4, 9);
        let b = FileRange::new(FileId(1), 2, 6);
        let merged = a.merge(&b);
        assert_eq!(merged.start, 2);
        assert_eq!(merged.end, 9);
        assert_eq!(merged.len(), 7);
    }

    #[test]
    fn test_identifier_display() {
        let id = Identifier::new("value", FileRange::default());
        assert_eq!(id.to_string(), "value");
        assert!(FileRange::default().is_empty());
    }
}
