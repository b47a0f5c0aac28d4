//! Offset ↔ line/column bookkeeping.
//!
//! Offsets are UTF-8 byte offsets. Lines are 1-based, columns 0-based.
//! `\n`, `\r\n` and a lone `\r` all count as one line break.

use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LineColumn {
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    pub start: LineColumn,
    pub end: LineColumn,
}

pub struct PositionIndex {
    line_starts: Vec<usize>,
    len: usize,
    memo: RefCell<HashMap<usize, LineColumn>>,
}

impl PositionIndex {
    pub fn new(text: &str) -> Self {
        let bytes = text.as_bytes();
        let mut line_starts = vec![0];
        let mut i = 0;
        while i < bytes.len() {
            match bytes[i] {
                b'\r' => {
                    if bytes.get(i + 1) == Some(&b'\n') {
                        i += 1;
                    }
                    line_starts.push(i + 1);
                }
                b'\n' => line_starts.push(i + 1),
                _ => {}
            }
            i += 1;
        }
        Self {
            line_starts,
            len: text.len(),
            memo: RefCell::new(HashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    pub fn offset_to_line_column(&self, offset: usize) -> LineColumn {
        if let Some(hit) = self.memo.borrow().get(&offset) {
            return *hit;
        }
        // Last line start that is <= offset.
        let idx = self
            .line_starts
            .partition_point(|&start| start <= offset)
            .saturating_sub(1);
        let loc = LineColumn {
            line: idx + 1,
            column: offset - self.line_starts[idx],
        };
        self.memo.borrow_mut().insert(offset, loc);
        loc
    }

    /// Never fails: positions past the last indexed line extrapolate from the
    /// end of the text.
    pub fn line_column_to_offset(&self, loc: LineColumn) -> usize {
        let line = loc.line.max(1);
        match self.line_starts.get(line - 1) {
            Some(start) => start + loc.column,
            None => self.len + loc.column,
        }
    }

    pub fn location(&self, start: usize, end: usize) -> SourceLocation {
        SourceLocation {
            start: self.offset_to_line_column(start),
            end: self.offset_to_line_column(end),
        }
    }
}

/// Rewrites `\r\n` and lone `\r` to `\n` for parsers that only understand LF,
/// and maps offsets in the rewritten text back to the original.
#[derive(Debug, Clone, Default)]
pub struct LineFeedNormalizer {
    /// Normalized offsets of each `\n` that replaced a two-byte `\r\n`.
    collapsed: Vec<usize>,
}

impl LineFeedNormalizer {
    pub fn normalize(text: &str) -> (String, Self) {
        if !text.contains('\r') {
            return (text.to_string(), Self::default());
        }
        let bytes = text.as_bytes();
        let mut out = Vec::with_capacity(bytes.len());
        let mut collapsed = Vec::new();
        let mut i = 0;
        while i < bytes.len() {
            if bytes[i] == b'\r' {
                if bytes.get(i + 1) == Some(&b'\n') {
                    collapsed.push(out.len());
                    i += 1;
                }
                out.push(b'\n');
            } else {
                out.push(bytes[i]);
            }
            i += 1;
        }
        // Only ASCII bytes were replaced, so the buffer is still valid UTF-8.
        let normalized = String::from_utf8(out).unwrap_or_else(|e| {
            String::from_utf8_lossy(e.as_bytes()).into_owned()
        });
        (normalized, Self { collapsed })
    }

    pub fn is_identity(&self) -> bool {
        self.collapsed.is_empty()
    }

    /// An offset that points at a collapsed `\n` maps to its `\r`; anything
    /// after it is shifted by one.
    pub fn remap(&self, offset: usize) -> usize {
        offset + self.collapsed.partition_point(|&pos| pos < offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offset_to_line_column_mixed_line_endings() {
        let index = PositionIndex::new("a\nb\r\nc\rd");
        assert_eq!(index.line_count(), 4);
        assert_eq!(index.offset_to_line_column(0), LineColumn { line: 1, column: 0 });
        assert_eq!(index.offset_to_line_column(2), LineColumn { line: 2, column: 0 });
        assert_eq!(index.offset_to_line_column(3), LineColumn { line: 2, column: 1 });
        assert_eq!(index.offset_to_line_column(5), LineColumn { line: 3, column: 0 });
        assert_eq!(index.offset_to_line_column(7), LineColumn { line: 4, column: 0 });
        // memoized lookups return the same answer
        assert_eq!(index.offset_to_line_column(7), LineColumn { line: 4, column: 0 });
    }

    #[test]
    fn test_line_column_to_offset_extrapolates_past_end() {
        let index = PositionIndex::new("ab\ncd");
        assert_eq!(index.line_column_to_offset(LineColumn { line: 2, column: 1 }), 4);
        assert_eq!(index.line_column_to_offset(LineColumn { line: 9, column: 3 }), 8);
    }

    #[test]
    fn test_line_feed_normalizer_remaps_back() {
        let original = "a\r\nb\rc\r\nd";
        let (normalized, map) = LineFeedNormalizer::normalize(original);
        assert_eq!(normalized, "a\nb\nc\nd");
        assert!(!map.is_identity());
        let d = normalized.find('d').unwrap();
        assert_eq!(&original[map.remap(d)..], "d");
        let c = normalized.find('c').unwrap();
        assert_eq!(&original[map.remap(c)..map.remap(c) + 1], "c");
        // the newline after `a` maps to its `\r`
        assert_eq!(map.remap(1), 1);
        assert_eq!(map.remap(2), 3);
    }

    #[test]
    fn test_line_feed_normalizer_is_identity_for_lf() {
        let (normalized, map) = LineFeedNormalizer::normalize("a\nb");
        assert_eq!(normalized, "a\nb");
        assert!(map.is_identity());
        assert_eq!(map.remap(3), 3);
    }
}
