//! Structured parse errors.
//!
//! Every failure that leaves the pipeline is a [`ParseError`] positioned in
//! original-source coordinates, whatever coordinate space it was raised in.

use serde::Serialize;
use std::error::Error as StdError;
use thiserror::Error;

use crate::position::{LineColumn, PositionIndex};

/// Which stage of the pipeline gave up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ParseErrorKind {
    /// An expected literal token was not found at the scan cursor.
    Scan,
    /// The delegate markup or script parser failed.
    Delegate,
    /// The delegate produced a shape the virtual script did not predict.
    Internal,
    /// A node or attribute kind outside the closed set.
    UnknownKind,
    /// A parser selection could not be resolved.
    Resolution,
}

#[derive(Debug, Error)]
#[error("{message} ({line_number}:{column})")]
pub struct ParseError {
    pub message: String,
    pub index: usize,
    pub line_number: usize,
    pub column: usize,
    pub kind: ParseErrorKind,
    #[source]
    pub source: Option<Box<dyn StdError + Send + Sync>>,
}

impl ParseError {
    pub fn from_offset(
        kind: ParseErrorKind,
        message: impl Into<String>,
        offset: usize,
        index: &PositionIndex,
    ) -> Self {
        let LineColumn { line, column } = index.offset_to_line_column(offset);
        Self {
            message: message.into(),
            index: offset,
            line_number: line,
            column,
            kind,
            source: None,
        }
    }

    pub fn from_line_column(
        kind: ParseErrorKind,
        message: impl Into<String>,
        loc: LineColumn,
        index: &PositionIndex,
    ) -> Self {
        Self {
            message: message.into(),
            index: index.line_column_to_offset(loc),
            line_number: loc.line,
            column: loc.column,
            kind,
            source: None,
        }
    }

    pub fn scan(message: impl Into<String>, offset: usize, index: &PositionIndex) -> Self {
        Self::from_offset(ParseErrorKind::Scan, message, offset, index)
    }

    pub fn internal(message: impl Into<String>, offset: usize, index: &PositionIndex) -> Self {
        Self::from_offset(ParseErrorKind::Internal, message, offset, index)
    }

    pub fn with_source(mut self, source: impl StdError + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }
}

/// Failure reported by a delegate parser, in the delegate's own coordinates.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct DelegateError {
    pub message: String,
    pub offset: Option<usize>,
}

impl DelegateError {
    pub fn new(message: impl Into<String>, offset: Option<usize>) -> Self {
        Self {
            message: message.into(),
            offset,
        }
    }
}

pub type ParseResult<T> = Result<T, ParseError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_from_offset_and_line_column_agree() {
        let index = PositionIndex::new("ab\ncd\r\nef");
        let a = ParseError::scan("boom", 7, &index);
        assert_eq!((a.line_number, a.column), (3, 0));

        let b = ParseError::from_line_column(
            ParseErrorKind::Scan,
            "boom",
            LineColumn { line: 3, column: 0 },
            &index,
        );
        assert_eq!(b.index, 7);
        assert_eq!(a.to_string(), "boom (3:0)");
    }
}
