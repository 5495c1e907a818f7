//! Failures surfaced by the document store and line index.

use tower_lsp::lsp_types::{Position, Range, Url};

/// Errors returned by [`DocumentStore`](super::DocumentStore) and
/// [`LineIndex`](super::LineIndex) operations.
///
/// None of these are fatal: the store stays usable after any failed call and
/// other documents are unaffected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DocumentError {
    #[error("document already open: {0}")]
    AlreadyOpen(Url),

    #[error("document not open: {0}")]
    MissingDocument(Url),

    #[error("position {line}:{character} is outside the document")]
    OutOfBounds { line: u32, character: u32 },

    #[error("range start {start:?} is after its end {end:?}")]
    InvalidRange { start: Position, end: Position },
}

impl DocumentError {
    pub(crate) fn out_of_bounds(position: Position) -> Self {
        Self::OutOfBounds {
            line: position.line,
            character: position.character,
        }
    }

    /// Reject a range whose start comes after its end.
    pub(crate) fn check_range(range: Range) -> Result<Range, Self> {
        if range.start > range.end {
            return Err(Self::InvalidRange {
                start: range.start,
                end: range.end,
            });
        }
        Ok(range)
    }

    /// Whether this failure is a lifecycle mismatch (duplicate open, unknown
    /// document) rather than malformed edit input.
    pub fn is_lifecycle(&self) -> bool {
        matches!(self, Self::AlreadyOpen(_) | Self::MissingDocument(_))
    }
}
