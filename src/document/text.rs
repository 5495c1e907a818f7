//! Line table for position conversion and range replacement.
//!
//! Provides byte offset <-> LSP position conversion with proper UTF-16 handling,
//! and splices incremental edits into the text without rescanning it.

use std::ops::Range as Span;

use tower_lsp::lsp_types::{Position, Range};

use super::error::DocumentError;

/// Pre-computed line index over an owned text buffer.
///
/// LSP positions use line/column where column is in UTF-16 code units.
/// `line_starts` is strictly increasing and always begins with `0`.
///
/// Only `\n` ends a line. A `\r` directly before it belongs to the
/// terminator; any other `\r`, including one at the very end of the text,
/// is ordinary line content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineIndex {
    /// Byte offset where each line starts.
    line_starts: Vec<usize>,
    /// Source text (needed for UTF-16 column calculation).
    source: String,
}

impl LineIndex {
    /// Build a line index from source text.
    pub fn new(source: String) -> Self {
        let line_starts = compute_line_starts(&source);
        Self {
            line_starts,
            source,
        }
    }

    /// Get the source text.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Number of lines, counting the (possibly empty) line after a trailing newline.
    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    /// Text of a single line, without its line terminator.
    pub fn line(&self, line: usize) -> Option<&str> {
        let start = *self.line_starts.get(line)?;
        Some(&self.source[start..self.line_end(line)])
    }

    /// Discard the current content and rebuild from `source`.
    pub fn reset(&mut self, source: String) {
        *self = Self::new(source);
    }

    /// Convert a byte offset to an LSP position.
    ///
    /// Uses binary search for O(log n) line lookup, then scans the line for UTF-16 column.
    pub fn offset_to_position(&self, offset: usize) -> Position {
        let line = match self.line_starts.binary_search(&offset) {
            Ok(line) => line,
            Err(line) => line.saturating_sub(1),
        };

        let line_start = self.line_starts[line];
        let line_end = self
            .line_starts
            .get(line + 1)
            .copied()
            .unwrap_or(self.source.len());

        let mut col = 0u32;
        for (i, c) in self.source[line_start..line_end].char_indices() {
            if line_start + i >= offset {
                break;
            }
            col += c.len_utf16() as u32;
        }

        Position::new(line as u32, col)
    }

    /// Convert an LSP position to a byte offset.
    ///
    /// Columns past the end of a line clamp to the line end (before its
    /// `\n` or `\r\n`). A column landing inside a surrogate pair resolves to
    /// the start of that character. Lines past the last line are rejected.
    pub fn resolve(&self, position: Position) -> Result<usize, DocumentError> {
        let line = position.line as usize;
        let Some(&line_start) = self.line_starts.get(line) else {
            return Err(DocumentError::out_of_bounds(position));
        };
        let line_end = self.line_end(line);

        let mut utf16_col = 0u32;
        for (i, c) in self.source[line_start..line_end].char_indices() {
            utf16_col += c.len_utf16() as u32;
            if utf16_col > position.character {
                return Ok(line_start + i);
            }
        }

        Ok(line_end)
    }

    /// Convert an LSP range to a byte span.
    pub fn resolve_range(&self, range: Range) -> Result<Span<usize>, DocumentError> {
        let range = DocumentError::check_range(range)?;
        Ok(self.resolve(range.start)?..self.resolve(range.end)?)
    }

    /// Convert a byte span to an LSP range.
    pub fn span_to_range(&self, span: &Span<usize>) -> Range {
        Range::new(
            self.offset_to_position(span.start),
            self.offset_to_position(span.end),
        )
    }

    /// Replace the text covered by `range` with `text`.
    ///
    /// Both ends are resolved before anything is touched, so a failed call
    /// leaves the index unchanged. Line starts before the edit are kept as
    /// is, those after it are shifted, and only the replacement is scanned.
    pub fn replace(&mut self, range: Range, text: &str) -> Result<(), DocumentError> {
        let span = self.resolve_range(range)?;
        let start_line = range.start.line as usize;
        let end_line = range.end.line as usize;

        self.source.replace_range(span.clone(), text);

        let removed = span.end - span.start;
        for start in &mut self.line_starts[end_line + 1..] {
            *start = *start - removed + text.len();
        }

        let inserted = text
            .match_indices('\n')
            .map(|(i, _)| span.start + i + 1)
            .collect::<Vec<_>>();
        self.line_starts.splice(start_line + 1..end_line + 1, inserted);

        Ok(())
    }

    /// Byte offset of the end of `line`, excluding its terminator.
    ///
    /// The last line has no terminator, so a trailing `\r` there is kept.
    fn line_end(&self, line: usize) -> usize {
        let start = self.line_starts[line];
        let end = self
            .line_starts
            .get(line + 1)
            .map(|&next| next - 1)
            .unwrap_or(self.source.len());
        if end > start && self.source.as_bytes()[end - 1] == b'\r' && end < self.source.len() {
            end - 1
        } else {
            end
        }
    }
}

/// Length of `text` in UTF-16 code units.
pub fn utf16_len(text: &str) -> u32 {
    text.chars().map(|c| c.len_utf16() as u32).sum()
}

fn compute_line_starts(source: &str) -> Vec<usize> {
    let mut line_starts = vec![0];
    line_starts.extend(source.match_indices('\n').map(|(i, _)| i + 1));
    line_starts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index(text: &str) -> LineIndex {
        LineIndex::new(text.to_string())
    }

    fn range(sl: u32, sc: u32, el: u32, ec: u32) -> Range {
        Range::new(Position::new(sl, sc), Position::new(el, ec))
    }

    #[test]
    fn single_line() {
        let idx = index("hello world");
        assert_eq!(idx.offset_to_position(0), Position::new(0, 0));
        assert_eq!(idx.offset_to_position(5), Position::new(0, 5));
        assert_eq!(idx.offset_to_position(11), Position::new(0, 11));
    }

    #[test]
    fn multi_line() {
        let idx = index("hello\nworld\ntest");
        assert_eq!(idx.line_count(), 3);
        assert_eq!(idx.offset_to_position(5), Position::new(0, 5));
        assert_eq!(idx.offset_to_position(6), Position::new(1, 0));
        assert_eq!(idx.offset_to_position(12), Position::new(2, 0));
    }

    #[test]
    fn trailing_newline_opens_empty_line() {
        let idx = index("abc\n");
        assert_eq!(idx.line_count(), 2);
        assert_eq!(idx.line(1), Some(""));
        assert_eq!(idx.resolve(Position::new(1, 0)), Ok(4));
    }

    #[test]
    fn resolve_multi_line() {
        let idx = index("hello\nworld");
        assert_eq!(idx.resolve(Position::new(0, 0)), Ok(0));
        assert_eq!(idx.resolve(Position::new(0, 5)), Ok(5));
        assert_eq!(idx.resolve(Position::new(1, 0)), Ok(6));
        assert_eq!(idx.resolve(Position::new(1, 5)), Ok(11));
    }

    #[test]
    fn resolve_clamps_column_to_line_end() {
        let idx = index("ab\ncd");
        assert_eq!(idx.resolve(Position::new(0, 2)), Ok(2));
        assert_eq!(idx.resolve(Position::new(0, 40)), Ok(2));
        assert_eq!(idx.resolve(Position::new(1, 40)), Ok(5));
    }

    #[test]
    fn resolve_clamps_before_crlf() {
        let idx = index("ab\r\ncd");
        assert_eq!(idx.line(0), Some("ab"));
        assert_eq!(idx.resolve(Position::new(0, 9)), Ok(2));
        assert_eq!(idx.resolve(Position::new(1, 0)), Ok(4));
    }

    #[test]
    fn lone_carriage_return_is_content() {
        let idx = index("ab\r");
        assert_eq!(idx.line_count(), 1);
        assert_eq!(idx.line(0), Some("ab\r"));
        assert_eq!(idx.resolve(Position::new(0, 9)), Ok(3));

        let idx = index("a\rb\r\nc\r");
        assert_eq!(idx.line_count(), 2);
        assert_eq!(idx.line(0), Some("a\rb"));
        assert_eq!(idx.line(1), Some("c\r"));
    }

    #[test]
    fn resolve_out_of_bounds_line() {
        let idx = index("hello");
        assert_eq!(
            idx.resolve(Position::new(5, 0)),
            Err(DocumentError::OutOfBounds {
                line: 5,
                character: 0
            })
        );
    }

    #[test]
    fn utf16_handling() {
        // U+1F600 is 4 bytes in UTF-8 but 2 code units in UTF-16
        let idx = index("a\u{1F600}b");
        assert_eq!(idx.offset_to_position(1), Position::new(0, 1));
        assert_eq!(idx.offset_to_position(5), Position::new(0, 3));
        assert_eq!(idx.resolve(Position::new(0, 3)), Ok(5));
        // Inside the surrogate pair
        assert_eq!(idx.resolve(Position::new(0, 2)), Ok(1));
        assert_eq!(utf16_len("a\u{1F600}b"), 4);
    }

    #[test]
    fn span_to_range() {
        let idx = index("hello\nworld");
        let range = idx.span_to_range(&(6..11));
        assert_eq!(range.start, Position::new(1, 0));
        assert_eq!(range.end, Position::new(1, 5));
    }

    #[test]
    fn replace_within_line() {
        let mut idx = index("abc\ndef\nghi");
        idx.replace(range(1, 1, 1, 2), "XYZ").unwrap();
        assert_eq!(idx.source(), "abc\ndXYZf\nghi");
        assert_eq!(idx, index("abc\ndXYZf\nghi"));
    }

    #[test]
    fn replace_inserting_lines() {
        let mut idx = index("abc\ndef\nghi");
        idx.replace(range(0, 0, 0, 3), "xy\nz").unwrap();
        assert_eq!(idx.source(), "xy\nz\ndef\nghi");
        assert_eq!(idx, index("xy\nz\ndef\nghi"));
    }

    #[test]
    fn replace_deleting_lines() {
        let mut idx = index("abc\ndef\nghi\njkl");
        idx.replace(range(0, 1, 2, 1), "").unwrap();
        assert_eq!(idx.source(), "ahi\njkl");
        assert_eq!(idx, index("ahi\njkl"));
    }

    #[test]
    fn replace_appending_at_end() {
        let mut idx = index("abc");
        idx.replace(range(0, 3, 0, 3), "\n\u{1F600}\n").unwrap();
        assert_eq!(idx, index("abc\n\u{1F600}\n"));
        assert_eq!(idx.line_count(), 3);
    }

    #[test]
    fn replace_rejects_inverted_range() {
        let mut idx = index("abc\ndef");
        let err = idx.replace(range(1, 0, 0, 0), "x").unwrap_err();
        assert!(matches!(err, DocumentError::InvalidRange { .. }));
        assert_eq!(idx.source(), "abc\ndef");
    }

    #[test]
    fn replace_out_of_bounds_does_not_mutate() {
        let mut idx = index("abc");
        let err = idx.replace(range(0, 0, 3, 0), "x").unwrap_err();
        assert!(matches!(err, DocumentError::OutOfBounds { line: 3, .. }));
        assert_eq!(idx, index("abc"));
    }

    #[test]
    fn reset_rebuilds() {
        let mut idx = index("abc\ndef");
        idx.reset("one".to_string());
        assert_eq!(idx.line_count(), 1);
        assert_eq!(idx.source(), "one");
    }
}
