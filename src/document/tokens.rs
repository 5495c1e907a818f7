//! Position-tagged token classifications and their relocation across edits.

use std::collections::BTreeMap;
use std::fmt;

use serde::Deserialize;
use tower_lsp::lsp_types::{Position, Range};

use super::error::DocumentError;
use super::text::utf16_len;

/// Classification category for a token.
///
/// The declaration order matches the semantic tokens legend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Keyword,
    Type,
    Function,
    Variable,
    String,
    Number,
    Comment,
    Operator,
}

impl TokenKind {
    pub const ALL: [TokenKind; 8] = [
        TokenKind::Keyword,
        TokenKind::Type,
        TokenKind::Function,
        TokenKind::Variable,
        TokenKind::String,
        TokenKind::Number,
        TokenKind::Comment,
        TokenKind::Operator,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TokenKind::Keyword => "keyword",
            TokenKind::Type => "type",
            TokenKind::Function => "function",
            TokenKind::Variable => "variable",
            TokenKind::String => "string",
            TokenKind::Number => "number",
            TokenKind::Comment => "comment",
            TokenKind::Operator => "operator",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tokens grouped by kind, each group ordered by start position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenSet {
    tokens: BTreeMap<TokenKind, Vec<Range>>,
}

impl TokenSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a token, keeping its kind's sequence ordered by start.
    ///
    /// A range that ends before it starts is refused with `InvalidRange`.
    pub fn insert(&mut self, kind: TokenKind, range: Range) -> Result<(), DocumentError> {
        let range = DocumentError::check_range(range)?;
        let ranges = self.tokens.entry(kind).or_default();
        let at = ranges.partition_point(|r| r.start <= range.start);
        ranges.insert(at, range);
        Ok(())
    }

    /// Tokens of one kind, ordered by start.
    pub fn get(&self, kind: TokenKind) -> &[Range] {
        self.tokens.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    /// All tokens, grouped by kind.
    pub fn iter(&self) -> impl Iterator<Item = (TokenKind, &Range)> {
        self.tokens
            .iter()
            .flat_map(|(kind, ranges)| ranges.iter().map(move |r| (*kind, r)))
    }

    pub fn len(&self) -> usize {
        self.tokens.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.values().all(Vec::is_empty)
    }

    pub fn clear(&mut self) {
        self.tokens.clear();
    }

    /// Update token positions after `edit` (a range over the previous text)
    /// was replaced with `new_text`.
    ///
    /// Tokens overlapping the edit are dropped. Tokens starting on the edit's
    /// end line at or after its end column move by the line and column delta;
    /// tokens on later lines move by the line delta only. Earlier tokens are
    /// left alone. An inverted `edit` is refused and the set is unchanged.
    pub fn relocate(&mut self, edit: Range, new_text: &str) -> Result<(), DocumentError> {
        let edit = DocumentError::check_range(edit)?;
        let shift = Shift::new(edit, new_text);
        for ranges in self.tokens.values_mut() {
            ranges.retain_mut(|range| {
                if overlaps(range, &edit) {
                    return false;
                }
                *range = shift.apply(*range);
                true
            });
        }
        self.tokens.retain(|_, ranges| !ranges.is_empty());
        Ok(())
    }
}

/// Inverted ranges are skipped with a warning.
impl FromIterator<(TokenKind, Range)> for TokenSet {
    fn from_iter<I: IntoIterator<Item = (TokenKind, Range)>>(iter: I) -> Self {
        let mut set = TokenSet::new();
        for (kind, range) in iter {
            if let Err(e) = set.insert(kind, range) {
                tracing::warn!(%kind, "dropping token: {e}");
            }
        }
        set
    }
}

/// Whether `token` intersects the half-open edit range.
///
/// Tokens that merely touch either edit boundary are not overlapping, so a
/// token starting exactly at the edit end is shifted rather than dropped.
fn overlaps(token: &Range, edit: &Range) -> bool {
    token.start < edit.end && token.end > edit.start
}

/// Position delta produced by a single replacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Shift {
    end: Position,
    line_delta: i64,
    column_delta: i64,
}

impl Shift {
    fn new(edit: Range, new_text: &str) -> Self {
        let replaced_line_count = i64::from(edit.end.line) - i64::from(edit.start.line) + 1;
        // `split` keeps the trailing empty segment after a final newline.
        let new_lines = new_text.split('\n').collect::<Vec<_>>();
        let new_line_count = new_lines.len() as i64;
        let last_line = utf16_len(new_lines.last().copied().unwrap_or_default()) as i64;

        let tail_column = if new_line_count == 1 {
            edit.start.character as i64 + last_line
        } else {
            last_line
        };

        Self {
            end: edit.end,
            line_delta: new_line_count - replaced_line_count,
            column_delta: tail_column - edit.end.character as i64,
        }
    }

    fn apply(&self, range: Range) -> Range {
        let start = range.start;
        if start.line == self.end.line && start.character >= self.end.character {
            Range::new(
                self.move_position(start, true),
                self.move_position(range.end, range.end.line == self.end.line),
            )
        } else if start.line > self.end.line {
            Range::new(
                self.move_position(start, false),
                self.move_position(range.end, false),
            )
        } else {
            range
        }
    }

    fn move_position(&self, position: Position, on_end_line: bool) -> Position {
        let character = if on_end_line {
            offset(position.character, self.column_delta)
        } else {
            position.character
        };
        Position::new(offset(position.line, self.line_delta), character)
    }
}

/// `value + delta`, saturating at the bounds of `u32`.
fn offset(value: u32, delta: i64) -> u32 {
    u32::try_from((i64::from(value) + delta).max(0)).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(sl: u32, sc: u32, el: u32, ec: u32) -> Range {
        Range::new(Position::new(sl, sc), Position::new(el, ec))
    }

    #[test]
    fn insert_keeps_start_order() {
        let mut set = TokenSet::new();
        set.insert(TokenKind::Variable, range(2, 0, 2, 1)).unwrap();
        set.insert(TokenKind::Variable, range(0, 4, 0, 5)).unwrap();
        set.insert(TokenKind::Variable, range(1, 0, 1, 3)).unwrap();
        assert_eq!(
            set.get(TokenKind::Variable),
            &[range(0, 4, 0, 5), range(1, 0, 1, 3), range(2, 0, 2, 1)]
        );
        assert_eq!(set.len(), 3);
        assert!(set.get(TokenKind::Keyword).is_empty());
    }

    #[test]
    fn shift_for_multi_line_insert() {
        let shift = Shift::new(range(0, 0, 0, 3), "xy\nz");
        assert_eq!(shift.line_delta, 1);
        assert_eq!(shift.column_delta, 1 - 3);
    }

    #[test]
    fn trailing_newline_counts_as_line() {
        let shift = Shift::new(range(0, 2, 0, 2), "a\n");
        assert_eq!(shift.line_delta, 1);
        assert_eq!(shift.column_delta, -2);
    }

    #[test]
    fn later_line_shifts_by_lines_only() {
        let mut set = TokenSet::new();
        set.insert(TokenKind::Variable, range(2, 0, 2, 3)).unwrap();
        set.relocate(range(0, 0, 0, 3), "xy\nz").unwrap();
        assert_eq!(set.get(TokenKind::Variable), &[range(3, 0, 3, 3)]);
    }

    #[test]
    fn same_line_after_edit_shifts_columns() {
        // "let foo = 1" -> replace "foo" with "a"
        let mut set = TokenSet::new();
        set.insert(TokenKind::Keyword, range(0, 0, 0, 3)).unwrap();
        set.insert(TokenKind::Number, range(0, 10, 0, 11)).unwrap();
        set.relocate(range(0, 4, 0, 7), "a").unwrap();
        assert_eq!(set.get(TokenKind::Keyword), &[range(0, 0, 0, 3)]);
        assert_eq!(set.get(TokenKind::Number), &[range(0, 8, 0, 9)]);
    }

    #[test]
    fn token_starting_at_edit_end_is_shifted() {
        let mut set = TokenSet::new();
        set.insert(TokenKind::Variable, range(0, 3, 0, 6)).unwrap();
        set.relocate(range(0, 1, 0, 3), "").unwrap();
        assert_eq!(set.get(TokenKind::Variable), &[range(0, 1, 0, 4)]);
    }

    #[test]
    fn token_ending_at_edit_start_is_kept() {
        let mut set = TokenSet::new();
        set.insert(TokenKind::Variable, range(0, 0, 0, 3)).unwrap();
        set.relocate(range(0, 3, 0, 3), "xx").unwrap();
        assert_eq!(set.get(TokenKind::Variable), &[range(0, 0, 0, 3)]);
    }

    #[test]
    fn insertion_inside_token_drops_it() {
        let mut set = TokenSet::new();
        set.insert(TokenKind::String, range(0, 0, 0, 5)).unwrap();
        set.relocate(range(0, 2, 0, 2), "x").unwrap();
        assert!(set.is_empty());
    }

    #[test]
    fn overlapping_tokens_dropped_for_every_kind() {
        let mut set = TokenSet::new();
        set.insert(TokenKind::Comment, range(1, 0, 3, 2)).unwrap();
        set.insert(TokenKind::Keyword, range(2, 1, 2, 4)).unwrap();
        set.insert(TokenKind::Number, range(4, 0, 4, 1)).unwrap();
        set.relocate(range(2, 0, 2, 5), "").unwrap();
        assert!(set.get(TokenKind::Comment).is_empty());
        assert!(set.get(TokenKind::Keyword).is_empty());
        assert_eq!(set.get(TokenKind::Number), &[range(4, 0, 4, 1)]);
    }

    #[test]
    fn line_deletion_pulls_tokens_up() {
        // "abc\ndef\nghi x" -> delete from (0,1) to (2,1)
        let mut set = TokenSet::new();
        set.insert(TokenKind::Variable, range(2, 4, 2, 5)).unwrap();
        set.relocate(range(0, 1, 2, 1), "").unwrap();
        assert_eq!(set.get(TokenKind::Variable), &[range(0, 4, 0, 5)]);
    }

    #[test]
    fn multi_line_token_after_edit_keeps_end_column() {
        let mut set = TokenSet::new();
        set.insert(TokenKind::Comment, range(0, 6, 2, 2)).unwrap();
        set.relocate(range(0, 0, 0, 2), "abcd").unwrap();
        assert_eq!(set.get(TokenKind::Comment), &[range(0, 8, 2, 2)]);
    }

    #[test]
    fn utf16_width_of_replacement() {
        let mut set = TokenSet::new();
        set.insert(TokenKind::Variable, range(0, 2, 0, 3)).unwrap();
        set.relocate(range(0, 0, 0, 1), "\u{1F600}").unwrap();
        assert_eq!(set.get(TokenKind::Variable), &[range(0, 3, 0, 4)]);
    }

    #[test]
    fn identical_replacement_keeps_positions() {
        let tokens = [
            (TokenKind::Keyword, range(0, 0, 0, 3)),
            (TokenKind::Variable, range(1, 2, 1, 5)),
            (TokenKind::Number, range(3, 0, 3, 2)),
        ];
        let mut set = tokens.into_iter().collect::<TokenSet>();
        // Replace "ef\ngh" (1,5)-(2,2) with the same text
        set.relocate(range(1, 5, 2, 2), "ef\ngh").unwrap();
        assert_eq!(set, tokens.into_iter().collect::<TokenSet>());
    }

    #[test]
    fn inverted_edit_is_rejected() {
        let mut set = [(TokenKind::Variable, range(3, 0, 3, 2))]
            .into_iter()
            .collect::<TokenSet>();
        let before = set.clone();
        assert_eq!(
            set.relocate(range(2, 0, 1, 0), "x"),
            Err(DocumentError::InvalidRange {
                start: Position::new(2, 0),
                end: Position::new(1, 0),
            })
        );
        assert_eq!(set, before);
    }

    #[test]
    fn inverted_token_is_refused() {
        let mut set = TokenSet::new();
        let err = set.insert(TokenKind::Variable, range(0, 5, 0, 1)).unwrap_err();
        assert!(matches!(err, DocumentError::InvalidRange { .. }));
        assert!(set.is_empty());

        let collected = [
            (TokenKind::Variable, range(0, 5, 0, 1)),
            (TokenKind::Variable, range(0, 1, 0, 5)),
        ]
        .into_iter()
        .collect::<TokenSet>();
        assert_eq!(collected.get(TokenKind::Variable), &[range(0, 1, 0, 5)]);
    }

    #[test]
    fn shift_saturates_instead_of_wrapping() {
        let shift = Shift {
            end: Position::new(0, 4),
            line_delta: -3,
            column_delta: -10,
        };
        assert_eq!(
            shift.move_position(Position::new(1, 2), true),
            Position::new(0, 0)
        );

        let shift = Shift {
            end: Position::new(0, 0),
            line_delta: i64::from(u32::MAX),
            column_delta: 0,
        };
        assert_eq!(
            shift.move_position(Position::new(5, 7), false),
            Position::new(u32::MAX, 7)
        );
    }
}
