//! Pattern-based token provider.
//!
//! Classifies text line by line using the regular expressions configured in
//! `settings.toml`. This is the default recompute hook for the document
//! store; a real analysis engine can replace it.

use std::ops::Range as Span;

use regex::Regex;
use tower_lsp::lsp_types::{Position, Range};

use crate::document::{utf16_len, LineIndex, Snapshot, TokenKind, TokenProvider, TokenSet};
use crate::settings::HighlightSettings;

/// A compiled highlighting rule.
#[derive(Debug, Clone)]
struct Rule {
    kind: TokenKind,
    pattern: Regex,
    /// Language ids this rule applies to; empty means all.
    languages: Vec<String>,
}

impl Rule {
    fn applies_to(&self, language_id: &str) -> bool {
        self.languages.is_empty() || self.languages.iter().any(|l| l == language_id)
    }
}

/// Regex-driven classifier.
#[derive(Debug, Clone, Default)]
pub struct Highlighter {
    rules: Vec<Rule>,
}

impl Highlighter {
    /// Compile the configured rules.
    ///
    /// Rules with invalid patterns are skipped with a warning.
    pub fn from_settings(settings: &HighlightSettings) -> Self {
        let rules = settings
            .rules
            .iter()
            .filter_map(|rule| match Regex::new(&rule.pattern) {
                Ok(pattern) => Some(Rule {
                    kind: rule.kind,
                    pattern,
                    languages: rule.languages.clone(),
                }),
                Err(e) => {
                    tracing::warn!(
                        pattern = %rule.pattern,
                        "skipping invalid highlight rule: {e}"
                    );
                    None
                }
            })
            .collect();
        Self { rules }
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Classify every line of `line_index`.
    ///
    /// Rules are tried in order; a match overlapping one claimed by an
    /// earlier rule on the same line is ignored.
    pub fn tokens_for(&self, line_index: &LineIndex, language_id: &str) -> TokenSet {
        let rules = self
            .rules
            .iter()
            .filter(|rule| rule.applies_to(language_id))
            .collect::<Vec<_>>();

        let mut found = Vec::new();
        for line in 0..line_index.line_count() {
            let Some(text) = line_index.line(line) else {
                continue;
            };
            let mut claimed: Vec<Span<usize>> = Vec::new();
            for rule in &rules {
                for m in rule.pattern.find_iter(text) {
                    let span = m.range();
                    let taken = claimed
                        .iter()
                        .any(|c| c.start < span.end && span.start < c.end);
                    if span.is_empty() || taken {
                        continue;
                    }
                    let start = utf16_len(&text[..span.start]);
                    let end = start + utf16_len(m.as_str());
                    found.push((
                        rule.kind,
                        Range::new(
                            Position::new(line as u32, start),
                            Position::new(line as u32, end),
                        ),
                    ));
                    claimed.push(span);
                }
            }
        }
        found.into_iter().collect()
    }
}

impl TokenProvider for Highlighter {
    fn tokens_after_edit(&self, snapshot: &Snapshot) -> Option<TokenSet> {
        if self.rules.is_empty() {
            return None;
        }
        Some(self.tokens_for(snapshot.line_index(), snapshot.language_id()))
    }
}
