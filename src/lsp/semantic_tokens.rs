//! Semantic tokens encoding for stored token sets.

use tower_lsp::lsp_types::{SemanticToken, SemanticTokenType, SemanticTokensLegend};

use crate::document::{utf16_len, LineIndex, TokenKind, TokenSet};

/// Get the semantic tokens legend for capability declaration.
///
/// Token type indices follow `TokenKind` declaration order.
pub fn legend() -> SemanticTokensLegend {
    SemanticTokensLegend {
        token_types: TokenKind::ALL.into_iter().map(token_type).collect(),
        token_modifiers: vec![],
    }
}

fn token_type(kind: TokenKind) -> SemanticTokenType {
    match kind {
        TokenKind::Keyword => SemanticTokenType::KEYWORD,
        TokenKind::Type => SemanticTokenType::TYPE,
        TokenKind::Function => SemanticTokenType::FUNCTION,
        TokenKind::Variable => SemanticTokenType::VARIABLE,
        TokenKind::String => SemanticTokenType::STRING,
        TokenKind::Number => SemanticTokenType::NUMBER,
        TokenKind::Comment => SemanticTokenType::COMMENT,
        TokenKind::Operator => SemanticTokenType::OPERATOR,
    }
}

/// A single-line token before delta encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct RawToken {
    line: u32,
    start: u32,
    length: u32,
    token_type: u32,
}

/// Convert a token set into delta-encoded semantic tokens.
///
/// Tokens spanning several lines are split into one token per line, since
/// clients are not required to support multi-line tokens.
pub fn encode_tokens(tokens: &TokenSet, line_index: &LineIndex) -> Vec<SemanticToken> {
    let mut raw = Vec::with_capacity(tokens.len());
    for (kind, range) in tokens.iter() {
        for line in range.start.line..=range.end.line {
            let Some(text) = line_index.line(line as usize) else {
                break;
            };
            let start = if line == range.start.line {
                range.start.character
            } else {
                0
            };
            let end = if line == range.end.line {
                range.end.character
            } else {
                utf16_len(text)
            };
            if end > start {
                raw.push(RawToken {
                    line,
                    start,
                    length: end - start,
                    token_type: kind as u32,
                });
            }
        }
    }
    raw.sort();

    let mut result = Vec::with_capacity(raw.len());
    let mut prev_line = 0u32;
    let mut prev_start = 0u32;

    for token in &raw {
        let delta_line = token.line - prev_line;
        let delta_start = if delta_line == 0 {
            token.start - prev_start
        } else {
            token.start
        };

        result.push(SemanticToken {
            delta_line,
            delta_start,
            length: token.length,
            token_type: token.token_type,
            token_modifiers_bitset: 0,
        });

        prev_line = token.line;
        prev_start = token.start;
    }

    result
}
