//! Settings infrastructure for docsync.
//!
//! This module provides support for loading and parsing settings.toml files
//! to configure the token provider used by the document store.

use std::path::Path;

use serde::Deserialize;

use crate::document::TokenKind;

/// Root settings structure loaded from settings.toml.
#[derive(Debug, Default, Deserialize)]
pub struct Settings {
    /// Highlighting configuration.
    #[serde(default)]
    pub highlight: HighlightSettings,
}

/// Pattern-based highlighting settings.
#[derive(Debug, Deserialize)]
pub struct HighlightSettings {
    /// Whether tokens are recomputed after each edit (default: true).
    /// When disabled, stored tokens are only relocated.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Rules tried in order; earlier rules win on overlap.
    #[serde(default)]
    pub rules: Vec<RuleSettings>,
}

impl Default for HighlightSettings {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            rules: Vec::new(),
        }
    }
}

fn default_enabled() -> bool {
    true
}

/// A single highlighting rule.
#[derive(Debug, Clone, Deserialize)]
pub struct RuleSettings {
    /// Token kind assigned to matches: "keyword", "type", "function", ...
    pub kind: TokenKind,

    /// Regular expression matched against each line.
    pub pattern: String,

    /// Language ids the rule applies to. Empty means every language.
    #[serde(default)]
    pub languages: Vec<String>,
}

/// Parse settings from TOML text.
pub fn parse_settings(content: &str) -> Result<Settings, toml::de::Error> {
    toml::from_str(content)
}

/// Load settings from a settings.toml file.
///
/// Returns default settings if the file doesn't exist or can't be parsed.
pub fn load_settings(path: &Path) -> Settings {
    match std::fs::read_to_string(path) {
        Ok(content) => match parse_settings(&content) {
            Ok(settings) => settings,
            Err(e) => {
                tracing::warn!(path = %path.display(), "failed to parse settings.toml: {e}");
                Settings::default()
            }
        },
        Err(_) => Settings::default(),
    }
}

/// Discover settings.toml by searching up the directory tree.
///
/// Returns the defaults if no settings.toml is found.
pub fn discover_settings(start_dir: &Path) -> Settings {
    let mut current = Some(start_dir);
    while let Some(dir) = current {
        let candidate = dir.join("settings.toml");
        if candidate.is_file() {
            tracing::info!(path = %candidate.display(), "loading settings");
            return load_settings(&candidate);
        }
        current = dir.parent();
    }

    tracing::debug!(start = %start_dir.display(), "no settings.toml found");
    Settings::default()
}
