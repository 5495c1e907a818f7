//! Document state management and text utilities.
//!
//! This module provides:
//! - `LineIndex` for byte offset <-> LSP position conversion and range replacement
//! - `TokenSet` for storing token classifications and relocating them across edits
//! - `DocumentStore` and `Snapshot` for document lifecycle management

mod error;
mod state;
mod text;
mod tokens;

pub use error::DocumentError;
pub use state::{DocumentStore, EditObserver, Snapshot, TextChange, TokenProvider};
pub use text::{utf16_len, LineIndex};
pub use tokens::{TokenKind, TokenSet};
