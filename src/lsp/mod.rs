//! LSP protocol feature implementations.
//!
//! This module provides:
//! - Text synchronization notification handling
//! - Semantic tokens encoding for stored token sets
//! - A pattern-based token provider

mod highlight;
mod semantic_tokens;
mod sync;

pub use highlight::Highlighter;
pub use semantic_tokens::{encode_tokens, legend};
pub use sync::{handle, Notification, UNKNOWN_VERSION};
