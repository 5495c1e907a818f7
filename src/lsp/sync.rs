//! Text synchronization notifications.
//!
//! Translates open/change/close notifications into document store calls.
//! Lifecycle failures (duplicate open, unknown document) are logged and
//! swallowed, since notifications have no response to carry them.

use tower_lsp::lsp_types::{
    DidChangeTextDocumentParams, DidCloseTextDocumentParams, DidOpenTextDocumentParams, Url,
};

use crate::document::{DocumentError, DocumentStore, Snapshot, TextChange};

/// Version used for a change notification that carries none.
pub const UNKNOWN_VERSION: i32 = -1;

/// An inbound text synchronization notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    Open {
        uri: Url,
        language_id: String,
        version: i32,
        text: String,
    },
    Change {
        uri: Url,
        version: Option<i32>,
        changes: Vec<TextChange>,
    },
    Close {
        uri: Url,
    },
}

impl Notification {
    pub fn uri(&self) -> &Url {
        match self {
            Notification::Open { uri, .. }
            | Notification::Change { uri, .. }
            | Notification::Close { uri } => uri,
        }
    }

    fn method(&self) -> &'static str {
        match self {
            Notification::Open { .. } => "didOpen",
            Notification::Change { .. } => "didChange",
            Notification::Close { .. } => "didClose",
        }
    }
}

impl From<DidOpenTextDocumentParams> for Notification {
    fn from(params: DidOpenTextDocumentParams) -> Self {
        Notification::Open {
            uri: params.text_document.uri,
            language_id: params.text_document.language_id,
            version: params.text_document.version,
            text: params.text_document.text,
        }
    }
}

impl From<DidChangeTextDocumentParams> for Notification {
    fn from(params: DidChangeTextDocumentParams) -> Self {
        Notification::Change {
            uri: params.text_document.uri,
            version: Some(params.text_document.version),
            changes: params
                .content_changes
                .into_iter()
                .map(TextChange::from)
                .collect(),
        }
    }
}

impl From<DidCloseTextDocumentParams> for Notification {
    fn from(params: DidCloseTextDocumentParams) -> Self {
        Notification::Close {
            uri: params.text_document.uri,
        }
    }
}

/// Apply a notification to the store.
///
/// Returns the resulting snapshot, or `None` for a close or a failed call.
/// Newly opened documents get their initial tokens from the store's token
/// provider, if it has one.
pub fn handle(store: &DocumentStore, notification: Notification) -> Option<Snapshot> {
    let method = notification.method();
    let uri = notification.uri().clone();
    let result = match notification {
        Notification::Open {
            uri,
            language_id,
            version,
            text,
        } => store
            .open_and_tokenize(uri, &language_id, version, text)
            .map(Some),
        Notification::Change {
            uri,
            version,
            changes,
        } => store
            .edit(&uri, version.unwrap_or(UNKNOWN_VERSION), &changes)
            .map(Some),
        Notification::Close { uri } => store.close(&uri).map(|()| None),
    };
    result.unwrap_or_else(|err| {
        log_failure(method, &uri, &err);
        None
    })
}

fn log_failure(method: &str, uri: &Url, err: &DocumentError) {
    if err.is_lifecycle() {
        tracing::warn!(method, %uri, "ignoring notification: {err}");
    } else {
        tracing::error!(method, %uri, "rejected notification: {err}");
    }
}
