//! Language server core for incremental text synchronization.
//!
//! Keeps the authoritative text, version and token classifications of every
//! open document, applying incremental edits and relocating tokens without
//! recomputing them.

use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

use tower_lsp::jsonrpc::Result;
use tower_lsp::lsp_types::*;
use tower_lsp::{Client, LanguageServer, LspService};

mod document;
pub mod lsp;
pub mod settings;

pub use document::{
    utf16_len, DocumentError, DocumentStore, EditObserver, LineIndex, Snapshot, TextChange,
    TokenKind, TokenProvider, TokenSet,
};
pub use settings::{discover_settings, load_settings, Settings};

use lsp::{Highlighter, Notification};

pub struct Backend {
    client: Client,
    documents: OnceLock<DocumentStore>,
}

impl Backend {
    pub(crate) fn new(client: Client) -> Self {
        Self {
            client,
            documents: OnceLock::new(),
        }
    }

    /// The document store, available once `initialize` has run.
    pub fn documents(&self) -> Option<&DocumentStore> {
        self.documents.get()
    }

    fn dispatch(&self, notification: Notification) {
        match self.documents.get() {
            Some(store) => {
                lsp::handle(store, notification);
            }
            None => {
                tracing::warn!(uri = %notification.uri(), "notification before initialize");
            }
        }
    }
}

/// Build the document store for a workspace, wiring in the configured
/// highlighter as the token provider.
pub fn store_for_settings(settings: &Settings) -> DocumentStore {
    let store = DocumentStore::new();
    if !settings.highlight.enabled {
        return store;
    }
    let highlighter = Highlighter::from_settings(&settings.highlight);
    if highlighter.is_empty() {
        return store;
    }
    store.with_token_provider(Arc::new(highlighter))
}

#[tower_lsp::async_trait]
impl LanguageServer for Backend {
    async fn initialize(&self, params: InitializeParams) -> Result<InitializeResult> {
        let workspace_root: Option<PathBuf> = params
            .workspace_folders
            .as_ref()
            .and_then(|folders| folders.first())
            .and_then(|f| f.uri.to_file_path().ok())
            .or_else(|| {
                #[allow(deprecated)]
                params.root_uri.as_ref()?.to_file_path().ok()
            });

        let settings = match &workspace_root {
            Some(root) => discover_settings(root),
            None => Settings::default(),
        };
        if self.documents.set(store_for_settings(&settings)).is_err() {
            tracing::warn!("ignoring repeated initialize; keeping the existing document store");
        }

        Ok(InitializeResult {
            capabilities: ServerCapabilities {
                text_document_sync: Some(TextDocumentSyncCapability::Kind(
                    TextDocumentSyncKind::INCREMENTAL,
                )),
                semantic_tokens_provider: Some(
                    SemanticTokensServerCapabilities::SemanticTokensOptions(
                        SemanticTokensOptions {
                            legend: lsp::legend(),
                            full: Some(SemanticTokensFullOptions::Bool(true)),
                            range: None,
                            work_done_progress_options: WorkDoneProgressOptions::default(),
                        },
                    ),
                ),
                ..Default::default()
            },
            ..Default::default()
        })
    }

    async fn initialized(&self, _: InitializedParams) {
        tracing::info!("document sync server initialized");
        self.client
            .log_message(MessageType::INFO, "document sync server initialized")
            .await;
    }

    async fn shutdown(&self) -> Result<()> {
        if let Some(store) = self.documents.get() {
            tracing::info!(open = store.list_open().len(), "shutting down");
        }
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        self.dispatch(params.into());
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        self.dispatch(params.into());
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        self.dispatch(params.into());
    }

    async fn semantic_tokens_full(
        &self,
        params: SemanticTokensParams,
    ) -> Result<Option<SemanticTokensResult>> {
        let Some(snapshot) = self
            .documents
            .get()
            .and_then(|store| store.snapshot(&params.text_document.uri))
        else {
            return Ok(None);
        };

        Ok(Some(SemanticTokensResult::Tokens(SemanticTokens {
            result_id: Some(snapshot.version().to_string()),
            data: lsp::encode_tokens(snapshot.tokens(), snapshot.line_index()),
        })))
    }
}

pub fn create_service() -> (LspService<Backend>, tower_lsp::ClientSocket) {
    LspService::new(Backend::new)
}
