//! Document state management for open text documents.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tower_lsp::lsp_types::{Range, TextDocumentContentChangeEvent, Url};

use super::error::DocumentError;
use super::text::LineIndex;
use super::tokens::TokenSet;

/// A single entry of a change notification.
///
/// A change without a range replaces the whole document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChange {
    pub range: Option<Range>,
    pub text: String,
}

impl TextChange {
    pub fn incremental(range: Range, text: impl Into<String>) -> Self {
        Self {
            range: Some(range),
            text: text.into(),
        }
    }

    pub fn full(text: impl Into<String>) -> Self {
        Self {
            range: None,
            text: text.into(),
        }
    }
}

impl From<TextDocumentContentChangeEvent> for TextChange {
    fn from(event: TextDocumentContentChangeEvent) -> Self {
        Self {
            range: event.range,
            text: event.text,
        }
    }
}

/// Called with the pre-edit snapshot before each change is applied.
///
/// Runs inside the store's critical section and must not call back into the
/// store.
pub trait EditObserver: Send + Sync {
    fn before_edit(&self, snapshot: &Snapshot, change: &TextChange);
}

/// Supplies a fresh token set for a just-edited document.
///
/// Returning `None` keeps the relocated tokens. Runs inside the store's
/// critical section and must not call back into the store.
pub trait TokenProvider: Send + Sync {
    fn tokens_after_edit(&self, snapshot: &Snapshot) -> Option<TokenSet>;
}

/// Immutable view of a document at one version.
///
/// Cloning is cheap; the text and tokens are shared, and the store copies
/// them on write so a snapshot never observes a later mutation.
#[derive(Debug, Clone)]
pub struct Snapshot {
    uri: Url,
    language_id: Arc<str>,
    version: i32,
    line_index: Arc<LineIndex>,
    tokens: Arc<TokenSet>,
}

impl Snapshot {
    pub fn uri(&self) -> &Url {
        &self.uri
    }

    pub fn language_id(&self) -> &str {
        &self.language_id
    }

    pub fn version(&self) -> i32 {
        self.version
    }

    pub fn text(&self) -> &str {
        self.line_index.source()
    }

    pub fn line_index(&self) -> &LineIndex {
        &self.line_index
    }

    pub fn tokens(&self) -> &TokenSet {
        &self.tokens
    }
}

/// State for a single open document.
#[derive(Debug)]
struct Document {
    uri: Url,
    language_id: Arc<str>,
    version: i32,
    line_index: Arc<LineIndex>,
    tokens: Arc<TokenSet>,
}

impl Document {
    fn new(uri: Url, language_id: &str, version: i32, text: String) -> Self {
        Self {
            uri,
            language_id: Arc::from(language_id),
            version,
            line_index: Arc::new(LineIndex::new(text)),
            tokens: Arc::new(TokenSet::new()),
        }
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            uri: self.uri.clone(),
            language_id: Arc::clone(&self.language_id),
            version: self.version,
            line_index: Arc::clone(&self.line_index),
            tokens: Arc::clone(&self.tokens),
        }
    }

    /// Apply one change to the text and tokens together.
    ///
    /// On failure neither the text nor the tokens are touched.
    fn apply(&mut self, change: &TextChange) -> Result<(), DocumentError> {
        match change.range {
            Some(range) => {
                // Clamped columns are normalized so tokens move with the text.
                let span = self.line_index.resolve_range(range)?;
                let range = self.line_index.span_to_range(&span);
                Arc::make_mut(&mut self.line_index).replace(range, &change.text)?;
                Arc::make_mut(&mut self.tokens).relocate(range, &change.text)?;
            }
            None => {
                Arc::make_mut(&mut self.line_index).reset(change.text.clone());
                self.tokens = Arc::new(TokenSet::new());
            }
        }
        Ok(())
    }
}

/// Thread-safe storage for open documents.
///
/// Every operation runs under one store-wide lock, so edits to different
/// documents never interleave with each other or with snapshot reads.
#[derive(Default)]
pub struct DocumentStore {
    documents: Mutex<HashMap<Url, Document>>,
    observer: Option<Arc<dyn EditObserver>>,
    token_provider: Option<Arc<dyn TokenProvider>>,
}

impl std::fmt::Debug for DocumentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentStore")
            .field("observer", &self.observer.is_some())
            .field("token_provider", &self.token_provider.is_some())
            .finish_non_exhaustive()
    }
}

impl DocumentStore {
    /// Create a new empty document store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a hook that sees each change before it is applied.
    pub fn with_observer(mut self, observer: Arc<dyn EditObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Register a hook that recomputes tokens after each change.
    pub fn with_token_provider(mut self, provider: Arc<dyn TokenProvider>) -> Self {
        self.token_provider = Some(provider);
        self
    }

    /// Poisoning is ignored: `Document::apply` validates before writing, so a
    /// panicking hook cannot leave text and tokens out of step.
    fn lock(&self) -> MutexGuard<'_, HashMap<Url, Document>> {
        self.documents.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store the provider's tokens for `document`, if it supplies any.
    fn provide_tokens(&self, document: &mut Document) {
        if let Some(provider) = &self.token_provider {
            if let Some(tokens) = provider.tokens_after_edit(&document.snapshot()) {
                document.tokens = Arc::new(tokens);
            }
        }
    }

    /// Open a document with no tokens.
    pub fn open(
        &self,
        uri: Url,
        language_id: &str,
        version: i32,
        text: String,
    ) -> Result<Snapshot, DocumentError> {
        self.insert_document(Document::new(uri, language_id, version, text), false)
    }

    /// Open a document and run the token provider over its initial text.
    ///
    /// Both happen in one critical section, so no other call can observe or
    /// close the document before its first tokens are stored.
    pub fn open_and_tokenize(
        &self,
        uri: Url,
        language_id: &str,
        version: i32,
        text: String,
    ) -> Result<Snapshot, DocumentError> {
        self.insert_document(Document::new(uri, language_id, version, text), true)
    }

    fn insert_document(
        &self,
        mut document: Document,
        tokenize: bool,
    ) -> Result<Snapshot, DocumentError> {
        let mut documents = self.lock();
        if documents.contains_key(&document.uri) {
            return Err(DocumentError::AlreadyOpen(document.uri));
        }
        if tokenize {
            self.provide_tokens(&mut document);
        }
        let snapshot = document.snapshot();
        documents.insert(document.uri.clone(), document);
        tracing::debug!(uri = %snapshot.uri, version = snapshot.version, "opened document");
        Ok(snapshot)
    }

    /// Close a document.
    pub fn close(&self, uri: &Url) -> Result<(), DocumentError> {
        match self.lock().remove(uri) {
            Some(_) => {
                tracing::debug!(%uri, "closed document");
                Ok(())
            }
            None => Err(DocumentError::MissingDocument(uri.clone())),
        }
    }

    /// Apply `changes` in order, then set the document's version.
    ///
    /// The version is taken as given: callers are responsible for supplying
    /// increasing versions. If a change fails, the changes before it stay
    /// applied and the version is left unchanged.
    pub fn edit(
        &self,
        uri: &Url,
        version: i32,
        changes: &[TextChange],
    ) -> Result<Snapshot, DocumentError> {
        let mut documents = self.lock();
        let document = documents
            .get_mut(uri)
            .ok_or_else(|| DocumentError::MissingDocument(uri.clone()))?;

        for change in changes {
            if let Some(observer) = &self.observer {
                observer.before_edit(&document.snapshot(), change);
            }

            document.apply(change)?;
            self.provide_tokens(document);
        }

        if version <= document.version {
            tracing::debug!(
                %uri,
                previous = document.version,
                version,
                "non-increasing document version accepted"
            );
        }
        document.version = version;
        Ok(document.snapshot())
    }

    /// Replace a document's tokens without touching its text or version.
    pub fn update_tokens(&self, uri: &Url, tokens: TokenSet) -> Result<Snapshot, DocumentError> {
        let mut documents = self.lock();
        let document = documents
            .get_mut(uri)
            .ok_or_else(|| DocumentError::MissingDocument(uri.clone()))?;
        document.tokens = Arc::new(tokens);
        Ok(document.snapshot())
    }

    /// Run the token provider against the current state and store its result.
    ///
    /// Without a provider, or when it declines, the stored tokens are kept.
    pub fn recompute_tokens(&self, uri: &Url) -> Result<Snapshot, DocumentError> {
        let mut documents = self.lock();
        let document = documents
            .get_mut(uri)
            .ok_or_else(|| DocumentError::MissingDocument(uri.clone()))?;
        self.provide_tokens(document);
        Ok(document.snapshot())
    }

    /// Get a document's current state.
    pub fn snapshot(&self, uri: &Url) -> Option<Snapshot> {
        self.lock().get(uri).map(Document::snapshot)
    }

    /// URIs of all open documents, sorted.
    pub fn list_open(&self) -> Vec<Url> {
        let mut uris = self.lock().keys().cloned().collect::<Vec<_>>();
        uris.sort();
        uris
    }
}
