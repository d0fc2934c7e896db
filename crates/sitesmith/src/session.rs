use std::sync::Arc;

use futures::{StreamExt, TryStreamExt};
use parking_lot::Mutex;
use sitesmith_artifacts::{extract, ArtifactStore, Extraction};
use sitesmith_chat::{
    AssembleError, Assembled, AssemblerListener, CompletionError, Message, Outcome,
    ResponseAssembler,
};
use sitesmith_upload::DeduplicatingUploader;
use tokio_util::sync::CancellationToken;

use crate::{
    deploy::Deployer,
    publish::{address_artifacts, publish_tree, PublishError, Published},
};

/// The default number of files that are generated at the same time.
pub const DEFAULT_GENERATION_CONCURRENCY: usize = 4;

/// Returns the input that asks the model for a single file of the website.
pub fn file_request(name: &str) -> String {
    format!(
        "Write the complete content of the file {name} as listed in the sitemap, \
         in a ---{name}--- block."
    )
}

/// The result of a single round-trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    /// The assembled assistant message.
    pub assembled: Assembled,
    /// What was extracted from it and applied to the artifact store.
    pub extraction: Extraction,
}

/// A conversation about one website.
///
/// At most one round-trip is active at a time: submitting new input cancels the round-trip that
/// is still streaming and waits until it has been recorded. Every completed (or cancelled)
/// round-trip is appended to the history and its file blocks are applied to the artifact store.
pub struct Session {
    assembler: ResponseAssembler,
    listener: Option<Arc<dyn AssemblerListener>>,
    store: ArtifactStore,
    history: Mutex<Vec<Message>>,
    active: Mutex<Option<CancellationToken>>,
    /// Held for the whole of a round-trip, from reading the history until recording the answer.
    turn: tokio::sync::Mutex<()>,
    generation_concurrency: usize,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("store", &self.store)
            .field("history", &self.history.lock().len())
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Starts a new conversation. A non-empty `system_prompt` becomes the first message.
    pub fn new(assembler: ResponseAssembler, system_prompt: Option<String>) -> Self {
        let history = system_prompt
            .filter(|prompt| !prompt.trim().is_empty())
            .map(Message::system)
            .into_iter()
            .collect();
        Self {
            assembler,
            listener: None,
            store: ArtifactStore::new(),
            history: Mutex::new(history),
            active: Mutex::new(None),
            turn: tokio::sync::Mutex::new(()),
            generation_concurrency: DEFAULT_GENERATION_CONCURRENCY,
        }
    }

    /// Uses `store` instead of a freshly seeded store.
    pub fn with_store(self, store: ArtifactStore) -> Self {
        Self { store, ..self }
    }

    /// Streams the increments of submitted input to `listener`. Fan-out generation is not
    /// reported.
    pub fn with_listener(self, listener: Arc<dyn AssemblerListener>) -> Self {
        Self {
            listener: Some(listener),
            ..self
        }
    }

    /// Sets how many files [`Session::generate_missing`] requests at the same time.
    pub fn with_generation_concurrency(self, generation_concurrency: usize) -> Self {
        Self {
            generation_concurrency: generation_concurrency.max(1),
            ..self
        }
    }

    /// The files of the website.
    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// A copy of the conversation so far.
    pub fn history(&self) -> Vec<Message> {
        self.history.lock().clone()
    }

    /// Cancels the active round-trip, if any.
    pub fn cancel(&self) {
        if let Some(token) = self.active.lock().take() {
            token.cancel();
        }
    }

    /// Registers a new active round-trip and cancels the previous one.
    fn begin(&self) -> CancellationToken {
        let token = CancellationToken::new();
        if let Some(previous) = self.active.lock().replace(token.clone()) {
            if !previous.is_cancelled() {
                tracing::debug!("cancelling the previous round-trip");
                previous.cancel();
            }
        }
        token
    }

    fn apply(&self, assembled: Assembled) -> Turn {
        let extraction = extract(&assembled.content);
        extraction.apply(&self.store);
        tracing::debug!(
            "extracted {} artifacts, skipped {} malformed blocks",
            extraction.artifacts.len(),
            extraction.diagnostics.len()
        );
        Turn {
            assembled,
            extraction,
        }
    }

    /// Sends `input` to the model and applies the answer.
    pub async fn submit(&self, input: &str) -> Result<Turn, AssembleError> {
        let token = self.begin();
        let _turn = self.turn.lock().await;
        let history = self.history();

        let assembler = match &self.listener {
            Some(listener) => self.assembler.clone().with_listener(listener.clone()),
            None => self.assembler.clone(),
        };
        let assembled = assembler.assemble(&history, input, token).await?;
        if assembled.is_cancelled() {
            tracing::info!("the round-trip was cancelled");
        }

        self.record(input, &assembled);
        Ok(self.apply(assembled))
    }

    /// Sends `input` to the model without streaming and applies the answer.
    ///
    /// There is no recovery when the conversation no longer fits the context window of the model.
    pub async fn submit_complete(&self, input: &str) -> Result<Turn, CompletionError> {
        self.cancel();
        let _turn = self.turn.lock().await;
        let mut messages = self.history();
        messages.push(Message::user(input));
        let content = self.assembler.client().complete(&messages).await?;

        let assembled = Assembled {
            content,
            outcome: Outcome::Completed,
        };
        self.record(input, &assembled);
        Ok(self.apply(assembled))
    }

    fn record(&self, input: &str, assembled: &Assembled) {
        let mut history = self.history.lock();
        history.push(Message::user(input));
        history.push(assembled.to_message());
    }

    /// Requests every file that the sitemap lists but the store does not contain, each in an
    /// independent round-trip. The round-trips are not added to the history.
    pub async fn generate_missing(&self) -> Result<Vec<Turn>, AssembleError> {
        let pending = self.store.pending();
        if pending.is_empty() {
            return Ok(Vec::new());
        }

        tracing::info!("generating {} missing files", pending.len());
        let token = self.begin();
        let _turn = self.turn.lock().await;
        let history = self.history();
        futures::stream::iter(pending)
            .map(|name| {
                let token = token.child_token();
                let history = &history;
                async move {
                    let assembled = self
                        .assembler
                        .assemble(history, &file_request(&name), token)
                        .await?;
                    let turn = self.apply(assembled);
                    if !self.store.contains(&name) && !turn.assembled.is_cancelled() {
                        tracing::warn!("the model did not write {name}");
                    }
                    Ok::<_, AssembleError>(turn)
                }
            })
            .buffer_unordered(self.generation_concurrency)
            .try_collect()
            .await
    }

    /// Publishes the current files once every file of the sitemap exists.
    pub async fn publish(
        &self,
        uploader: &DeduplicatingUploader,
        deployer: &dyn Deployer,
        account_id: &str,
    ) -> Result<Published, PublishError> {
        let pending = self.store.pending();
        if !pending.is_empty() {
            return Err(PublishError::NotReady { pending });
        }
        let tree = address_artifacts(&self.store.snapshot())?;
        publish_tree(&tree, uploader, deployer, account_id).await
    }
}
