//! Conversational question answering over an ingested document.
//!
//! A [`Session`] holds the state of one conversation: the index of the current
//! document and the turns exchanged so far. The [`Orchestrator`] holds the
//! stateless machinery (chunker, embedder, retriever, generator) and is shared
//! by every session; each call receives the session it operates on.
//!
//! # Example
//!
//! ```rust,ignore
//! use docqa_rag::{Document, Orchestrator, RagConfig, Session};
//!
//! let orchestrator = Orchestrator::builder()
//!     .config(RagConfig::default())
//!     .embedding_provider(embedder)
//!     .generator(generator)
//!     .build()?;
//!
//! let session = Session::new("default");
//! orchestrator.ingest(&session, &document).await?;
//! let answer = orchestrator.ask(&session, "What is the warranty period?").await?;
//! let follow_up = orchestrator.ask(&session, "And for refurbished units?").await?;
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use crate::chunking::{Chunker, RecursiveChunker};
use crate::config::RagConfig;
use crate::document::{Document, SourceMetadata};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::generator::Generator;
use crate::index::{FlatIndex, VectorIndex};
use crate::prompt::{condense_question_prompt, grounded_answer_prompt};
use crate::retriever::Retriever;

/// One answered question.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConversationTurn {
    pub question: String,
    pub answer: String,
}

impl ConversationTurn {
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self { question: question.into(), answer: answer.into() }
    }
}

/// The result of a successful [`Orchestrator::ask`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Answer {
    /// The generated answer.
    pub text: String,
    /// The self-contained question that was used for retrieval.
    pub standalone_question: String,
    /// Metadata of every retrieved chunk, in retrieval order.
    pub sources: Vec<SourceMetadata>,
}

/// Summary of a successful ingestion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IngestReport {
    pub document_id: String,
    pub pages: usize,
    pub chunks: usize,
}

/// Whether a session can answer questions.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    /// No document loaded.
    Idle,
    /// A document is indexed.
    Ready,
}

/// Point-in-time view of a [`Session`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionStatus {
    pub phase: SessionPhase,
    pub document_id: Option<String>,
    pub indexed_chunks: usize,
    pub turns: usize,
}

struct LoadedDocument {
    id: String,
    index: Arc<dyn VectorIndex>,
}

#[derive(Default)]
struct SessionState {
    document: Option<LoadedDocument>,
    history: Vec<ConversationTurn>,
    /// Bumped whenever the document is replaced or the session is reset.
    epoch: u64,
}

/// The per-conversation state: current document index plus history.
///
/// The index and the history are only ever replaced together under one write
/// lock, so no reader can pair an answer with a document that has since been
/// swapped out. `ask` calls on the same session are queued in arrival order,
/// and so are ingestions and resets, so the last upload to arrive wins.
pub struct Session {
    id: String,
    state: RwLock<SessionState>,
    ask_gate: Mutex<()>,
    ingest_gate: Mutex<()>,
}

impl Session {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            state: RwLock::new(SessionState::default()),
            ask_gate: Mutex::new(()),
            ingest_gate: Mutex::new(()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub async fn is_ready(&self) -> bool {
        self.state.read().await.document.is_some()
    }

    pub async fn status(&self) -> SessionStatus {
        let state = self.state.read().await;
        SessionStatus {
            phase: if state.document.is_some() { SessionPhase::Ready } else { SessionPhase::Idle },
            document_id: state.document.as_ref().map(|d| d.id.clone()),
            indexed_chunks: state.document.as_ref().map(|d| d.index.len()).unwrap_or(0),
            turns: state.history.len(),
        }
    }

    /// A copy of the conversation so far, oldest turn first.
    pub async fn history(&self) -> Vec<ConversationTurn> {
        self.state.read().await.history.clone()
    }

    /// Drop the document and the history together.
    ///
    /// Waits for any ingestion already in progress, which it then discards.
    pub async fn reset(&self) {
        let _ingest = self.ingest_gate.lock().await;
        let mut state = self.state.write().await;
        state.document = None;
        state.history.clear();
        state.epoch += 1;
    }

    /// Swap in a new document index and start an empty conversation.
    async fn install(&self, document_id: String, index: Arc<dyn VectorIndex>) {
        let mut state = self.state.write().await;
        state.document = Some(LoadedDocument { id: document_id, index });
        state.history.clear();
        state.epoch += 1;
    }

    async fn snapshot(&self) -> Result<(Arc<dyn VectorIndex>, Vec<ConversationTurn>, u64)> {
        let state = self.state.read().await;
        let document = state.document.as_ref().ok_or_else(|| {
            RagError::NotReady("no document has been ingested; upload a document first".into())
        })?;
        Ok((Arc::clone(&document.index), state.history.clone(), state.epoch))
    }

    /// Append `turn` if the session still holds the document seen at `epoch`.
    async fn append_turn(&self, epoch: u64, turn: ConversationTurn) -> Result<usize> {
        let mut state = self.state.write().await;
        if state.epoch != epoch || state.document.is_none() {
            warn!(session.id = %self.id, "document replaced while a question was being answered");
            return Err(RagError::NotReady(
                "the document was replaced or reset while the question was being answered".into(),
            ));
        }
        state.history.push(turn);
        Ok(state.history.len())
    }
}

/// Coordinates ingestion and question answering for [`Session`]s.
///
/// Construct one via [`Orchestrator::builder()`].
pub struct Orchestrator {
    config: RagConfig,
    embedder: Arc<dyn EmbeddingProvider>,
    generator: Arc<dyn Generator>,
    chunker: Arc<dyn Chunker>,
    retriever: Retriever,
}

impl Orchestrator {
    /// Create a new [`OrchestratorBuilder`].
    pub fn builder() -> OrchestratorBuilder {
        OrchestratorBuilder::default()
    }

    /// Chunk, embed and index `document`, then make it the session's document.
    ///
    /// The new index is fully built before it replaces the old one, and the
    /// history is cleared in the same step. On error the session is unchanged.
    /// Ingestions into one session run one at a time in arrival order.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Ingestion`] if the document has no text and
    /// [`RagError::Embedding`] if embedding fails or exceeds the embedding timeout.
    pub async fn ingest(&self, session: &Session, document: &Document) -> Result<IngestReport> {
        let _ingest = session.ingest_gate.lock().await;
        let chunks = self.chunker.chunk(document).inspect_err(|e| {
            error!(document.id = %document.id, error = %e, "chunking failed");
        })?;
        let chunk_count = chunks.len();

        let timeout = self.config.embedding_timeout();
        let build = FlatIndex::build(chunks, self.embedder.as_ref());
        let index = match tokio::time::timeout(timeout, build).await {
            Ok(result) => result.inspect_err(|e| {
                error!(document.id = %document.id, error = %e, "embedding failed during ingestion");
            })?,
            Err(_) => {
                error!(document.id = %document.id, ?timeout, "embedding timed out");
                return Err(RagError::embedding(
                    self.embedder.name(),
                    format!("embedding '{}' timed out after {timeout:?}", document.id),
                ));
            }
        };

        session.install(document.id.clone(), Arc::new(index)).await;

        info!(
            session.id = %session.id(),
            document.id = %document.id,
            pages = document.pages.len(),
            chunk_count,
            "ingested document"
        );
        Ok(IngestReport {
            document_id: document.id.clone(),
            pages: document.pages.len(),
            chunks: chunk_count,
        })
    }

    /// Clear the session's document and history.
    pub async fn reset(&self, session: &Session) {
        session.reset().await;
        info!(session.id = %session.id(), "session reset");
    }

    /// Answer `question` from the session's document, taking prior turns into account.
    ///
    /// With a non-empty history the question is first rewritten into a
    /// standalone question by the generator; retrieval and answering use the
    /// rewritten form, while the history records the question as asked.
    /// The turn is appended only if every step succeeds, so a failed or
    /// cancelled call leaves the history untouched.
    ///
    /// # Errors
    ///
    /// - [`RagError::InvalidInput`] for a blank question
    /// - [`RagError::NotReady`] when no document is loaded, or it was replaced mid-call
    /// - [`RagError::Embedding`] / [`RagError::Index`] from retrieval
    /// - [`RagError::Generation`] when the generator fails or times out
    pub async fn ask(&self, session: &Session, question: &str) -> Result<Answer> {
        if question.trim().is_empty() {
            return Err(RagError::InvalidInput("question must not be empty".into()));
        }

        let _turn = session.ask_gate.lock().await;
        let (index, history, epoch) = session.snapshot().await?;

        let standalone_question = if history.is_empty() {
            question.to_string()
        } else {
            self.condense(&history, question).await?
        };
        debug!(session.id = %session.id(), %standalone_question, "standalone question");

        let results = self
            .retriever
            .retrieve(&standalone_question, self.embedder.as_ref(), index.as_ref())
            .await?;

        let prompt = grounded_answer_prompt(&standalone_question, &results);
        let text = self.generate(&prompt).await?.trim().to_string();
        let sources: Vec<SourceMetadata> = results.iter().map(|r| r.chunk.metadata()).collect();

        let turns = session.append_turn(epoch, ConversationTurn::new(question, text.clone())).await?;

        info!(
            session.id = %session.id(),
            source_count = sources.len(),
            turns,
            "answered question"
        );
        Ok(Answer { text, standalone_question, sources })
    }

    async fn condense(&self, history: &[ConversationTurn], question: &str) -> Result<String> {
        let prompt = condense_question_prompt(history, question);
        let rewritten = self.generate(&prompt).await?;
        let rewritten = rewritten.trim();
        if rewritten.is_empty() {
            warn!("generator returned an empty standalone question; using the question as asked");
            return Ok(question.to_string());
        }
        Ok(rewritten.to_string())
    }

    /// Call the generator under the configured timeout.
    async fn generate(&self, prompt: &str) -> Result<String> {
        let name = self.generator.name();
        let timeout = self.config.generation_timeout();
        let call = self.generator.generate(prompt, self.config.temperature);

        match tokio::time::timeout(timeout, call).await {
            Ok(Ok(text)) => Ok(text),
            Ok(Err(e)) => {
                error!(generator = name, error = %e, "generation failed");
                match e {
                    RagError::Generation { .. } => Err(e),
                    other => Err(RagError::generation(name, other.to_string())),
                }
            }
            Err(_) => {
                error!(generator = name, ?timeout, "generation timed out");
                Err(RagError::generation(name, format!("timed out after {timeout:?}")))
            }
        }
    }
}

/// Builder for constructing an [`Orchestrator`].
///
/// The embedding provider and the generator are required. The chunker and
/// retriever default to [`RecursiveChunker`] and [`Retriever`] configured from
/// the [`RagConfig`].
#[derive(Default)]
pub struct OrchestratorBuilder {
    config: Option<RagConfig>,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    generator: Option<Arc<dyn Generator>>,
    chunker: Option<Arc<dyn Chunker>>,
    retriever: Option<Retriever>,
}

impl OrchestratorBuilder {
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedder = Some(provider);
        self
    }

    pub fn generator(mut self, generator: Arc<dyn Generator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn chunker(mut self, chunker: Arc<dyn Chunker>) -> Self {
        self.chunker = Some(chunker);
        self
    }

    pub fn retriever(mut self, retriever: Retriever) -> Self {
        self.retriever = Some(retriever);
        self
    }

    /// Build the [`Orchestrator`].
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Configuration`] if the config is invalid or the
    /// embedding provider or generator is missing.
    pub fn build(self) -> Result<Orchestrator> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let embedder = self
            .embedder
            .ok_or_else(|| RagError::Configuration("embedding_provider is required".into()))?;
        let generator =
            self.generator.ok_or_else(|| RagError::Configuration("generator is required".into()))?;
        let chunker = match self.chunker {
            Some(chunker) => chunker,
            None => Arc::new(RecursiveChunker::from_config(&config)?),
        };
        let retriever = self.retriever.unwrap_or_else(|| Retriever::from_config(&config));

        Ok(Orchestrator { config, embedder, generator, chunker, retriever })
    }
}
