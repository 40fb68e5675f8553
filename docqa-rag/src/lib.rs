//! # docqa-rag
//!
//! Conversational retrieval-augmented question answering over one document.
//!
//! ## Overview
//!
//! A document arrives as paginated text and flows through:
//!
//! 1. [`RecursiveChunker`] — overlapping, page-bounded chunks cut on natural boundaries
//! 2. [`EmbeddingProvider`] — fixed-width vectors (`semantic::FastEmbedProvider` running
//!    all-MiniLM-L6-v2 with the `fastembed` feature, `openai::OpenAIEmbeddingProvider`
//!    with the `openai` feature, or the lexical [`HashingEmbeddingProvider`] offline)
//! 3. [`FlatIndex`] — exact cosine-similarity search behind the [`VectorIndex`] trait
//! 4. [`Retriever`] — top-k retrieval for a query text
//! 5. [`Orchestrator`] — condenses follow-ups into standalone questions, retrieves,
//!    prompts the [`Generator`], and records the turn in the caller's [`Session`]
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use docqa_rag::{Document, HashingEmbeddingProvider, Orchestrator, RagConfig, Session};
//!
//! let orchestrator = Orchestrator::builder()
//!     .config(RagConfig::default())
//!     .embedding_provider(Arc::new(HashingEmbeddingProvider::default()))
//!     .generator(my_generator)
//!     .build()?;
//!
//! let session = Session::new("default");
//! let document = Document::new("manual.pdf").with_page(1, page_one).with_page(2, page_two);
//! orchestrator.ingest(&session, &document).await?;
//!
//! let answer = orchestrator.ask(&session, "What does the warranty cover?").await?;
//! for source in &answer.sources {
//!     println!("page {}", source.page);
//! }
//! ```
//!
//! ## Features
//!
//! - `openai` — OpenAI-compatible embedding and chat-completion clients (reqwest)
//! - `fastembed` — local sentence-transformer embeddings (fastembed / ONNX Runtime)

pub mod chunking;
pub mod config;
pub mod conversation;
pub mod document;
pub mod embedding;
pub mod error;
pub mod generator;
pub mod hashing;
pub mod index;
pub mod prompt;
pub mod retriever;

#[cfg(feature = "openai")]
pub mod openai;
#[cfg(feature = "fastembed")]
pub mod semantic;

pub use chunking::{Chunker, RecursiveChunker};
pub use config::{EmbeddingBackend, GenerationBackend, RagConfig, RagConfigBuilder};
pub use conversation::{
    Answer, ConversationTurn, IngestReport, Orchestrator, OrchestratorBuilder, Session,
    SessionPhase, SessionStatus,
};
pub use document::{Chunk, Document, Page, RetrievalResult, SourceMetadata};
pub use embedding::EmbeddingProvider;
pub use error::{ErrorKind, IndexError, RagError, Result};
pub use generator::Generator;
pub use hashing::HashingEmbeddingProvider;
pub use index::{FlatIndex, IndexEntry, VectorIndex, cosine_similarity};
pub use retriever::Retriever;

#[cfg(feature = "openai")]
pub use openai::{OpenAICompatibleGenerator, OpenAIEmbeddingProvider};
#[cfg(feature = "fastembed")]
pub use semantic::FastEmbedProvider;
