//! Data types for documents, chunks, and retrieval results.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A single page of extracted document text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Page {
    /// 1-based page number as reported by the extractor.
    pub number: u32,
    /// The extracted text of the page.
    pub text: String,
}

impl Page {
    /// Create a page from its number and text.
    pub fn new(number: u32, text: impl Into<String>) -> Self {
        Self { number, text: text.into() }
    }
}

/// A source document: an identifier plus its paginated text.
///
/// Documents are immutable once ingested; a new ingestion supersedes the old one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// Unique identifier for the document (usually the uploaded file name).
    pub id: String,
    /// Pages in reading order.
    pub pages: Vec<Page>,
    /// Key-value metadata associated with the document.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    /// Optional URI pointing to the original source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_uri: Option<String>,
}

impl Document {
    /// Create an empty document with the given identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into(), pages: Vec::new(), metadata: HashMap::new(), source_uri: None }
    }

    /// Create a single-page document.
    pub fn from_text(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(id).with_page(1, text)
    }

    /// Append a page.
    pub fn with_page(mut self, number: u32, text: impl Into<String>) -> Self {
        self.pages.push(Page::new(number, text));
        self
    }

    /// Whether any page carries non-whitespace text.
    pub fn has_text(&self) -> bool {
        self.pages.iter().any(|p| !p.text.trim().is_empty())
    }
}

/// A contiguous span of a single [`Page`], the unit of retrieval.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chunk {
    /// `{document_id}_{index}`.
    pub id: String,
    /// The chunk text, exactly `page.text[start..end]` in characters.
    pub text: String,
    /// The ID of the parent [`Document`].
    pub document_id: String,
    /// Page number the chunk was taken from.
    pub page: u32,
    /// Sequence index of the chunk across the whole document.
    pub index: usize,
    /// Character offset of the first character within the page.
    pub start: usize,
    /// Character offset one past the last character within the page.
    pub end: usize,
}

impl Chunk {
    /// Number of characters in the chunk.
    pub fn char_len(&self) -> usize {
        self.end - self.start
    }

    /// The citation metadata for this chunk.
    pub fn metadata(&self) -> SourceMetadata {
        SourceMetadata {
            source: self.document_id.clone(),
            page: self.page,
            chunk_index: self.index,
            start: self.start,
            end: self.end,
        }
    }
}

/// Metadata returned with an answer so each source can be traced to its page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceMetadata {
    pub source: String,
    pub page: u32,
    pub chunk_index: usize,
    pub start: usize,
    pub end: usize,
}

/// A retrieved [`Chunk`] paired with its cosine similarity to the query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalResult {
    /// The retrieved chunk.
    pub chunk: Chunk,
    /// The similarity score in `[-1, 1]` (higher is more relevant).
    pub score: f32,
}
