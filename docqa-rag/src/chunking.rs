//! Document chunking.
//!
//! This module provides the [`Chunker`] trait and [`RecursiveChunker`], which
//! cuts each page into overlapping windows that end on the most natural
//! boundary available: paragraph, then sentence, then word, then a raw cut.

use tracing::debug;

use crate::config::RagConfig;
use crate::document::{Chunk, Document};
use crate::error::{RagError, Result};

/// A strategy for splitting documents into chunks.
pub trait Chunker: Send + Sync {
    /// Split a document into chunks, in page order.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Ingestion`] if the document has no extractable text
    /// or carries content that is not plain text.
    fn chunk(&self, document: &Document) -> Result<Vec<Chunk>>;
}

/// Splits each page into windows of at most `chunk_size` characters.
///
/// Consecutive chunks of the same page share exactly `chunk_overlap`
/// characters, and a chunk never spans two pages. Within a window the cut is
/// placed on the last paragraph break (`\n\n`); when there is none, on the last
/// sentence end (`.`, `!` or `?` followed by whitespace, or a line break); then
/// on the last whitespace; and only as a last resort in the middle of a word.
/// Offsets and lengths are counted in characters, not bytes.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::RecursiveChunker;
///
/// let chunker = RecursiveChunker::new(500, 50)?;
/// let chunks = chunker.chunk(&document)?;
/// ```
#[derive(Debug, Clone)]
pub struct RecursiveChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Boundary {
    Paragraph,
    Sentence,
    Word,
}

impl RecursiveChunker {
    /// Create a new `RecursiveChunker`.
    ///
    /// # Arguments
    ///
    /// * `chunk_size` — maximum number of characters per chunk
    /// * `chunk_overlap` — number of characters shared by consecutive chunks
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Configuration`] if `chunk_size` is zero or
    /// `chunk_overlap >= chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 || chunk_overlap >= chunk_size {
            return Err(RagError::Configuration(format!(
                "invalid chunking parameters: chunk_size={chunk_size}, chunk_overlap={chunk_overlap}"
            )));
        }
        Ok(Self { chunk_size, chunk_overlap })
    }

    /// Create a chunker from the sizes in a [`RagConfig`].
    pub fn from_config(config: &RagConfig) -> Result<Self> {
        Self::new(config.chunk_size, config.chunk_overlap)
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Character spans `(start, end)` covering `chars`.
    fn spans(&self, chars: &[char]) -> Vec<(usize, usize)> {
        let mut spans = Vec::new();
        let mut start = 0;
        loop {
            let end = self.window_end(chars, start);
            spans.push((start, end));
            if end >= chars.len() {
                break;
            }
            // end > start + overlap, so every step moves forward.
            start = end - self.chunk_overlap;
        }
        spans
    }

    /// Where the window beginning at `start` should end.
    fn window_end(&self, chars: &[char], start: usize) -> usize {
        let limit = start + self.chunk_size;
        if chars.len() <= limit {
            return chars.len();
        }

        let lowest = start + self.chunk_overlap + 1;
        for level in [Boundary::Paragraph, Boundary::Sentence, Boundary::Word] {
            let found = (lowest..=limit).rev().find(|&e| boundary_before(chars, e) == Some(level));
            if let Some(end) = found {
                return end;
            }
        }
        limit
    }
}

impl Default for RecursiveChunker {
    fn default() -> Self {
        Self { chunk_size: 500, chunk_overlap: 50 }
    }
}

/// Classify the gap between `chars[pos - 1]` and `chars[pos]`.
fn boundary_before(chars: &[char], pos: usize) -> Option<Boundary> {
    let prev = chars[pos - 1];
    if !prev.is_whitespace() {
        return None;
    }
    let before = pos.checked_sub(2).map(|i| chars[i]);
    match (before, prev) {
        (Some('\n'), '\n') => Some(Boundary::Paragraph),
        (_, '\n') => Some(Boundary::Sentence),
        (Some('.' | '!' | '?'), _) => Some(Boundary::Sentence),
        _ => Some(Boundary::Word),
    }
}

impl Chunker for RecursiveChunker {
    fn chunk(&self, document: &Document) -> Result<Vec<Chunk>> {
        if let Some(page) = document.pages.iter().find(|p| p.text.contains('\0')) {
            return Err(RagError::Ingestion(format!(
                "page {} of '{}' contains binary data; only extracted text can be ingested",
                page.number, document.id
            )));
        }
        if !document.has_text() {
            return Err(RagError::Ingestion(format!(
                "document '{}' contains no extractable text",
                document.id
            )));
        }

        let mut chunks = Vec::new();
        for page in &document.pages {
            if page.text.trim().is_empty() {
                continue;
            }
            let chars: Vec<char> = page.text.chars().collect();
            for (start, end) in self.spans(&chars) {
                let index = chunks.len();
                chunks.push(Chunk {
                    id: format!("{}_{index}", document.id),
                    text: chars[start..end].iter().collect(),
                    document_id: document.id.clone(),
                    page: page.number,
                    index,
                    start,
                    end,
                });
            }
        }

        debug!(document.id = %document.id, chunk_count = chunks.len(), "chunked document");
        Ok(chunks)
    }
}
