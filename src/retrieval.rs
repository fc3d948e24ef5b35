//! Retrieval-context assembly: document chunking, chunk selection and
//! prompt construction for a downstream completion call.

use serde::{Deserialize, Serialize};

use crate::chunker::{chunk_chars, Chunk, ChunkSet};
use crate::error::Error;

/// Characters per document chunk during context assembly.
pub const CONTEXT_CHUNK_SIZE: usize = 1000;
/// Number of chunks the default selector keeps.
pub const DEFAULT_SELECTION_LIMIT: usize = 3;

/// Picks the subset of document chunks that goes into the prompt.
///
/// The seam exists so a similarity-ranked selector can be substituted
/// without touching the chunker or the assembler.
pub trait ChunkSelector: Send + Sync {
    fn select(&self, chunks: &[Chunk]) -> Vec<Chunk>;

    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Takes the first `limit` chunks in index order, ignoring the query
/// entirely. A static placeholder policy, not similarity search: every
/// query over the same document selects the same chunks.
#[derive(Clone, Debug)]
pub struct LeadingChunkSelector {
    limit: usize,
}

impl LeadingChunkSelector {
    pub fn new(limit: usize) -> Self {
        Self { limit }
    }
}

impl Default for LeadingChunkSelector {
    fn default() -> Self {
        Self::new(DEFAULT_SELECTION_LIMIT)
    }
}

impl ChunkSelector for LeadingChunkSelector {
    fn select(&self, chunks: &[Chunk]) -> Vec<Chunk> {
        chunks.iter().take(self.limit).cloned().collect()
    }

    fn name(&self) -> &'static str {
        "leading"
    }
}

/// Everything needed for one retrieval-augmented completion call. Built
/// per query and dropped once the call returns; performs no I/O itself.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetrievalContext {
    pub document_chunks: ChunkSet,
    pub selected: Vec<Chunk>,
    pub context: String,
    pub prompt: String,
}

/// Chunks a document, selects context chunks and renders the outbound
/// prompt template.
pub struct ContextAssembler {
    selector: Box<dyn ChunkSelector>,
    chunk_size: usize,
}

impl Default for ContextAssembler {
    fn default() -> Self {
        Self {
            selector: Box::new(LeadingChunkSelector::default()),
            chunk_size: CONTEXT_CHUNK_SIZE,
        }
    }
}

impl ContextAssembler {
    pub fn new(selector: Box<dyn ChunkSelector>, chunk_size: usize) -> Self {
        Self {
            selector,
            chunk_size,
        }
    }

    pub fn selector_name(&self) -> &'static str {
        self.selector.name()
    }

    /// Assemble the retrieval context for `query` over `document_text`.
    /// The document is chunked in character mode without overlap; selected
    /// chunks are joined with a blank line to form the context block.
    pub fn assemble(&self, document_text: &str, query: &str) -> Result<RetrievalContext, Error> {
        let document_chunks = chunk_chars(document_text, self.chunk_size, 0)?;
        let selected = self.selector.select(&document_chunks.chunks);
        let context = selected
            .iter()
            .map(|chunk| chunk.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        let prompt = format!(
            "Context:\n{context}\n\nQuestion: {query}\n\nPlease answer based on the provided context."
        );
        Ok(RetrievalContext {
            document_chunks,
            selected,
            context,
            prompt,
        })
    }
}
