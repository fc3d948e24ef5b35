//! Text-processing primitives for language-model tooling: byte-level BPE
//! tokenization, windowed chunking with overlap, text-quality evaluation
//! and retrieval-context assembly for a downstream completion call.
//!
//! The [`service::TextToolsService`] facade ties the pieces together; each
//! module is also usable on its own. The merge-rank vocabulary is loaded
//! once at startup ([`vocab::RankTable`]) and shared read-only across all
//! requests; every other value is request-scoped.

pub mod chunker;
pub mod config;
pub mod error;
pub mod evaluate;
pub mod providers;
pub mod retrieval;
pub mod service;
pub mod tokenizer;
pub mod types;
pub mod vocab;

pub use chunker::{chunk_chars, window, Chunk, ChunkSet, ChunkStats};
pub use error::Error;
pub use evaluate::{evaluate, EvaluationReport};
pub use providers::{
    CompletionProvider, DocumentExtractor, EmbeddingProvider, SharedCompletionProvider,
    SharedDocumentExtractor, SharedEmbeddingProvider,
};
pub use retrieval::{ChunkSelector, ContextAssembler, LeadingChunkSelector, RetrievalContext};
pub use service::{TextToolsService, TextToolsServiceBuilder};
pub use tokenizer::Tokenizer;
pub use vocab::RankTable;
