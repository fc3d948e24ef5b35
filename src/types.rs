//! Request and response value objects for the service operations.
//!
//! Everything here is request-scoped: created at the start of a call,
//! serialized into the response, then dropped.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::chunker::{Chunk, ChunkStats};

/// One token row in a tokenization payload.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TokenRow {
    /// 1-based position in the encoded sequence.
    pub index: usize,
    /// Lossy textual form of the token's bytes.
    pub piece: String,
    pub id: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TokenStatistics {
    pub avg_token_length: f64,
    pub unique_tokens: usize,
    pub character_count: usize,
    pub word_count: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TokenizationReport {
    /// Vocabulary label the ids are stable against.
    pub model: String,
    pub token_count: usize,
    pub tokens: Vec<TokenRow>,
    pub statistics: TokenStatistics,
}

/// Token-mode chunking request. Signed fields mirror the wire shape; the
/// service validates them before any work happens.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChunkTextRequest {
    pub text: String,
    pub chunk_size: i64,
    #[serde(default)]
    pub overlap: Option<i64>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChunkingReport {
    pub chunk_size: usize,
    pub overlap: usize,
    pub total_chunks: usize,
    pub chunks: Vec<Chunk>,
    pub statistics: ChunkStats,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EvaluateRequest {
    pub responses: Vec<String>,
    #[serde(default)]
    pub ground_truths: Vec<String>,
}

/// Where the RAG document comes from. Extraction of binary formats is
/// delegated to the configured [`crate::providers::DocumentExtractor`].
#[derive(Clone, Debug)]
pub enum DocumentSource {
    Text(String),
    FilePath(PathBuf),
    Upload {
        bytes: Vec<u8>,
        mime_type: String,
        filename: String,
    },
}

#[derive(Clone, Debug)]
pub struct RagRequest {
    pub document: Option<DocumentSource>,
    pub query: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DocumentInfo {
    pub filename: String,
    pub size: usize,
    pub mime_type: String,
    pub text_length: usize,
    pub chunks_created: usize,
}

/// Selected chunk with a shortened preview for display.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChunkPreview {
    pub index: usize,
    pub content: String,
    pub full_content: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RagMetadata {
    pub model: String,
    pub tokens_used: u64,
    pub retrieval_method: String,
    pub context_length: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RagResponse {
    pub query: String,
    pub document_info: DocumentInfo,
    pub relevant_chunks: Vec<ChunkPreview>,
    pub answer: String,
    pub metadata: RagMetadata,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub model: String,
    pub user_message: String,
    pub assistant_response: String,
    pub tokens_used: u64,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub finish_reason: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EmbedRequest {
    pub text: String,
    #[serde(default)]
    pub dimensions: Option<usize>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EmbeddingStatistics {
    pub text_length: usize,
    pub word_count: usize,
    pub vector_magnitude: f64,
    pub min_value: f32,
    pub max_value: f32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EmbeddingReport {
    pub provider: String,
    pub dimensions: usize,
    pub embedding: Vec<f32>,
    pub statistics: EmbeddingStatistics,
    pub note: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_text_request_defaults_missing_overlap() {
        let request: ChunkTextRequest =
            serde_json::from_str(r#"{"text":"abc","chunk_size":4}"#).unwrap();
        assert_eq!(request.overlap, None);
        assert_eq!(request.chunk_size, 4);
    }

    #[test]
    fn evaluate_request_defaults_missing_ground_truths() {
        let request: EvaluateRequest =
            serde_json::from_str(r#"{"responses":["one"]}"#).unwrap();
        assert!(request.ground_truths.is_empty());
    }

    #[test]
    fn embed_request_defaults_missing_dimensions() {
        let request: EmbedRequest = serde_json::from_str(r#"{"text":"abc"}"#).unwrap();
        assert_eq!(request.dimensions, None);
    }

    #[test]
    fn tokenization_report_round_trips_through_json() {
        let report = TokenizationReport {
            model: "bytes".to_string(),
            token_count: 1,
            tokens: vec![TokenRow {
                index: 1,
                piece: "a".to_string(),
                id: 97,
            }],
            statistics: TokenStatistics {
                avg_token_length: 1.0,
                unique_tokens: 1,
                character_count: 1,
                word_count: 1,
            },
        };
        let json = serde_json::to_string(&report).unwrap();
        let back: TokenizationReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back.token_count, 1);
        assert_eq!(back.tokens[0].id, 97);
        assert_eq!(back.statistics.avg_token_length, 1.0);
    }

    #[test]
    fn chunking_report_round_trips_through_json() {
        let report = ChunkingReport {
            chunk_size: 5,
            overlap: 2,
            total_chunks: 1,
            chunks: vec![Chunk {
                index: 1,
                content: "hello".to_string(),
                length: 5,
                unit_count: 5,
                start_offset: 0,
                end_offset: 4,
                word_count: 1,
            }],
            statistics: ChunkStats {
                total_chunks: 1,
                total_characters: 5,
                total_units: 5,
                avg_chunk_length: 5.0,
                avg_units_per_chunk: 5.0,
                coverage_percentage: 100.0,
            },
        };
        let json = serde_json::to_string(&report).unwrap();
        let back: ChunkingReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back.chunks[0].end_offset, 4);
        assert_eq!(back.statistics.coverage_percentage, 100.0);
    }
}
