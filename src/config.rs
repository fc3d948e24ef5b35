//! Fixed operation defaults for the service facade.

use serde::{Deserialize, Serialize};

use crate::retrieval::{CONTEXT_CHUNK_SIZE, DEFAULT_SELECTION_LIMIT};

/// Defaults for the plain chat operation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatDefaults {
    pub model: String,
    pub system_prompt: String,
    pub temperature: f64,
    pub max_tokens: u32,
}

impl Default for ChatDefaults {
    fn default() -> Self {
        Self {
            model: "llama-3.1-8b-instant".to_string(),
            system_prompt:
                "You are a helpful AI assistant. Provide clear, accurate, and helpful responses."
                    .to_string(),
            temperature: 0.7,
            max_tokens: 1000,
        }
    }
}

/// Defaults for retrieval-augmented answering.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RagDefaults {
    pub model: String,
    pub system_prompt: String,
    pub temperature: f64,
    pub max_tokens: u32,
    pub chunk_size: usize,
    pub selection_limit: usize,
}

impl Default for RagDefaults {
    fn default() -> Self {
        Self {
            model: "llama-3.1-8b-instant".to_string(),
            system_prompt: "You are a helpful assistant. Answer the user's question based on \
                            the provided context. If the context doesn't contain relevant \
                            information, say so clearly."
                .to_string(),
            temperature: 0.3,
            max_tokens: 800,
            chunk_size: CONTEXT_CHUNK_SIZE,
            selection_limit: DEFAULT_SELECTION_LIMIT,
        }
    }
}

/// Defaults for the embedding operation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EmbeddingDefaults {
    pub dimensions: usize,
}

impl Default for EmbeddingDefaults {
    fn default() -> Self {
        Self { dimensions: 1536 }
    }
}

/// Bundled service configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub chat: ChatDefaults,
    pub rag: RagDefaults,
    pub embedding: EmbeddingDefaults,
}
