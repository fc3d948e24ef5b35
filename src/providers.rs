//! Collaborator seams: completion, embedding and document extraction.
//!
//! The core never talks to the network itself; it hands work to these
//! traits and wraps whatever they report as [`Error::Collaborator`].
//! Mock implementations are deterministic so tests and offline runs stay
//! reproducible; null implementations always fail, signalling that no
//! provider was configured.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// One outbound completion call, fully specified by the caller.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub prompt: String,
    pub system: String,
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
}

/// Provider answer plus usage accounting.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Completion {
    pub text: String,
    pub total_tokens: u64,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub finish_reason: Option<String>,
}

/// External completion backend. A single awaited call per request; retry
/// policy belongs to the caller.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<Completion, Error>;

    fn identify(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

pub type SharedCompletionProvider = Arc<dyn CompletionProvider>;

/// External embedding backend.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str, dimensions: usize) -> Result<Vec<f32>, Error>;

    fn identify(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

pub type SharedEmbeddingProvider = Arc<dyn EmbeddingProvider>;

/// Turns uploaded file bytes into plain text. PDF and Word extraction are
/// owned externally; only the seam lives here.
pub trait DocumentExtractor: Send + Sync {
    fn extract(&self, bytes: &[u8], mime_type: &str) -> Result<String, Error>;
}

pub type SharedDocumentExtractor = Arc<dyn DocumentExtractor>;

/// Canned completions used for tests and offline runs.
#[derive(Clone, Default)]
pub struct MockCompletionProvider;

impl MockCompletionProvider {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CompletionProvider for MockCompletionProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<Completion, Error> {
        let prompt_tokens = request.prompt.split_whitespace().count() as u64;
        Ok(Completion {
            text: format!("[mock:{}] ok", request.model),
            total_tokens: prompt_tokens + 3,
            prompt_tokens,
            completion_tokens: 3,
            finish_reason: Some("stop".to_string()),
        })
    }

    fn identify(&self) -> &'static str {
        "mock"
    }
}

/// Completion provider that always fails, used when none is configured.
#[derive(Default)]
pub struct NullCompletionProvider;

#[async_trait]
impl CompletionProvider for NullCompletionProvider {
    async fn complete(&self, _request: CompletionRequest) -> Result<Completion, Error> {
        Err(Error::collaborator("completion provider not configured"))
    }

    fn identify(&self) -> &'static str {
        "null"
    }
}

/// Deterministic embeddings derived from a hash of the input.
#[derive(Clone, Default)]
pub struct MockEmbeddingProvider;

impl MockEmbeddingProvider {
    pub fn new() -> Self {
        Self
    }

    pub fn hash_to_vector(input: &str, dimensions: usize) -> Vec<f32> {
        let mut hasher = DefaultHasher::new();
        input.hash(&mut hasher);
        let seed = hasher.finish();
        (0..dimensions)
            .map(|i| {
                let bits = seed.rotate_left((i as u32 % 64) * 7) ^ ((i as u64) << 32);
                // Spread into [-1, 1].
                (bits as f32 / u64::MAX as f32) * 2.0 - 1.0
            })
            .collect()
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    async fn embed(&self, text: &str, dimensions: usize) -> Result<Vec<f32>, Error> {
        Ok(Self::hash_to_vector(text, dimensions))
    }

    fn identify(&self) -> &'static str {
        "mock"
    }
}

/// Embedding provider that always fails, used when none is configured.
#[derive(Default)]
pub struct NullEmbeddingProvider;

#[async_trait]
impl EmbeddingProvider for NullEmbeddingProvider {
    async fn embed(&self, _text: &str, _dimensions: usize) -> Result<Vec<f32>, Error> {
        Err(Error::collaborator("embedding provider not configured"))
    }

    fn identify(&self) -> &'static str {
        "null"
    }
}

/// Reads `text/*` uploads as UTF-8. Anything else is somebody else's job.
#[derive(Clone, Default)]
pub struct PlainTextExtractor;

impl DocumentExtractor for PlainTextExtractor {
    fn extract(&self, bytes: &[u8], mime_type: &str) -> Result<String, Error> {
        if !mime_type.starts_with("text/") && mime_type != "application/octet-stream" {
            return Err(Error::collaborator(format!(
                "unsupported document type: {mime_type}"
            )));
        }
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }
}
