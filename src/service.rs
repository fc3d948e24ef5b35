//! Request-shaped facade over the tokenizer, chunker, evaluator and
//! retrieval assembler. The HTTP layer maps these calls onto status codes;
//! nothing here knows about routing.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{field, info_span, Instrument};

use crate::chunker::{window, ChunkStats};
use crate::config::ServiceConfig;
use crate::error::Error;
use crate::evaluate;
use crate::evaluate::EvaluationReport;
use crate::providers::{
    CompletionRequest, MockEmbeddingProvider, NullCompletionProvider, PlainTextExtractor,
    SharedCompletionProvider, SharedDocumentExtractor, SharedEmbeddingProvider,
};
use crate::retrieval::{ChunkSelector, ContextAssembler, LeadingChunkSelector};
use crate::tokenizer::Tokenizer;
use crate::types::{
    ChatResponse, ChunkPreview, ChunkTextRequest, ChunkingReport, DocumentInfo, DocumentSource,
    EmbedRequest, EmbeddingReport, EmbeddingStatistics, EvaluateRequest, RagMetadata, RagRequest,
    RagResponse, TokenRow, TokenStatistics, TokenizationReport,
};
use crate::vocab::{self, RankTable};

const NO_DOCUMENT_PLACEHOLDER: &str =
    "No document provided. This is a sample RAG response using the query alone.";
const PREVIEW_CHARS: usize = 200;

/// Orchestrates the text-processing operations over a shared rank table
/// and the configured collaborators. Cheap to share behind an `Arc`; all
/// per-request state lives in the request itself.
pub struct TextToolsService {
    tokenizer: Tokenizer,
    completion: SharedCompletionProvider,
    embedding: Option<SharedEmbeddingProvider>,
    extractor: SharedDocumentExtractor,
    assembler: ContextAssembler,
    config: ServiceConfig,
}

impl TextToolsService {
    pub fn builder() -> TextToolsServiceBuilder {
        TextToolsServiceBuilder::new()
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn tokenizer(&self) -> &Tokenizer {
        &self.tokenizer
    }

    /// Encode `text` and report per-token rows plus aggregate statistics.
    pub fn tokenize(&self, text: &str) -> Result<TokenizationReport, Error> {
        let span = info_span!("tokenize", tokens = field::Empty, characters = field::Empty);
        let _entered = span.enter();

        let ids = self.tokenizer.encode(text)?;
        let mut tokens = Vec::with_capacity(ids.len());
        for (idx, &id) in ids.iter().enumerate() {
            tokens.push(TokenRow {
                index: idx + 1,
                piece: self.tokenizer.piece(id)?,
                id,
            });
        }

        let piece_chars: usize = tokens.iter().map(|row| row.piece.chars().count()).sum();
        let avg_token_length = if tokens.is_empty() {
            0.0
        } else {
            piece_chars as f64 / tokens.len() as f64
        };
        let unique_tokens = tokens
            .iter()
            .map(|row| row.piece.as_str())
            .collect::<HashSet<_>>()
            .len();

        span.record("tokens", field::display(tokens.len()));
        span.record("characters", field::display(text.chars().count()));

        Ok(TokenizationReport {
            model: self.tokenizer.table().label().to_string(),
            token_count: tokens.len(),
            tokens,
            statistics: TokenStatistics {
                avg_token_length,
                unique_tokens,
                character_count: text.chars().count(),
                word_count: text.split_whitespace().count(),
            },
        })
    }

    /// Token-mode chunking: encode, window over the ids, render each window
    /// back to text through the decoder.
    pub fn chunk_text(&self, request: &ChunkTextRequest) -> Result<ChunkingReport, Error> {
        if request.text.is_empty() {
            return Err(Error::invalid_argument("text is required"));
        }
        if request.chunk_size <= 0 {
            return Err(Error::invalid_argument("chunk_size must be positive"));
        }
        let overlap = request.overlap.unwrap_or(0);
        if overlap < 0 {
            return Err(Error::invalid_argument("overlap must be non-negative"));
        }
        let chunk_size = request.chunk_size as usize;
        let overlap = overlap as usize;

        let span = info_span!("chunk_text", chunks = field::Empty, tokens = field::Empty);
        let _entered = span.enter();

        let ids = self.tokenizer.encode(&request.text)?;
        let chunks = window(&ids, chunk_size, overlap, |range| {
            self.tokenizer.decode(range)
        })?;
        let statistics =
            ChunkStats::compute(&chunks, ids.len(), request.text.chars().count());

        span.record("chunks", field::display(chunks.len()));
        span.record("tokens", field::display(ids.len()));

        Ok(ChunkingReport {
            chunk_size,
            overlap,
            total_chunks: chunks.len(),
            chunks,
            statistics,
        })
    }

    /// Score responses, optionally against ground truths.
    pub fn evaluate(&self, request: &EvaluateRequest) -> Result<EvaluationReport, Error> {
        let span = info_span!(
            "evaluate",
            responses = request.responses.len(),
            with_ground_truth = !request.ground_truths.is_empty(),
        );
        let _entered = span.enter();
        evaluate::evaluate(&request.responses, &request.ground_truths)
    }

    /// One plain completion call with the chat defaults.
    pub async fn chat(&self, message: &str) -> Result<ChatResponse, Error> {
        if message.trim().is_empty() {
            return Err(Error::invalid_argument("message is required"));
        }
        let defaults = &self.config.chat;
        let span = info_span!("chat", model = %defaults.model, tokens_used = field::Empty);

        async {
            let completion = self
                .completion
                .complete(CompletionRequest {
                    prompt: message.to_string(),
                    system: defaults.system_prompt.clone(),
                    model: defaults.model.clone(),
                    temperature: defaults.temperature,
                    max_tokens: defaults.max_tokens,
                })
                .await?;

            tracing::Span::current()
                .record("tokens_used", field::display(completion.total_tokens));

            Ok(ChatResponse {
                model: defaults.model.clone(),
                user_message: message.to_string(),
                assistant_response: completion.text,
                tokens_used: completion.total_tokens,
                prompt_tokens: completion.prompt_tokens,
                completion_tokens: completion.completion_tokens,
                finish_reason: completion.finish_reason,
            })
        }
        .instrument(span)
        .await
    }

    /// Embed `text` through the configured provider, falling back to a
    /// deterministic demo embedding when none is configured.
    pub async fn embed(&self, request: &EmbedRequest) -> Result<EmbeddingReport, Error> {
        if request.text.is_empty() {
            return Err(Error::invalid_argument("text is required"));
        }
        let dimensions = request
            .dimensions
            .unwrap_or(self.config.embedding.dimensions);
        if dimensions == 0 {
            return Err(Error::invalid_argument("dimensions must be positive"));
        }

        let span = info_span!("embed", provider = field::Empty, dimensions = field::Empty);

        async {
            let (embedding, provider, note) = match &self.embedding {
                Some(provider) => {
                    let vector = provider.embed(&request.text, dimensions).await?;
                    (
                        vector,
                        provider.identify().to_string(),
                        "This is a real embedding from the configured provider.".to_string(),
                    )
                }
                None => (
                    MockEmbeddingProvider::hash_to_vector(&request.text, dimensions),
                    "mock".to_string(),
                    "This is a demo embedding. Configure an embedding provider for real \
                     embeddings."
                        .to_string(),
                ),
            };

            let magnitude = embedding
                .iter()
                .map(|value| f64::from(*value) * f64::from(*value))
                .sum::<f64>()
                .sqrt();
            // A provider may hand back an empty vector; report zeroed
            // extremes rather than infinities.
            let (min_value, max_value) = if embedding.is_empty() {
                (0.0, 0.0)
            } else {
                (
                    embedding.iter().copied().fold(f32::INFINITY, f32::min),
                    embedding.iter().copied().fold(f32::NEG_INFINITY, f32::max),
                )
            };

            let span = tracing::Span::current();
            span.record("provider", field::display(&provider));
            span.record("dimensions", field::display(embedding.len()));

            Ok(EmbeddingReport {
                provider,
                dimensions: embedding.len(),
                statistics: EmbeddingStatistics {
                    text_length: request.text.chars().count(),
                    word_count: request.text.split_whitespace().count(),
                    vector_magnitude: magnitude,
                    min_value,
                    max_value,
                },
                embedding,
                note,
            })
        }
        .instrument(span)
        .await
    }

    /// Retrieval-augmented answering: resolve the document, assemble the
    /// context prompt and make one awaited completion call.
    pub async fn rag(&self, request: RagRequest) -> Result<RagResponse, Error> {
        if request.query.trim().is_empty() {
            return Err(Error::invalid_argument("query is required"));
        }

        let span = info_span!(
            "rag",
            selector = self.assembler.selector_name(),
            chunks = field::Empty,
            selected = field::Empty,
            context_length = field::Empty,
        );

        async {
            let resolved = self.resolve_document(request.document).await?;
            let context = self.assembler.assemble(&resolved.text, &request.query)?;

            let span = tracing::Span::current();
            span.record("chunks", field::display(context.document_chunks.chunks.len()));
            span.record("selected", field::display(context.selected.len()));
            span.record(
                "context_length",
                field::display(context.context.chars().count()),
            );

            let defaults = &self.config.rag;
            let completion = self
                .completion
                .complete(CompletionRequest {
                    prompt: context.prompt.clone(),
                    system: defaults.system_prompt.clone(),
                    model: defaults.model.clone(),
                    temperature: defaults.temperature,
                    max_tokens: defaults.max_tokens,
                })
                .await?;

            let relevant_chunks = context
                .selected
                .iter()
                .map(|chunk| ChunkPreview {
                    index: chunk.index,
                    content: preview_of(&chunk.content),
                    full_content: chunk.content.clone(),
                })
                .collect();

            Ok(RagResponse {
                query: request.query,
                document_info: DocumentInfo {
                    filename: resolved.filename,
                    size: resolved.size,
                    mime_type: resolved.mime_type,
                    text_length: resolved.text.chars().count(),
                    chunks_created: context.document_chunks.chunks.len(),
                },
                relevant_chunks,
                answer: completion.text,
                metadata: RagMetadata {
                    model: defaults.model.clone(),
                    tokens_used: completion.total_tokens,
                    retrieval_method: "simple_chunking".to_string(),
                    context_length: context.context.chars().count(),
                },
            })
        }
        .instrument(span)
        .await
    }

    async fn resolve_document(
        &self,
        source: Option<DocumentSource>,
    ) -> Result<ResolvedDocument, Error> {
        match source {
            None => Ok(ResolvedDocument {
                text: NO_DOCUMENT_PLACEHOLDER.to_string(),
                filename: "No file".to_string(),
                size: 0,
                mime_type: "unknown".to_string(),
            }),
            Some(DocumentSource::Text(text)) => Ok(ResolvedDocument {
                size: text.len(),
                text,
                filename: "inline".to_string(),
                mime_type: "text/plain".to_string(),
            }),
            Some(DocumentSource::FilePath(path)) => {
                let text = tokio::fs::read_to_string(&path).await.map_err(|err| {
                    Error::collaborator(format!("failed to read {}: {err}", path.display()))
                })?;
                let filename = path
                    .file_name()
                    .and_then(|name| name.to_str())
                    .unwrap_or("file")
                    .to_string();
                Ok(ResolvedDocument {
                    size: text.len(),
                    text,
                    filename,
                    mime_type: "text/plain".to_string(),
                })
            }
            Some(DocumentSource::Upload {
                bytes,
                mime_type,
                filename,
            }) => {
                let text = self.extractor.extract(&bytes, &mime_type)?;
                Ok(ResolvedDocument {
                    text,
                    filename,
                    size: bytes.len(),
                    mime_type,
                })
            }
        }
    }
}

fn preview_of(content: &str) -> String {
    let mut preview: String = content.chars().take(PREVIEW_CHARS).collect();
    if content.chars().count() > PREVIEW_CHARS {
        preview.push_str("...");
    }
    preview
}

struct ResolvedDocument {
    text: String,
    filename: String,
    size: usize,
    mime_type: String,
}

pub struct TextToolsServiceBuilder {
    table: Option<Arc<RankTable>>,
    completion: Option<SharedCompletionProvider>,
    embedding: Option<SharedEmbeddingProvider>,
    extractor: Option<SharedDocumentExtractor>,
    selector: Option<Box<dyn ChunkSelector>>,
    config: ServiceConfig,
}

impl TextToolsServiceBuilder {
    fn new() -> Self {
        Self {
            table: None,
            completion: None,
            embedding: None,
            extractor: None,
            selector: None,
            config: ServiceConfig::default(),
        }
    }

    pub fn with_rank_table(mut self, table: Arc<RankTable>) -> Self {
        self.table = Some(table);
        self
    }

    pub fn with_completion_provider(mut self, provider: SharedCompletionProvider) -> Self {
        self.completion = Some(provider);
        self
    }

    pub fn with_embedding_provider(mut self, provider: SharedEmbeddingProvider) -> Self {
        self.embedding = Some(provider);
        self
    }

    pub fn with_document_extractor(mut self, extractor: SharedDocumentExtractor) -> Self {
        self.extractor = Some(extractor);
        self
    }

    pub fn with_selector(mut self, selector: Box<dyn ChunkSelector>) -> Self {
        self.selector = Some(selector);
        self
    }

    pub fn with_config(mut self, config: ServiceConfig) -> Self {
        self.config = config;
        self
    }

    /// Build the service. A rank table must either be supplied here or
    /// already be installed process-wide; its absence is a startup error.
    pub fn build(self) -> Result<TextToolsService, Error> {
        let table = match self.table {
            Some(table) => table,
            None => vocab::shared().ok_or_else(|| Error::Encode {
                reason: "no rank table installed".to_string(),
            })?,
        };
        let selector = self
            .selector
            .unwrap_or_else(|| Box::new(LeadingChunkSelector::new(self.config.rag.selection_limit)));
        let assembler = ContextAssembler::new(selector, self.config.rag.chunk_size);

        Ok(TextToolsService {
            tokenizer: Tokenizer::new(table),
            completion: self
                .completion
                .unwrap_or_else(|| Arc::new(NullCompletionProvider)),
            embedding: self.embedding,
            extractor: self
                .extractor
                .unwrap_or_else(|| Arc::new(PlainTextExtractor)),
            assembler,
            config: self.config,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{MockCompletionProvider, MockEmbeddingProvider};
    use crate::vocab::RankTable;
    use tempfile::tempdir;
    use tokio::fs::write;

    fn byte_table() -> Arc<RankTable> {
        let pairs: Vec<(Vec<u8>, u32)> = (0u32..256).map(|b| (vec![b as u8], b)).collect();
        Arc::new(RankTable::from_pairs(pairs, "bytes"))
    }

    fn service() -> TextToolsService {
        TextToolsService::builder()
            .with_rank_table(byte_table())
            .with_completion_provider(Arc::new(MockCompletionProvider::new()))
            .build()
            .unwrap()
    }

    #[test]
    fn tokenize_reports_rows_and_statistics() {
        let report = service().tokenize("hi there").unwrap();
        assert_eq!(report.token_count, 8);
        assert_eq!(report.tokens[0].index, 1);
        assert_eq!(report.tokens[0].piece, "h");
        assert_eq!(report.statistics.word_count, 2);
        assert_eq!(report.statistics.character_count, 8);
        assert_eq!(report.statistics.avg_token_length, 1.0);
    }

    #[test]
    fn tokenize_empty_text_reports_zeros() {
        let report = service().tokenize("").unwrap();
        assert_eq!(report.token_count, 0);
        assert_eq!(report.statistics.avg_token_length, 0.0);
        assert_eq!(report.statistics.unique_tokens, 0);
    }

    #[test]
    fn chunk_text_round_trips_at_zero_overlap() {
        let request = ChunkTextRequest {
            text: "abcdefghijkl".to_string(),
            chunk_size: 5,
            overlap: None,
        };
        let report = service().chunk_text(&request).unwrap();
        let joined: String = report
            .chunks
            .iter()
            .map(|chunk| chunk.content.as_str())
            .collect();
        assert_eq!(joined, "abcdefghijkl");
        assert_eq!(report.statistics.coverage_percentage, 100.0);
    }

    #[test]
    fn chunk_text_rejects_bad_sizes() {
        let svc = service();
        for chunk_size in [0, -1] {
            let err = svc
                .chunk_text(&ChunkTextRequest {
                    text: "abc".to_string(),
                    chunk_size,
                    overlap: None,
                })
                .unwrap_err();
            assert!(matches!(err, Error::InvalidArgument { .. }));
        }

        let err = svc
            .chunk_text(&ChunkTextRequest {
                text: "abc".to_string(),
                chunk_size: 2,
                overlap: Some(-1),
            })
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { .. }));
    }

    #[test]
    fn chunk_text_rejects_empty_text() {
        let err = service()
            .chunk_text(&ChunkTextRequest {
                text: String::new(),
                chunk_size: 4,
                overlap: None,
            })
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { .. }));
    }

    #[test]
    fn chunk_text_overlap_walk_matches_expected_offsets() {
        let request = ChunkTextRequest {
            text: "abcdefghijkl".to_string(),
            chunk_size: 5,
            overlap: Some(2),
        };
        let report = service().chunk_text(&request).unwrap();
        let starts: Vec<usize> = report
            .chunks
            .iter()
            .map(|chunk| chunk.start_offset)
            .collect();
        assert_eq!(starts, vec![0, 3, 6, 9]);
        assert_eq!(report.chunks.last().unwrap().end_offset, 11);
    }

    #[test]
    fn evaluate_delegates_to_the_metrics_module() {
        let report = service()
            .evaluate(&EvaluateRequest {
                responses: vec!["The cat sat.".to_string(), "The cat sat.".to_string()],
                ground_truths: Vec::new(),
            })
            .unwrap();
        assert_eq!(report.overall_score.consistency, 0.5);
    }

    #[tokio::test]
    async fn chat_returns_the_provider_answer() {
        let response = service().chat("hello").await.unwrap();
        assert!(response.assistant_response.contains("mock"));
        assert_eq!(response.model, "llama-3.1-8b-instant");
    }

    #[tokio::test]
    async fn chat_without_provider_surfaces_collaborator_error() {
        let svc = TextToolsService::builder()
            .with_rank_table(byte_table())
            .build()
            .unwrap();
        let err = svc.chat("hello").await.unwrap_err();
        assert!(matches!(err, Error::Collaborator { .. }));
    }

    #[tokio::test]
    async fn rag_without_document_uses_the_placeholder() {
        let response = service()
            .rag(RagRequest {
                document: None,
                query: "what is this?".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(response.document_info.filename, "No file");
        assert_eq!(response.document_info.size, 0);
        assert_eq!(response.metadata.retrieval_method, "simple_chunking");
        assert!(!response.relevant_chunks.is_empty());
    }

    #[tokio::test]
    async fn rag_selects_at_most_three_chunks() {
        let doc = "z".repeat(5000);
        let response = service()
            .rag(RagRequest {
                document: Some(DocumentSource::Text(doc)),
                query: "summarize".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(response.document_info.chunks_created, 5);
        assert_eq!(response.relevant_chunks.len(), 3);
        // Previews are truncated to 200 characters plus an ellipsis.
        assert_eq!(response.relevant_chunks[0].content.chars().count(), 203);
        assert!(response.relevant_chunks[0].content.ends_with("..."));
    }

    #[tokio::test]
    async fn rag_reads_documents_from_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("doc.txt");
        write(&path, "file backed document content").await.unwrap();

        let response = service()
            .rag(RagRequest {
                document: Some(DocumentSource::FilePath(path)),
                query: "what does it say?".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(response.document_info.filename, "doc.txt");
        assert_eq!(
            response.relevant_chunks[0].full_content,
            "file backed document content"
        );
    }

    #[tokio::test]
    async fn rag_missing_file_is_a_collaborator_error() {
        let err = service()
            .rag(RagRequest {
                document: Some(DocumentSource::FilePath("/no/such/file.txt".into())),
                query: "q".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Collaborator { .. }));
    }

    #[tokio::test]
    async fn rag_extracts_uploaded_text_documents() {
        let response = service()
            .rag(RagRequest {
                document: Some(DocumentSource::Upload {
                    bytes: b"uploaded body".to_vec(),
                    mime_type: "text/plain".to_string(),
                    filename: "upload.txt".to_string(),
                }),
                query: "q".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(response.document_info.filename, "upload.txt");
        assert_eq!(response.document_info.size, 13);
    }

    #[tokio::test]
    async fn embed_falls_back_to_the_demo_embedding() {
        let report = service()
            .embed(&EmbedRequest {
                text: "embed me".to_string(),
                dimensions: Some(8),
            })
            .await
            .unwrap();
        assert_eq!(report.dimensions, 8);
        assert_eq!(report.provider, "mock");
        assert!(report.note.contains("demo"));
        assert!(report.statistics.vector_magnitude > 0.0);
        assert!(report.statistics.min_value <= report.statistics.max_value);
    }

    #[tokio::test]
    async fn embed_uses_the_configured_provider() {
        let svc = TextToolsService::builder()
            .with_rank_table(byte_table())
            .with_embedding_provider(Arc::new(MockEmbeddingProvider::new()))
            .build()
            .unwrap();
        let report = svc
            .embed(&EmbedRequest {
                text: "embed me".to_string(),
                dimensions: None,
            })
            .await
            .unwrap();
        assert_eq!(report.dimensions, 1536);
        assert!(report.note.contains("real"));
    }

    #[tokio::test]
    async fn embed_reports_zeroed_extremes_for_empty_vectors() {
        struct EmptyEmbeddingProvider;

        #[async_trait::async_trait]
        impl crate::providers::EmbeddingProvider for EmptyEmbeddingProvider {
            async fn embed(&self, _text: &str, _dimensions: usize) -> Result<Vec<f32>, Error> {
                Ok(Vec::new())
            }

            fn identify(&self) -> &'static str {
                "empty"
            }
        }

        let svc = TextToolsService::builder()
            .with_rank_table(byte_table())
            .with_embedding_provider(Arc::new(EmptyEmbeddingProvider))
            .build()
            .unwrap();
        let report = svc
            .embed(&EmbedRequest {
                text: "anything".to_string(),
                dimensions: Some(8),
            })
            .await
            .unwrap();
        assert_eq!(report.dimensions, 0);
        assert_eq!(report.statistics.min_value, 0.0);
        assert_eq!(report.statistics.max_value, 0.0);
        assert_eq!(report.statistics.vector_magnitude, 0.0);
    }

    #[tokio::test]
    async fn rag_rejects_blank_queries() {
        let err = service()
            .rag(RagRequest {
                document: None,
                query: "   ".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { .. }));
    }
}
