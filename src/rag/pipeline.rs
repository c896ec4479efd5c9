//! RAG orchestrator
//!
//! Ingestion: chunk → embed every chunk → upsert → record in the corpus.
//! Query: cache lookup → embed question → search → assemble context →
//! generate → cache write.
//!
//! Two rules shape the query path. The generator is never called without
//! context, and an answer is cached under a key that includes the corpus
//! fingerprint, so new ingestion can never serve an answer computed against
//! an older corpus.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::db::vectorstore::{point_id, VectorIndex};
use crate::llm::LLMClient;
use crate::querylog::{QueryLog, QueryLogRecord, DEFAULT_PREVIEW_CHARS};
use crate::rag::cache::AnswerCache;
use crate::rag::chunker::TextChunker;
use crate::rag::corpus::{content_digest, CorpusEntry, CorpusState};
use crate::rag::embeddings::Embedder;
use crate::types::{
    Answer, AppError, ChunkPayload, Document, IndexEntry, Result, SearchHit, EMPTY_QUESTION_ANSWER,
    UNKNOWN_ANSWER,
};

/// Tunables for the orchestrator.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// `top_k` used when the caller passes none (or 0)
    pub default_top_k: usize,
    /// Generation length bound
    pub max_new_tokens: usize,
    /// Characters of chunk text stored as `preview`
    pub preview_chars: usize,
    /// Characters of the answer kept in the query log
    pub log_preview_chars: usize,
    /// Deadline for every embedder, store and generator call
    pub call_timeout: Duration,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            default_top_k: 4,
            max_new_tokens: 180,
            preview_chars: 180,
            log_preview_chars: DEFAULT_PREVIEW_CHARS,
            call_timeout: Duration::from_secs(120),
        }
    }
}

/// Outcome of ingesting one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReport {
    pub name: String,
    pub chunks: usize,
    pub digest: String,
    /// `false` when the identical document was already indexed
    pub newly_indexed: bool,
}

/// Outcome of ingesting several documents in order.
#[derive(Debug)]
pub struct BatchReport {
    pub indexed: Vec<IngestReport>,
    /// Name of the document that stopped the batch, with its error
    pub failed: Option<(String, AppError)>,
}

impl BatchReport {
    pub fn into_result(self) -> Result<Vec<IngestReport>> {
        match self.failed {
            None => Ok(self.indexed),
            Some((_, err)) => Err(err),
        }
    }
}

pub struct RagPipeline {
    chunker: TextChunker,
    embedder: Arc<dyn Embedder>,
    index: Arc<VectorIndex>,
    cache: Arc<dyn AnswerCache>,
    generator: Arc<dyn LLMClient>,
    corpus: CorpusState,
    query_log: Option<Arc<dyn QueryLog>>,
    settings: PipelineSettings,
}

impl RagPipeline {
    pub fn new(
        chunker: TextChunker,
        embedder: Arc<dyn Embedder>,
        index: Arc<VectorIndex>,
        cache: Arc<dyn AnswerCache>,
        generator: Arc<dyn LLMClient>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            chunker,
            embedder,
            index,
            cache,
            generator,
            corpus: CorpusState::new(),
            query_log: None,
            settings,
        }
    }

    pub fn with_query_log(mut self, query_log: Arc<dyn QueryLog>) -> Self {
        self.query_log = Some(query_log);
        self
    }

    pub fn corpus(&self) -> &CorpusState {
        &self.corpus
    }

    /// Indexed document names in ingestion order.
    pub fn documents(&self) -> Vec<String> {
        self.corpus.documents()
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    pub fn cache(&self) -> &dyn AnswerCache {
        self.cache.as_ref()
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    // ============= Ingestion =============

    /// Index one document.
    ///
    /// The document joins the corpus only after every chunk has been embedded
    /// and upserted. Any failure before that leaves the corpus untouched.
    pub async fn ingest(&self, document: &Document) -> Result<IngestReport> {
        let start = Instant::now();
        let digest = content_digest(&document.raw_text);

        if self.corpus.contains(&document.name, &digest) {
            tracing::debug!(source = %document.name, "Document already indexed");
            let chunks = self.chunker.chunk(&document.raw_text).len();
            return Ok(IngestReport {
                name: document.name.clone(),
                chunks,
                digest,
                newly_indexed: false,
            });
        }

        let chunks = self.chunker.chunk_document(document);
        if chunks.is_empty() {
            return Err(AppError::InvalidInput(format!(
                "document '{}' contains no text",
                document.name
            )));
        }

        let mut entries = Vec::with_capacity(chunks.len());
        for chunk in &chunks {
            let vector = self
                .timed("embedding", self.embedder.embed(&chunk.text))
                .await?;
            tracing::debug!(source = %chunk.source_name, chunk = chunk.index, "Embedded chunk");

            entries.push(IndexEntry {
                id: point_id(&chunk.source_name, &digest, chunk.index),
                vector,
                payload: ChunkPayload {
                    source: chunk.source_name.clone(),
                    chunk_index: chunk.index,
                    preview: chunk.text.chars().take(self.settings.preview_chars).collect(),
                    text: chunk.text.clone(),
                },
            });
        }

        self.timed("vector upsert", self.index.upsert(&entries))
            .await?;

        let newly_indexed = self.corpus.append(CorpusEntry {
            name: document.name.clone(),
            digest: digest.clone(),
            chunks: chunks.len(),
        });

        tracing::info!(
            source = %document.name,
            chunks = chunks.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Indexed document"
        );

        Ok(IngestReport {
            name: document.name.clone(),
            chunks: chunks.len(),
            digest,
            newly_indexed,
        })
    }

    /// Index documents in order, stopping at the first failure.
    pub async fn ingest_many(&self, documents: &[Document]) -> BatchReport {
        let mut indexed = Vec::with_capacity(documents.len());
        for document in documents {
            match self.ingest(document).await {
                Ok(report) => indexed.push(report),
                Err(err) => {
                    tracing::warn!(
                        source = %document.name,
                        error = %err,
                        indexed = indexed.len(),
                        "Ingestion stopped"
                    );
                    return BatchReport {
                        indexed,
                        failed: Some((document.name.clone(), err)),
                    };
                }
            }
        }
        BatchReport {
            indexed,
            failed: None,
        }
    }

    // ============= Query =============

    /// `top_k` actually used for a request: default for 0/absent, then clamped.
    pub fn effective_top_k(&self, requested: Option<usize>) -> usize {
        let k = match requested {
            Some(k) if k > 0 => k,
            _ => self.settings.default_top_k,
        };
        self.index.clamp_top_k(k)
    }

    /// Answer a question from the indexed corpus.
    pub async fn ask(&self, question: &str, top_k: Option<usize>) -> Result<Answer> {
        let top_k = self.effective_top_k(top_k);
        let question = question.trim();

        if question.is_empty() {
            return Ok(Answer {
                text: EMPTY_QUESTION_ANSWER.to_string(),
                sources: vec![],
                top_k,
                cached: false,
            });
        }

        let start = Instant::now();
        let key = self
            .cache
            .compute_key(question, top_k, &self.corpus.fingerprint());

        if let Some(mut hit) = self.cache.get(&key) {
            hit.cached = true;
            tracing::info!(top_k, cached = true, "Answered from cache");
            self.log_query(question, &hit).await;
            return Ok(hit);
        }

        let vector = self
            .timed("embedding", self.embedder.embed(question))
            .await?;
        let hits = self
            .timed("vector search", self.index.search(&vector, top_k))
            .await?;

        let usable: Vec<(&SearchHit, &str)> = hits
            .iter()
            .filter_map(|hit| {
                let text = chunk_text(&hit.payload);
                (!text.trim().is_empty()).then_some((hit, text))
            })
            .collect();

        let answer = if usable.is_empty() {
            Answer::unknown(top_k)
        } else {
            let context = build_context(&usable);
            let prompt = build_prompt(&context, question);
            let generated = self
                .timed(
                    "generation",
                    self.generator.generate(&prompt, self.settings.max_new_tokens),
                )
                .await?;
            let text = generated.trim();

            Answer {
                text: if text.is_empty() {
                    UNKNOWN_ANSWER.to_string()
                } else {
                    text.to_string()
                },
                sources: usable
                    .iter()
                    .map(|(hit, _)| hit.payload.source_label())
                    .collect(),
                top_k,
                cached: false,
            }
        };

        self.cache.put(&key, answer.clone())?;

        tracing::info!(
            top_k,
            hits = hits.len(),
            sources = answer.sources.len(),
            cached = false,
            duration_ms = start.elapsed().as_millis() as u64,
            "Answered question"
        );

        self.log_query(question, &answer).await;
        Ok(answer)
    }

    async fn log_query(&self, question: &str, answer: &Answer) {
        let Some(log) = &self.query_log else {
            return;
        };
        let record = QueryLogRecord::new(
            question,
            &answer.text,
            &answer.sources,
            self.settings.log_preview_chars,
        );
        if let Err(e) = log.record(record).await {
            tracing::warn!(error = %e, "Failed to write query log");
        }
    }

    async fn timed<T>(&self, what: &str, call: impl Future<Output = Result<T>>) -> Result<T> {
        match tokio::time::timeout(self.settings.call_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(AppError::Timeout(format!(
                "{} did not finish within {}s",
                what,
                self.settings.call_timeout.as_secs_f32()
            ))),
        }
    }
}

/// Full chunk text, falling back to the preview for points stored without it.
fn chunk_text(payload: &ChunkPayload) -> &str {
    if payload.text.is_empty() {
        &payload.preview
    } else {
        &payload.text
    }
}

/// Rank-prefixed context blocks in retrieval order, separated by blank lines.
pub fn build_context(hits: &[(&SearchHit, &str)]) -> String {
    hits.iter()
        .enumerate()
        .map(|(i, (hit, text))| {
            format!(
                "#{} ({} p{}): {}",
                i + 1,
                hit.payload.source,
                hit.payload.position(),
                text
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Grounding-constrained prompt around `context` and `question`.
pub fn build_prompt(context: &str, question: &str) -> String {
    format!(
        "Answer the QUESTION using only the CONTEXT.\n\
         - If the answer is not in the context, say exactly: \"{unknown}\"\n\
         - Keep answers concise and factual. Include bullet points for dates or deadlines.\n\
         \n\
         CONTEXT:\n\
         {context}\n\
         \n\
         QUESTION:\n\
         {question}\n\
         \n\
         ANSWER:",
        unknown = UNKNOWN_ANSWER,
        context = context,
        question = question,
    )
}
