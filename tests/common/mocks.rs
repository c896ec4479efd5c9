//! Mock implementations for testing.
//!
//! Deterministic embedders and generators plus a pipeline builder over the
//! in-memory vector store, so tests never need a model or a Qdrant server.

use async_trait::async_trait;
use docqa::db::vectorstore::{IndexSettings, InMemoryVectorStore, VectorIndex, VectorStore};
use docqa::llm::LLMClient;
use docqa::querylog::QueryLog;
use docqa::rag::cache::{AnswerCache, LruAnswerCache};
use docqa::rag::chunker::TextChunker;
use docqa::rag::embeddings::{normalize_l2, Embedder};
use docqa::rag::pipeline::{PipelineSettings, RagPipeline};
use docqa::types::{AppError, Result};
use parking_lot::Mutex;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const TEST_DIMS: usize = 256;
pub const TEST_COLLECTION: &str = "test_docs";

// ============= Mock Generator =============

/// Mock LLM client returning a fixed response and recording every prompt.
pub struct MockLLMClient {
    response: String,
    should_fail: bool,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl MockLLMClient {
    /// Create a new mock client that returns the given response.
    pub fn new(response: &str) -> Self {
        Self {
            response: response.to_string(),
            should_fail: false,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Create a mock client that always returns an error.
    pub fn failing() -> Self {
        Self {
            should_fail: true,
            ..Self::new("")
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }
}

#[async_trait]
impl LLMClient for MockLLMClient {
    async fn generate(&self, prompt: &str, _max_new_tokens: usize) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().push(prompt.to_string());
        if self.should_fail {
            return Err(AppError::ModelUnavailable("Mock LLM failure".to_string()));
        }
        Ok(self.response.clone())
    }

    fn model_name(&self) -> &str {
        "mock-model"
    }
}

// ============= Mock Embedders =============

/// Bag-of-words embedder: each lowercased word hashed into one bucket.
///
/// Texts sharing words land close together, which is enough for retrieval
/// tests to be meaningful.
pub struct HashEmbedder {
    dims: usize,
    calls: AtomicUsize,
}

impl HashEmbedder {
    pub fn new(dims: usize) -> Self {
        Self {
            dims,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn vector_for(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dims];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let mut hasher = DefaultHasher::new();
            word.to_lowercase().hash(&mut hasher);
            let bucket = (hasher.finish() % self.dims as u64) as usize;
            vector[bucket] += 1.0;
        }
        normalize_l2(&mut vector);
        vector
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.vector_for(text))
    }

    fn dimensions(&self) -> usize {
        self.dims
    }

    fn model_name(&self) -> &str {
        "hash-embedder"
    }
}

/// Succeeds for the first `succeed_for` calls, then fails every call.
pub struct FailingEmbedder {
    inner: HashEmbedder,
    succeed_for: usize,
}

impl FailingEmbedder {
    pub fn new(dims: usize, succeed_for: usize) -> Self {
        Self {
            inner: HashEmbedder::new(dims),
            succeed_for,
        }
    }
}

#[async_trait]
impl Embedder for FailingEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if self.inner.calls() >= self.succeed_for {
            return Err(AppError::ModelUnavailable(
                "Mock embedder failure".to_string(),
            ));
        }
        self.inner.embed(text).await
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }

    fn model_name(&self) -> &str {
        "failing-embedder"
    }
}

/// Never finishes before the pipeline's call deadline.
pub struct SlowEmbedder {
    pub delay: Duration,
    pub dims: usize,
}

#[async_trait]
impl Embedder for SlowEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        tokio::time::sleep(self.delay).await;
        Ok(vec![0.0; self.dims])
    }

    fn dimensions(&self) -> usize {
        self.dims
    }

    fn model_name(&self) -> &str {
        "slow-embedder"
    }
}

// ============= Pipeline Builder =============

/// Everything a test may want to inspect after driving the pipeline.
pub struct TestPipeline {
    pub pipeline: Arc<RagPipeline>,
    pub generator: Arc<MockLLMClient>,
    pub store: Arc<InMemoryVectorStore>,
}

pub struct TestPipelineBuilder {
    embedder: Arc<dyn Embedder>,
    generator: Arc<MockLLMClient>,
    store: Arc<InMemoryVectorStore>,
    cache: Option<Arc<dyn AnswerCache>>,
    query_log: Option<Arc<dyn QueryLog>>,
    chunker: (usize, usize),
    settings: PipelineSettings,
}

impl Default for TestPipelineBuilder {
    fn default() -> Self {
        Self {
            embedder: Arc::new(HashEmbedder::new(TEST_DIMS)),
            generator: Arc::new(MockLLMClient::new("Timesheets are due on Friday.")),
            store: Arc::new(InMemoryVectorStore::new()),
            cache: None,
            query_log: None,
            chunker: (200, 40),
            settings: PipelineSettings::default(),
        }
    }
}

impl TestPipelineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = embedder;
        self
    }

    pub fn generator(mut self, generator: Arc<MockLLMClient>) -> Self {
        self.generator = generator;
        self
    }

    pub fn store(mut self, store: Arc<InMemoryVectorStore>) -> Self {
        self.store = store;
        self
    }

    pub fn cache(mut self, cache: Arc<dyn AnswerCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn query_log(mut self, log: Arc<dyn QueryLog>) -> Self {
        self.query_log = Some(log);
        self
    }

    pub fn chunking(mut self, size: usize, overlap: usize) -> Self {
        self.chunker = (size, overlap);
        self
    }

    pub fn settings(mut self, settings: PipelineSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn build(self) -> TestPipeline {
        let store: Arc<dyn VectorStore> = self.store.clone();
        let index = Arc::new(VectorIndex::new(
            store,
            IndexSettings::new(TEST_COLLECTION, TEST_DIMS),
        ));
        let cache = self
            .cache
            .unwrap_or_else(|| Arc::new(LruAnswerCache::with_defaults()));
        let chunker = TextChunker::new(self.chunker.0, self.chunker.1).unwrap();

        let generator: Arc<dyn LLMClient> = self.generator.clone();
        let mut pipeline = RagPipeline::new(
            chunker,
            self.embedder,
            index,
            cache,
            generator,
            self.settings,
        );
        if let Some(log) = self.query_log {
            pipeline = pipeline.with_query_log(log);
        }

        TestPipeline {
            pipeline: Arc::new(pipeline),
            generator: self.generator,
            store: self.store,
        }
    }
}
