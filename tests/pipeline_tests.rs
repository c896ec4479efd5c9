//! End-to-end tests of ingestion and question answering
//!
//! Everything runs against the in-memory vector store with deterministic
//! mock models.

mod common;

use common::mocks::{
    FailingEmbedder, HashEmbedder, MockLLMClient, SlowEmbedder, TestPipelineBuilder, TEST_COLLECTION,
    TEST_DIMS,
};
use docqa::db::vectorstore::{DistanceMetric, InMemoryVectorStore, VectorStore};
use docqa::querylog::{InMemoryQueryLog, QueryLog};
use docqa::rag::cache::{AnswerCache, NoOpCache};
use docqa::rag::chunker::TextChunker;
use docqa::rag::pipeline::PipelineSettings;
use docqa::types::{
    AppError, ChunkPayload, Document, IndexEntry, EMPTY_QUESTION_ANSWER, UNKNOWN_ANSWER,
};
use std::sync::Arc;
use std::time::Duration;

const HANDBOOK: &str = "Employee handbook.\n\n\
    Timesheets must be submitted every Friday before 5pm through the payroll portal. \
    Late timesheets delay payment by one cycle.\n\n\
    Vacation requests need manager approval at least two weeks in advance. \
    Unused vacation days expire at the end of March.";

const PERMITS: &str = "Parking permits are renewed each January at the city office. \
    Bring proof of residence and the vehicle registration. \
    Street cleaning happens on the first Tuesday of every month.";

fn long_document(paragraphs: usize) -> String {
    (0..paragraphs)
        .map(|i| format!("Paragraph {} describes policy item number {} in detail.", i, i))
        .collect::<Vec<_>>()
        .join(" ")
}

// ============= Ingestion =============

#[tokio::test]
async fn test_ingest_indexes_every_chunk() {
    let t = TestPipelineBuilder::new().build();
    let expected = TextChunker::new(200, 40).unwrap().chunk(HANDBOOK).len();

    let report = t
        .pipeline
        .ingest(&Document::new("handbook.txt", HANDBOOK))
        .await
        .unwrap();

    assert_eq!(report.name, "handbook.txt");
    assert_eq!(report.chunks, expected);
    assert!(report.newly_indexed);
    assert_eq!(t.pipeline.index().count().await.unwrap(), expected);
    assert_eq!(t.pipeline.documents(), vec!["handbook.txt".to_string()]);
}

#[tokio::test]
async fn test_reingesting_identical_document_is_a_no_op() {
    let t = TestPipelineBuilder::new().build();
    let doc = Document::new("handbook.txt", HANDBOOK);

    let first = t.pipeline.ingest(&doc).await.unwrap();
    let fingerprint = t.pipeline.corpus().fingerprint();
    let second = t.pipeline.ingest(&doc).await.unwrap();

    assert!(!second.newly_indexed);
    assert_eq!(second.chunks, first.chunks);
    assert_eq!(t.pipeline.index().count().await.unwrap(), first.chunks);
    assert_eq!(t.pipeline.documents().len(), 1);
    assert_eq!(t.pipeline.corpus().fingerprint(), fingerprint);
}

#[tokio::test]
async fn test_point_ids_are_unique_across_documents() {
    let t = TestPipelineBuilder::new().build();

    let a = t
        .pipeline
        .ingest(&Document::new("a.txt", HANDBOOK))
        .await
        .unwrap();
    // Same text under another name must not overwrite the first document's points.
    let b = t
        .pipeline
        .ingest(&Document::new("b.txt", HANDBOOK))
        .await
        .unwrap();
    // Same name, new content.
    let c = t
        .pipeline
        .ingest(&Document::new("a.txt", PERMITS))
        .await
        .unwrap();

    assert_eq!(
        t.pipeline.index().count().await.unwrap(),
        a.chunks + b.chunks + c.chunks
    );
    assert_eq!(t.pipeline.documents(), vec!["a.txt", "b.txt", "a.txt"]);
}

#[tokio::test]
async fn test_blank_document_is_rejected() {
    let t = TestPipelineBuilder::new().build();

    let err = t
        .pipeline
        .ingest(&Document::new("empty.txt", "   \n\n  "))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::InvalidInput(_)));
    assert!(t.pipeline.documents().is_empty());
}

#[tokio::test]
async fn test_failed_ingestion_leaves_index_and_corpus_untouched() {
    let chunker = TextChunker::new(200, 40).unwrap();
    let first_chunks = chunker.chunk(PERMITS).len();
    let long = long_document(20);
    assert!(chunker.chunk(&long).len() > 2);

    // Enough calls for the first document plus one chunk of the second.
    let embedder = Arc::new(FailingEmbedder::new(TEST_DIMS, first_chunks + 1));
    let t = TestPipelineBuilder::new().embedder(embedder).build();

    t.pipeline
        .ingest(&Document::new("permits.txt", PERMITS))
        .await
        .unwrap();
    let fingerprint = t.pipeline.corpus().fingerprint();

    let err = t
        .pipeline
        .ingest(&Document::new("policies.txt", long))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::ModelUnavailable(_)));
    assert!(err.is_retryable());
    assert_eq!(t.pipeline.index().count().await.unwrap(), first_chunks);
    assert_eq!(t.pipeline.documents(), vec!["permits.txt".to_string()]);
    assert_eq!(t.pipeline.corpus().fingerprint(), fingerprint);
}

#[tokio::test]
async fn test_ingest_many_stops_at_first_failure() {
    let t = TestPipelineBuilder::new().build();
    let docs = vec![
        Document::new("handbook.txt", HANDBOOK),
        Document::new("blank.txt", ""),
        Document::new("permits.txt", PERMITS),
    ];

    let batch = t.pipeline.ingest_many(&docs).await;

    assert_eq!(batch.indexed.len(), 1);
    let (name, err) = batch.failed.as_ref().unwrap();
    assert_eq!(name, "blank.txt");
    assert!(matches!(err, AppError::InvalidInput(_)));
    assert_eq!(t.pipeline.documents(), vec!["handbook.txt".to_string()]);
    assert!(batch.into_result().is_err());
}

// ============= Dimension guard =============

#[tokio::test]
async fn test_embedder_dimension_mismatch_is_rejected() {
    let t = TestPipelineBuilder::new()
        .embedder(Arc::new(HashEmbedder::new(TEST_DIMS / 2)))
        .build();

    let err = t
        .pipeline
        .ingest(&Document::new("handbook.txt", HANDBOOK))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        AppError::DimensionMismatch {
            expected: TEST_DIMS,
            actual
        } if actual == TEST_DIMS / 2
    ));
    assert!(t.pipeline.documents().is_empty());
}

#[tokio::test]
async fn test_existing_collection_with_other_dimension_is_rejected() {
    let store = Arc::new(InMemoryVectorStore::new());
    store
        .create_collection(TEST_COLLECTION, TEST_DIMS * 2, DistanceMetric::Cosine)
        .await
        .unwrap();
    let t = TestPipelineBuilder::new().store(store).build();

    let err = t
        .pipeline
        .ingest(&Document::new("handbook.txt", HANDBOOK))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::DimensionMismatch { .. }));
    assert_eq!(t.store.count(TEST_COLLECTION).await.unwrap(), 0);
}

// ============= Question answering =============

#[tokio::test]
async fn test_empty_index_answers_unknown_without_generation() {
    let t = TestPipelineBuilder::new().build();

    let answer = t
        .pipeline
        .ask("When are timesheets due?", None)
        .await
        .unwrap();

    assert_eq!(answer.text, UNKNOWN_ANSWER);
    assert!(answer.sources.is_empty());
    assert_eq!(answer.top_k, 4);
    assert_eq!(t.generator.calls(), 0);
}

#[tokio::test]
async fn test_hits_without_text_answer_unknown_without_generation() {
    let embedder = Arc::new(HashEmbedder::new(TEST_DIMS));
    let t = TestPipelineBuilder::new().embedder(embedder.clone()).build();
    let blank = IndexEntry {
        id: "blank-0".to_string(),
        vector: embedder.vector_for("timesheets due"),
        payload: ChunkPayload {
            source: "scan.pdf".to_string(),
            chunk_index: 0,
            preview: "  ".to_string(),
            text: String::new(),
        },
    };
    t.pipeline.index().upsert(&[blank]).await.unwrap();

    let first = t
        .pipeline
        .ask("When are timesheets due?", None)
        .await
        .unwrap();
    let second = t
        .pipeline
        .ask("When are timesheets due?", None)
        .await
        .unwrap();

    assert_eq!(first.text, UNKNOWN_ANSWER);
    assert!(first.sources.is_empty());
    assert!(!first.cached);
    assert_eq!(second.text, UNKNOWN_ANSWER);
    assert!(second.cached);
    assert_eq!(t.generator.calls(), 0);
}

#[tokio::test]
async fn test_blank_question_short_circuits() {
    let embedder = Arc::new(HashEmbedder::new(TEST_DIMS));
    let log = Arc::new(InMemoryQueryLog::new());
    let t = TestPipelineBuilder::new()
        .embedder(embedder.clone())
        .query_log(log.clone())
        .build();

    let answer = t.pipeline.ask("   \n ", Some(3)).await.unwrap();

    assert_eq!(answer.text, EMPTY_QUESTION_ANSWER);
    assert!(answer.sources.is_empty());
    assert_eq!(answer.top_k, 3);
    assert_eq!(embedder.calls(), 0);
    assert_eq!(t.generator.calls(), 0);
    assert!(log.is_empty());
}

#[tokio::test]
async fn test_answer_is_grounded_in_retrieved_chunks() {
    let t = TestPipelineBuilder::new().build();
    t.pipeline
        .ingest(&Document::new("handbook.txt", HANDBOOK))
        .await
        .unwrap();
    t.pipeline
        .ingest(&Document::new("permits.txt", PERMITS))
        .await
        .unwrap();

    let answer = t
        .pipeline
        .ask("When must timesheets be submitted?", Some(1))
        .await
        .unwrap();

    assert_eq!(answer.text, "Timesheets are due on Friday.");
    assert_eq!(answer.sources, vec!["handbook.txt#p1".to_string()]);
    assert_eq!(answer.top_k, 1);
    assert!(!answer.cached);

    let prompts = t.generator.prompts();
    assert_eq!(prompts.len(), 1);
    let prompt = &prompts[0];
    assert!(prompt.contains("Answer the QUESTION using only the CONTEXT."));
    assert!(prompt.contains("#1 (handbook.txt p1): Employee handbook."));
    assert!(prompt.contains("When must timesheets be submitted?"));
    assert!(!prompt.contains("#2 ("));
}

#[tokio::test]
async fn test_sources_follow_retrieval_order() {
    let t = TestPipelineBuilder::new().build();
    t.pipeline
        .ingest(&Document::new("permits.txt", PERMITS))
        .await
        .unwrap();
    t.pipeline
        .ingest(&Document::new("handbook.txt", HANDBOOK))
        .await
        .unwrap();

    let answer = t
        .pipeline
        .ask("parking permits renewed city office", Some(2))
        .await
        .unwrap();

    assert_eq!(answer.sources.len(), 2);
    assert_eq!(answer.sources[0], "permits.txt#p1");
    let prompt = &t.generator.prompts()[0];
    let first = prompt.find("#1 (").unwrap();
    let second = prompt.find("#2 (").unwrap();
    assert!(first < second);
}

#[tokio::test]
async fn test_top_k_is_clamped_to_maximum() {
    let t = TestPipelineBuilder::new().build();
    let text = long_document(80);
    let report = t
        .pipeline
        .ingest(&Document::new("policies.txt", text))
        .await
        .unwrap();
    assert!(report.chunks > 10);

    let answer = t
        .pipeline
        .ask("policy item number 3", Some(50))
        .await
        .unwrap();

    assert_eq!(answer.top_k, 10);
    assert_eq!(answer.sources.len(), 10);
}

#[tokio::test]
async fn test_zero_top_k_uses_default() {
    let t = TestPipelineBuilder::new().build();
    assert_eq!(t.pipeline.effective_top_k(Some(0)), 4);
    assert_eq!(t.pipeline.effective_top_k(None), 4);
    assert_eq!(t.pipeline.effective_top_k(Some(7)), 7);
    assert_eq!(t.pipeline.effective_top_k(Some(11)), 10);
}

#[tokio::test]
async fn test_blank_generation_becomes_unknown() {
    let t = TestPipelineBuilder::new()
        .generator(Arc::new(MockLLMClient::new("  \n ")))
        .build();
    t.pipeline
        .ingest(&Document::new("handbook.txt", HANDBOOK))
        .await
        .unwrap();

    let answer = t.pipeline.ask("vacation approval", None).await.unwrap();

    assert_eq!(answer.text, UNKNOWN_ANSWER);
    assert!(!answer.sources.is_empty());
}

#[tokio::test]
async fn test_generation_failure_is_reported_and_not_cached() {
    let t = TestPipelineBuilder::new()
        .generator(Arc::new(MockLLMClient::failing()))
        .build();
    t.pipeline
        .ingest(&Document::new("handbook.txt", HANDBOOK))
        .await
        .unwrap();

    let err = t.pipeline.ask("vacation approval", None).await.unwrap_err();
    assert!(matches!(err, AppError::ModelUnavailable(_)));

    let err = t.pipeline.ask("vacation approval", None).await.unwrap_err();
    assert!(matches!(err, AppError::ModelUnavailable(_)));
    assert_eq!(t.generator.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_slow_embedder_times_out() {
    let settings = PipelineSettings {
        call_timeout: Duration::from_secs(2),
        ..PipelineSettings::default()
    };
    let t = TestPipelineBuilder::new()
        .embedder(Arc::new(SlowEmbedder {
            delay: Duration::from_secs(30),
            dims: TEST_DIMS,
        }))
        .settings(settings)
        .build();

    let err = t.pipeline.ask("anything", None).await.unwrap_err();

    assert!(matches!(err, AppError::Timeout(_)));
    assert!(err.is_retryable());
}

// ============= Determinism and caching =============

#[tokio::test]
async fn test_retrieval_is_deterministic_without_cache() {
    let t = TestPipelineBuilder::new()
        .cache(Arc::new(NoOpCache::new()))
        .build();
    t.pipeline
        .ingest(&Document::new("handbook.txt", HANDBOOK))
        .await
        .unwrap();
    t.pipeline
        .ingest(&Document::new("permits.txt", PERMITS))
        .await
        .unwrap();

    let first = t.pipeline.ask("When is payment delayed?", Some(3)).await.unwrap();
    let second = t.pipeline.ask("When is payment delayed?", Some(3)).await.unwrap();

    assert_eq!(first, second);
    assert!(!second.cached);
    let prompts = t.generator.prompts();
    assert_eq!(prompts.len(), 2);
    assert_eq!(prompts[0], prompts[1]);
}

#[tokio::test]
async fn test_repeated_question_is_served_from_cache() {
    let t = TestPipelineBuilder::new().build();
    t.pipeline
        .ingest(&Document::new("handbook.txt", HANDBOOK))
        .await
        .unwrap();

    let first = t.pipeline.ask("When are timesheets due?", None).await.unwrap();
    // Surrounding whitespace does not change the cache key.
    let second = t
        .pipeline
        .ask("  When are timesheets due?  ", None)
        .await
        .unwrap();

    assert!(!first.cached);
    assert!(second.cached);
    assert_eq!(first.text, second.text);
    assert_eq!(first.sources, second.sources);
    assert_eq!(t.generator.calls(), 1);
    assert_eq!(t.pipeline.cache().stats().hits, 1);
}

#[tokio::test]
async fn test_different_top_k_is_a_different_cache_entry() {
    let t = TestPipelineBuilder::new().build();
    t.pipeline
        .ingest(&Document::new("handbook.txt", HANDBOOK))
        .await
        .unwrap();

    t.pipeline.ask("vacation", Some(1)).await.unwrap();
    let answer = t.pipeline.ask("vacation", Some(2)).await.unwrap();

    assert!(!answer.cached);
    assert_eq!(t.generator.calls(), 2);
}

#[tokio::test]
async fn test_ingestion_invalidates_cached_answers() {
    let t = TestPipelineBuilder::new().build();
    t.pipeline
        .ingest(&Document::new("handbook.txt", HANDBOOK))
        .await
        .unwrap();

    t.pipeline.ask("When is street cleaning?", None).await.unwrap();
    assert!(t.pipeline.ask("When is street cleaning?", None).await.unwrap().cached);

    t.pipeline
        .ingest(&Document::new("permits.txt", PERMITS))
        .await
        .unwrap();
    let after = t.pipeline.ask("When is street cleaning?", None).await.unwrap();

    assert!(!after.cached);
    assert!(after.sources.iter().any(|s| s.starts_with("permits.txt#p")));
    assert_eq!(t.generator.calls(), 2);
}

// ============= Query log =============

#[tokio::test]
async fn test_answers_are_logged() {
    let log = Arc::new(InMemoryQueryLog::new());
    let t = TestPipelineBuilder::new().query_log(log.clone()).build();
    t.pipeline
        .ingest(&Document::new("handbook.txt", HANDBOOK))
        .await
        .unwrap();

    t.pipeline.ask("When are timesheets due?", Some(1)).await.unwrap();
    t.pipeline.ask("When are timesheets due?", Some(1)).await.unwrap();

    let records = log.recent(10).await.unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].query, "When are timesheets due?");
    assert_eq!(records[0].answer_preview, "Timesheets are due on Friday.");
    assert_eq!(records[1].sources, vec!["handbook.txt#p1".to_string()]);
    assert!(records[0].timestamp <= records[1].timestamp);
}
