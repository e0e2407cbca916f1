mod common;

use std::sync::Arc;

use common::HashEmbedder;
use digimind_model::MockModel;
use digimind_rag::{FlatIndex, IngestPipeline, RawDocument, RetrievalAnswerer};
use digimind_telemetry::{SharedTraceStorage, SpanCaptureLayer};
use tracing_subscriber::layer::SubscriberExt;

fn capture() -> (SharedTraceStorage, tracing::subscriber::DefaultGuard) {
    let storage = SharedTraceStorage::new();
    let subscriber = tracing_subscriber::registry().with(SpanCaptureLayer::new(storage.clone()));
    (storage, tracing::subscriber::set_default(subscriber))
}

#[tokio::test]
async fn answer_stages_close_in_order_under_one_query_id() {
    let (storage, _guard) = capture();

    let model = Arc::new(MockModel::new("mock").with_response("ok"));
    let answerer = RetrievalAnswerer::new(HashEmbedder::shared(), model);
    answerer.answer("anything", &FlatIndex::new(), 2).await.unwrap();

    let keys = storage.keys();
    assert_eq!(keys.len(), 1);
    let spans = storage.get_trace(&keys[0]).unwrap();
    let names: Vec<_> = spans.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, ["rag.embed_query", "rag.retrieve", "rag.compose_prompt", "rag.generate", "rag.answer"]);

    let root = spans.last().unwrap();
    assert_eq!(root.attribute("model"), Some("llama-3.3-70b-versatile"));
    assert!(spans[..4].iter().all(|s| s.parent_id.as_deref() == Some(root.id.as_str())));
    assert!(spans.windows(2).all(|w| w[0].end_time <= w[1].end_time));
}

#[tokio::test]
async fn ingest_runs_get_their_own_trace() {
    let (storage, _guard) = capture();

    let pipeline =
        IngestPipeline::builder().embedding_provider(HashEmbedder::shared()).without_persistence().build().unwrap();
    pipeline.ingest(&[RawDocument::new("a.txt", "alpha")]).await.unwrap();
    pipeline.ingest(&[RawDocument::new("b.txt", "beta")]).await.unwrap();

    let keys = storage.keys();
    assert_eq!(keys.len(), 2);
    for key in keys {
        let spans = storage.get_trace(&key).unwrap();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].name, "rag.ingest");
        assert_eq!(spans[0].attributes.get("document_count"), Some(&serde_json::json!(1)));
    }
}
