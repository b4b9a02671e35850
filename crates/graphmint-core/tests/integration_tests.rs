//! Graphmint Core Integration Tests
//!
//! End-to-end pipeline tests over deterministic stubs: no network, no real
//! node, no real model.

use std::fs;
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::json;
use tempfile::TempDir;

use graphmint_core::error::{Error, Result};
use graphmint_core::graph::{
    GraphService, NodeInfo, PublishOptions, PublishReceipt, QueryResultSet, QueryType, Ual,
};
use graphmint_core::ingest::{
    AttachmentOutcome, BatchRunner, PublishStatus, StructuredEnvelope, enumerate_assets,
};
use graphmint_core::llm::TextGenerator;
use graphmint_core::query::constructor::{EXAMPLE_QUERY, FALLBACK_QUERY};
use graphmint_core::query::{QueryConstructor, QueryExecutor, StructuredQuery};
use graphmint_core::schema::SchemaTemplate;

struct StubGenerator {
    response: String,
}

#[async_trait]
impl TextGenerator for StubGenerator {
    async fn generate(&self, _prompt: &str) -> Result<String> {
        Ok(self.response.clone())
    }
}

#[derive(Default)]
struct StubGraphState {
    published: Vec<StructuredEnvelope>,
    attached: Vec<(Ual, Ual)>,
    queries: Vec<String>,
}

struct StubGraph {
    probe_ok: bool,
    attach_ok: bool,
    fail_query_marker: Option<String>,
    state: Mutex<StubGraphState>,
    counter: AtomicUsize,
}

impl StubGraph {
    fn new() -> Self {
        Self {
            probe_ok: true,
            attach_ok: true,
            fail_query_marker: None,
            state: Mutex::new(StubGraphState::default()),
            counter: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl GraphService for StubGraph {
    async fn node_info(&self) -> Result<NodeInfo> {
        if self.probe_ok {
            Ok(NodeInfo {
                version: "8.0.0".to_string(),
            })
        } else {
            Err(Error::Connectivity("connection refused".to_string()))
        }
    }

    async fn publish(
        &self,
        envelope: &StructuredEnvelope,
        _options: &PublishOptions,
    ) -> Result<PublishReceipt> {
        let id = self.counter.fetch_add(1, Ordering::SeqCst);
        self.state.lock().unwrap().published.push(envelope.clone());
        Ok(PublishReceipt {
            ual: Ual::parse(&format!("did:dkg:base:84532/0xabc/{}", id)).unwrap(),
            operation_id: format!("op-{}", id),
        })
    }

    async fn submit_to_paranet(
        &self,
        ual: &Ual,
        paranet: &Ual,
        _options: &PublishOptions,
    ) -> Result<()> {
        if self.attach_ok {
            self.state
                .lock()
                .unwrap()
                .attached
                .push((ual.clone(), paranet.clone()));
            Ok(())
        } else {
            Err(Error::ParanetSubmission("submission rejected".to_string()))
        }
    }

    async fn query(
        &self,
        query: &str,
        _query_type: QueryType,
        _options: &PublishOptions,
    ) -> Result<QueryResultSet> {
        self.state.lock().unwrap().queries.push(query.to_string());
        if let Some(marker) = &self.fail_query_marker
            && query.contains(marker)
        {
            return Err(Error::Other("query rejected".to_string()));
        }
        let row = json!({"name": "Launch", "description": "It launched"});
        Ok(QueryResultSet::new(vec![row.as_object().unwrap().clone()]))
    }
}

fn options() -> PublishOptions {
    PublishOptions {
        epochs_num: 2,
        max_retries: 3,
        frequency_secs: 1,
        content_type: "all".to_string(),
        blockchain_name: "base:84532".to_string(),
        private_key: "0xtest".to_string(),
    }
}

fn model_response(description: &str) -> String {
    json!({
        "@context": "http://schema.org",
        "@type": "Event",
        "name": "Synthesized title",
        "description": description,
        "startDate": "2025-06-01T12:00:00Z",
        "keywords": [{"@type": "Text", "@id": "uuid:kw1", "name": "launch"}],
        "about": [{"@type": "Thing", "@id": "uuid:t1", "name": "Launch"}],
        "license": "https://creativecommons.org/licenses/by/4.0/"
    })
    .to_string()
}

#[tokio::test]
async fn test_three_item_batch_scenario() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("a.json"),
        json!({"@type": "Event", "name": "Structured asset"}).to_string(),
    )
    .unwrap();
    fs::write(dir.path().join("b.txt"), "free text from b").unwrap();
    fs::write(dir.path().join("c.json"), "{definitely not json").unwrap();

    let graph = Arc::new(StubGraph::new());
    let runner = BatchRunner::new(
        Arc::new(StubGenerator {
            response: model_response("something the model made up"),
        }),
        graph.clone(),
        None,
    );

    let assets = enumerate_assets(dir.path()).unwrap();
    let outcomes = runner
        .run(&assets, &SchemaTemplate::memory(), &options())
        .await
        .unwrap();

    assert_eq!(outcomes.len(), 3);

    assert!(outcomes[0].is_published(), "a.json should publish");
    assert!(outcomes[1].is_published(), "b.txt should publish");
    match &outcomes[2].status {
        PublishStatus::Failed { reason } => assert!(reason.contains("parse error")),
        _ => panic!("c.json should fail with a parse error"),
    }

    // The free-text asset carries the original text verbatim, regardless of
    // what the model returned.
    let state = graph.state.lock().unwrap();
    assert_eq!(state.published.len(), 2);
    assert_eq!(state.published[1].public["description"], "free text from b");
}

#[tokio::test]
async fn test_attach_failure_keeps_published_outcome() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("a.json"),
        json!({"@type": "Event", "name": "Asset"}).to_string(),
    )
    .unwrap();

    let mut graph = StubGraph::new();
    graph.attach_ok = false;
    let graph = Arc::new(graph);

    let paranet = Ual::parse("did:dkg:base:84532/0xparanet/1").unwrap();
    let runner = BatchRunner::new(
        Arc::new(StubGenerator {
            response: model_response("x"),
        }),
        graph.clone(),
        Some(paranet),
    );

    let assets = enumerate_assets(dir.path()).unwrap();
    let outcomes = runner
        .run(&assets, &SchemaTemplate::memory(), &options())
        .await
        .unwrap();

    match &outcomes[0].status {
        PublishStatus::Published { attachment, .. } => match attachment {
            Some(AttachmentOutcome::AttachFailed { reason }) => {
                assert!(reason.contains("submission rejected"));
            }
            other => panic!("expected attach-failure record, got {:?}", other),
        },
        _ => panic!("publish outcome must not be demoted by attach failure"),
    }
}

#[tokio::test]
async fn test_probe_failure_publishes_nothing() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("a.txt"), "text").unwrap();

    let mut graph = StubGraph::new();
    graph.probe_ok = false;
    let graph = Arc::new(graph);

    let runner = BatchRunner::new(
        Arc::new(StubGenerator {
            response: model_response("x"),
        }),
        graph.clone(),
        None,
    );

    let assets = enumerate_assets(dir.path()).unwrap();
    let err = runner
        .run(&assets, &SchemaTemplate::memory(), &options())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Connectivity(_)));
    assert!(graph.state.lock().unwrap().published.is_empty());
}

#[tokio::test]
async fn test_query_pipeline_with_fallback_equivalence() {
    // The generated query carries a marker the stub rejects; the pipeline
    // must land on the fallback query's results.
    let mut graph = StubGraph::new();
    graph.fail_query_marker = Some("GENERATED_MARKER".to_string());
    let graph = Arc::new(graph);

    let constructor = QueryConstructor::new(Arc::new(StubGenerator {
        response: "```sparql\nSELECT DISTINCT ?name ?description WHERE { ?s a <GENERATED_MARKER> . }\n```"
            .to_string(),
    }));

    let query = constructor
        .construct(
            "what launched?",
            &SchemaTemplate::memory(),
            EXAMPLE_QUERY,
        )
        .await
        .unwrap();
    assert!(query.is_generated());

    let executor = QueryExecutor::new(graph.clone(), FALLBACK_QUERY);
    let results = executor.execute(query, &options()).await.unwrap();

    let direct = executor
        .execute(StructuredQuery::Fallback, &options())
        .await
        .unwrap();
    assert_eq!(results.flatten(), direct.flatten());

    let state = graph.state.lock().unwrap();
    assert!(state.queries[0].contains("GENERATED_MARKER"));
    assert_eq!(state.queries[1], FALLBACK_QUERY);
}

#[tokio::test]
async fn test_generation_failure_recovers_via_fallback() {
    struct NoBlockGenerator;

    #[async_trait]
    impl TextGenerator for NoBlockGenerator {
        async fn generate(&self, _prompt: &str) -> Result<String> {
            Ok("I don't know how to write SPARQL.".to_string())
        }
    }

    let constructor = QueryConstructor::new(Arc::new(NoBlockGenerator));
    let template = SchemaTemplate::memory();

    // Construction fails; the caller's defined recovery is the fallback.
    let query = match constructor
        .construct("what launched?", &template, EXAMPLE_QUERY)
        .await
    {
        Ok(query) => query,
        Err(Error::Generation(_)) => StructuredQuery::Fallback,
        Err(other) => panic!("unexpected error: {:?}", other),
    };
    assert_eq!(query, StructuredQuery::Fallback);

    let graph = Arc::new(StubGraph::new());
    let executor = QueryExecutor::new(graph.clone(), FALLBACK_QUERY);
    let results = executor.execute(query, &options()).await.unwrap();

    assert_eq!(results.len(), 1);
    let state = graph.state.lock().unwrap();
    assert_eq!(state.queries, vec![FALLBACK_QUERY.to_string()]);
}

#[tokio::test]
async fn test_result_rows_flatten_in_service_order() {
    struct OrderedGraph;

    #[async_trait]
    impl GraphService for OrderedGraph {
        async fn node_info(&self) -> Result<NodeInfo> {
            Ok(NodeInfo {
                version: "8.0.0".to_string(),
            })
        }

        async fn publish(
            &self,
            _envelope: &StructuredEnvelope,
            _options: &PublishOptions,
        ) -> Result<PublishReceipt> {
            unimplemented!()
        }

        async fn submit_to_paranet(
            &self,
            _ual: &Ual,
            _paranet: &Ual,
            _options: &PublishOptions,
        ) -> Result<()> {
            unimplemented!()
        }

        async fn query(
            &self,
            _query: &str,
            _query_type: QueryType,
            _options: &PublishOptions,
        ) -> Result<QueryResultSet> {
            let rows = vec![
                json!({"name": "Second", "description": "b"}),
                json!({"name": "First", "description": "a"}),
            ];
            Ok(QueryResultSet::new(
                rows.into_iter()
                    .map(|r| r.as_object().unwrap().clone())
                    .collect(),
            ))
        }
    }

    let executor = QueryExecutor::new(Arc::new(OrderedGraph), FALLBACK_QUERY);
    let results = executor
        .execute(StructuredQuery::Fallback, &options())
        .await
        .unwrap();

    // Service order preserved, not re-sorted by content.
    let flat = results.flatten();
    assert_eq!(flat[0], "description: b, name: Second");
    assert_eq!(flat[1], "description: a, name: First");
}
