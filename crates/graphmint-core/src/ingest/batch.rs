//! Batch orchestration
//!
//! Drives the normalize -> publish -> attach sequence over an enumerated
//! input list. Items are processed strictly one at a time: publication is a
//! signed transaction against a single signer account, and concurrent
//! submissions from the same signer risk transaction-ordering conflicts at
//! the node. Sequential processing is a correctness requirement here, not a
//! performance choice.

use std::sync::Arc;

use tracing::{info, warn};

use crate::error::Result;
use crate::graph::{GraphService, PublishOptions, Ual};
use crate::llm::TextGenerator;
use crate::schema::SchemaTemplate;

use super::normalizer::Normalizer;
use super::publisher::{PublicationOutcome, Publisher};
use super::source::AssetFile;

/// Batch orchestrator
pub struct BatchRunner {
    normalizer: Normalizer,
    publisher: Publisher,
}

impl BatchRunner {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        graph: Arc<dyn GraphService>,
        paranet: Option<Ual>,
    ) -> Self {
        Self {
            normalizer: Normalizer::new(generator),
            publisher: Publisher::new(graph, paranet),
        }
    }

    /// Run the batch over enumerated asset files.
    ///
    /// One connectivity probe precedes the first item; a probe failure
    /// aborts the run with zero outcomes. After that, every failure is
    /// per-item: the returned sequence always has one outcome per input,
    /// in input order. Re-running the same inputs mints new independent
    /// assets; no deduplication happens at this layer.
    pub async fn run(
        &self,
        assets: &[AssetFile],
        template: &SchemaTemplate,
        options: &PublishOptions,
    ) -> Result<Vec<PublicationOutcome>> {
        let node = self.publisher.probe().await?;
        info!(version = %node.version, "Connected to graph node");

        let mut outcomes = Vec::with_capacity(assets.len());

        for asset in assets {
            info!(source = %asset.name, "Processing asset");
            let outcome = self.process_item(asset, template, options).await;
            if !outcome.is_published() {
                warn!(source = %asset.name, "Item failed, continuing batch");
            }
            outcomes.push(outcome);
        }

        Ok(outcomes)
    }

    /// One item, fully completed before the next begins. Read, transform,
    /// and publish failures are all caught at this boundary.
    async fn process_item(
        &self,
        asset: &AssetFile,
        template: &SchemaTemplate,
        options: &PublishOptions,
    ) -> PublicationOutcome {
        let input = match asset.read() {
            Ok(input) => input,
            Err(e) => return PublicationOutcome::failed(&asset.name, e.to_string()),
        };

        let envelope = match self.normalizer.normalize(&input, template).await {
            Ok(envelope) => envelope,
            Err(e) => return PublicationOutcome::failed(&asset.name, e.to_string()),
        };

        self.publisher
            .publish_one(&asset.name, &envelope, options)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::graph::{NodeInfo, PublishReceipt, QueryResultSet, QueryType};
    use crate::ingest::StructuredEnvelope;
    use crate::ingest::source::enumerate_assets;
    use async_trait::async_trait;
    use serde_json::json;
    use std::fs;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    struct StubGenerator {
        response: String,
    }

    #[async_trait]
    impl TextGenerator for StubGenerator {
        async fn generate(&self, _prompt: &str) -> Result<String> {
            Ok(self.response.clone())
        }
    }

    /// Records each published description so tests can assert on ordering
    /// and content.
    struct RecordingGraph {
        probe_ok: bool,
        published: Mutex<Vec<StructuredEnvelope>>,
        counter: AtomicUsize,
    }

    impl RecordingGraph {
        fn new(probe_ok: bool) -> Self {
            Self {
                probe_ok,
                published: Mutex::new(Vec::new()),
                counter: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl GraphService for RecordingGraph {
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
            self.published.lock().unwrap().push(envelope.clone());
            let id = self.counter.fetch_add(1, Ordering::SeqCst);
            Ok(PublishReceipt {
                ual: Ual::parse(&format!("did:dkg:base:84532/0xabc/{}", id)).unwrap(),
                operation_id: format!("op-{}", id),
            })
        }

        async fn submit_to_paranet(
            &self,
            _ual: &Ual,
            _paranet: &Ual,
            _options: &PublishOptions,
        ) -> Result<()> {
            Ok(())
        }

        async fn query(
            &self,
            _query: &str,
            _query_type: QueryType,
            _options: &PublishOptions,
        ) -> Result<QueryResultSet> {
            Ok(QueryResultSet::default())
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
            "name": "Title",
            "description": description,
            "startDate": "2025-06-01T12:00:00Z",
            "keywords": [{"@type": "Text", "@id": "uuid:kw1", "name": "kw"}],
            "about": [{"@type": "Thing", "@id": "uuid:t1", "name": "Topic"}],
            "license": "https://creativecommons.org/licenses/by/4.0/"
        })
        .to_string()
    }

    fn runner(graph: Arc<RecordingGraph>, response: &str) -> BatchRunner {
        BatchRunner::new(
            Arc::new(StubGenerator {
                response: response.to_string(),
            }),
            graph,
            None,
        )
    }

    #[tokio::test]
    async fn test_mixed_batch_isolates_failures_and_preserves_order() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("a.json"),
            json!({"@type": "Event", "name": "Structured"}).to_string(),
        )
        .unwrap();
        fs::write(dir.path().join("b.txt"), "original free text").unwrap();
        fs::write(dir.path().join("c.json"), "{malformed").unwrap();

        let graph = Arc::new(RecordingGraph::new(true));
        let runner = runner(graph.clone(), &model_response("drifted description"));

        let assets = enumerate_assets(dir.path()).unwrap();
        let outcomes = runner
            .run(&assets, &SchemaTemplate::memory(), &options())
            .await
            .unwrap();

        assert_eq!(outcomes.len(), 3);
        assert_eq!(outcomes[0].source, "a.json");
        assert!(outcomes[0].is_published());
        assert_eq!(outcomes[1].source, "b.txt");
        assert!(outcomes[1].is_published());
        assert_eq!(outcomes[2].source, "c.json");
        assert!(!outcomes[2].is_published());

        match &outcomes[2].status {
            crate::ingest::PublishStatus::Failed { reason } => {
                assert!(reason.contains("parse error"));
            }
            _ => panic!("expected failure for malformed json"),
        }

        // The free-text item must be published with the original text, not
        // the model's drifted description.
        let published = graph.published.lock().unwrap();
        assert_eq!(published.len(), 2);
        assert_eq!(published[1].public["description"], "original free text");
    }

    #[tokio::test]
    async fn test_probe_failure_yields_zero_outcomes() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.txt"), "text").unwrap();

        let graph = Arc::new(RecordingGraph::new(false));
        let runner = runner(graph.clone(), &model_response("x"));

        let assets = enumerate_assets(dir.path()).unwrap();
        let err = runner
            .run(&assets, &SchemaTemplate::memory(), &options())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Connectivity(_)));
        assert!(graph.published.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_transform_failure_does_not_reach_publisher() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.txt"), "text").unwrap();

        let graph = Arc::new(RecordingGraph::new(true));
        let runner = runner(graph.clone(), "no structured block in this response");

        let assets = enumerate_assets(dir.path()).unwrap();
        let outcomes = runner
            .run(&assets, &SchemaTemplate::memory(), &options())
            .await
            .unwrap();

        assert_eq!(outcomes.len(), 1);
        assert!(!outcomes[0].is_published());
        assert!(graph.published.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_batch_completes_with_no_outcomes() {
        let dir = TempDir::new().unwrap();
        let graph = Arc::new(RecordingGraph::new(true));
        let runner = runner(graph, &model_response("x"));

        let assets = enumerate_assets(dir.path()).unwrap();
        let outcomes = runner
            .run(&assets, &SchemaTemplate::memory(), &options())
            .await
            .unwrap();
        assert!(outcomes.is_empty());
    }
}
