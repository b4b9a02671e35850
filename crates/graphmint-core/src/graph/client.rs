//! Graph-node REST client
//!
//! Operations against the node are asynchronous: a submission returns an
//! operation id, and the result is obtained by polling the operation status
//! at the configured frequency up to the configured retry budget. That
//! budget belongs to this client call; callers never layer their own retry
//! on top.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::config::NodeConfig;
use crate::error::{Error, Result};
use crate::ingest::StructuredEnvelope;

use super::GraphService;
use super::types::{NodeInfo, PublishOptions, PublishReceipt, QueryResultSet, QueryType, Ual};

/// Connect timeout for node requests; operation polling has its own budget
const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Graph-node REST client
#[derive(Clone)]
pub struct GraphClient {
    http_client: HttpClient,
    base_url: String,
}

impl std::fmt::Debug for GraphClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphClient")
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Accepted-operation response from the node
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OperationAccepted {
    operation_id: String,
}

/// Operation status returned while polling
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OperationStatus {
    status: String,
    #[serde(default)]
    data: serde_json::Value,
    #[serde(default)]
    error_message: Option<String>,
}

impl GraphClient {
    /// Create a client from node settings
    pub fn new(node: &NodeConfig) -> Result<Self> {
        let http_client = HttpClient::builder()
            .timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(Error::Network)?;

        Ok(Self {
            http_client,
            base_url: base_url(node),
        })
    }

    /// Submit a request and poll its operation until completion or budget
    /// exhaustion.
    async fn submit_and_poll(
        &self,
        path: &str,
        body: serde_json::Value,
        options: &PublishOptions,
    ) -> Result<serde_json::Value> {
        let url = format!("{}/{}", self.base_url, path);

        debug!(url = %url, "Submitting node operation");

        let response = self
            .http_client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(Error::Network)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Other(format!(
                "Node rejected {} request ({}): {}",
                path, status, body
            )));
        }

        let accepted: OperationAccepted = response
            .json()
            .await
            .map_err(|e| Error::Other(format!("Malformed node response: {}", e)))?;

        self.poll_operation(path, &accepted.operation_id, options)
            .await
    }

    /// Poll one operation at `frequency_secs` up to `max_retries` attempts
    async fn poll_operation(
        &self,
        path: &str,
        operation_id: &str,
        options: &PublishOptions,
    ) -> Result<serde_json::Value> {
        let url = format!("{}/{}/{}", self.base_url, path, operation_id);

        for attempt in 0..options.max_retries {
            let response = self
                .http_client
                .get(&url)
                .send()
                .await
                .map_err(Error::Network)?;

            let operation: OperationStatus = response
                .json()
                .await
                .map_err(|e| Error::Other(format!("Malformed operation status: {}", e)))?;

            match operation.status.as_str() {
                "COMPLETED" => {
                    debug!(operation_id = %operation_id, attempts = attempt + 1, "Operation completed");
                    return Ok(operation.data);
                }
                "FAILED" => {
                    let reason = operation
                        .error_message
                        .unwrap_or_else(|| "operation failed without detail".to_string());
                    return Err(Error::Other(reason));
                }
                other => {
                    debug!(
                        operation_id = %operation_id,
                        status = %other,
                        attempt = attempt + 1,
                        "Operation pending"
                    );
                }
            }

            tokio::time::sleep(Duration::from_secs(options.frequency_secs)).await;
        }

        warn!(operation_id = %operation_id, "Operation retry budget exhausted");
        Err(Error::Other(format!(
            "operation {} did not complete within {} attempts",
            operation_id, options.max_retries
        )))
    }
}

#[async_trait]
impl GraphService for GraphClient {
    async fn node_info(&self) -> Result<NodeInfo> {
        let url = format!("{}/info", self.base_url);

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Connectivity(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::Connectivity(format!(
                "node returned {}",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| Error::Connectivity(format!("malformed node info: {}", e)))
    }

    async fn publish(
        &self,
        envelope: &StructuredEnvelope,
        options: &PublishOptions,
    ) -> Result<PublishReceipt> {
        let body = json!({
            "assertion": envelope,
            "blockchain": {
                "name": options.blockchain_name,
                "privateKey": options.private_key,
            },
            "epochsNum": options.epochs_num,
            "contentType": options.content_type,
        });

        let data = self
            .submit_and_poll("publish", body, options)
            .await
            .map_err(|e| Error::Publication(e.to_string()))?;

        let ual_str = data
            .get("ual")
            .or_else(|| data.get("UAL"))
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                Error::Publication("publish result carries no locator".to_string())
            })?;
        let ual = Ual::parse(ual_str)
            .map_err(|e| Error::Publication(format!("malformed locator: {}", e)))?;

        let operation_id = data
            .get("operationId")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();

        Ok(PublishReceipt { ual, operation_id })
    }

    async fn submit_to_paranet(
        &self,
        ual: &Ual,
        paranet: &Ual,
        options: &PublishOptions,
    ) -> Result<()> {
        let body = json!({
            "ual": ual.to_string(),
            "paranetUal": paranet.to_string(),
            "blockchain": {
                "name": options.blockchain_name,
                "privateKey": options.private_key,
            },
        });

        self.submit_and_poll("paranet/submit", body, options)
            .await
            .map_err(|e| Error::ParanetSubmission(e.to_string()))?;

        Ok(())
    }

    async fn query(
        &self,
        query: &str,
        query_type: QueryType,
        options: &PublishOptions,
    ) -> Result<QueryResultSet> {
        let body = json!({
            "query": query,
            "type": query_type.as_str(),
        });

        let data = self
            .submit_and_poll("query", body, options)
            .await
            .map_err(|e| Error::Query(e.to_string()))?;

        let rows = data
            .as_array()
            .or_else(|| data.get("data").and_then(|d| d.as_array()))
            .ok_or_else(|| Error::Query("query result carries no rows".to_string()))?
            .iter()
            .map(|row| {
                row.as_object().cloned().ok_or_else(|| {
                    Error::Query("query result row is not an object".to_string())
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(QueryResultSet::new(rows))
    }
}

/// Build the node base URL from endpoint, port, and API version
fn base_url(node: &NodeConfig) -> String {
    let endpoint = if node.endpoint.starts_with("http://") || node.endpoint.starts_with("https://")
    {
        node.endpoint.clone()
    } else if node.use_ssl {
        format!("https://{}", node.endpoint)
    } else {
        format!("http://{}", node.endpoint)
    };

    format!(
        "{}:{}{}",
        endpoint.trim_end_matches('/'),
        node.port,
        node.api_version
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node_config(endpoint: &str, use_ssl: bool) -> NodeConfig {
        NodeConfig {
            endpoint: endpoint.to_string(),
            port: 8900,
            use_ssl,
            api_version: "/v1".to_string(),
        }
    }

    #[test]
    fn test_base_url_with_scheme() {
        let node = node_config("http://localhost", false);
        assert_eq!(base_url(&node), "http://localhost:8900/v1");
    }

    #[test]
    fn test_base_url_without_scheme() {
        let node = node_config("node.example.com", false);
        assert_eq!(base_url(&node), "http://node.example.com:8900/v1");

        let node = node_config("node.example.com", true);
        assert_eq!(base_url(&node), "https://node.example.com:8900/v1");
    }

    #[test]
    fn test_base_url_trims_trailing_slash() {
        let node = node_config("http://localhost/", false);
        assert_eq!(base_url(&node), "http://localhost:8900/v1");
    }

    #[test]
    fn test_client_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<GraphClient>();
    }

    #[test]
    fn test_operation_status_parsing() {
        let json = r#"{"status": "COMPLETED", "data": {"ual": "did:dkg:base:84532/0xabc/1"}}"#;
        let status: OperationStatus = serde_json::from_str(json).unwrap();
        assert_eq!(status.status, "COMPLETED");
        assert!(status.data.get("ual").is_some());

        let json = r#"{"status": "FAILED", "errorMessage": "insufficient funds"}"#;
        let status: OperationStatus = serde_json::from_str(json).unwrap();
        assert_eq!(status.error_message.as_deref(), Some("insufficient funds"));
    }
}
