//! Query execution with deterministic fallback
//!
//! State machine: a generated query gets one attempt; on failure the static
//! fallback gets one attempt; only then does the operation fail. A query
//! that is already the fallback skips straight to its single attempt. An
//! empty result set is a successful completion, not a failure.

use std::sync::Arc;

use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::graph::{GraphService, PublishOptions, QueryResultSet, QueryType};

use super::StructuredQuery;

/// Query executor
pub struct QueryExecutor {
    graph: Arc<dyn GraphService>,
    fallback: String,
}

impl QueryExecutor {
    pub fn new(graph: Arc<dyn GraphService>, fallback: impl Into<String>) -> Self {
        Self {
            graph,
            fallback: fallback.into(),
        }
    }

    /// Execute the active query, falling back once if it was generated.
    pub async fn execute(
        &self,
        query: StructuredQuery,
        options: &PublishOptions,
    ) -> Result<QueryResultSet> {
        match query {
            StructuredQuery::Generated(text) => {
                match self.graph.query(&text, QueryType::Select, options).await {
                    Ok(results) => {
                        info!(rows = results.len(), "Generated query succeeded");
                        Ok(results)
                    }
                    Err(e) => {
                        warn!(error = %e, "Generated query failed, retrying with fallback");
                        self.run_fallback(options).await
                    }
                }
            }
            StructuredQuery::Fallback => self.run_fallback(options).await,
        }
    }

    async fn run_fallback(&self, options: &PublishOptions) -> Result<QueryResultSet> {
        match self
            .graph
            .query(&self.fallback, QueryType::Select, options)
            .await
        {
            Ok(results) => {
                info!(rows = results.len(), "Fallback query succeeded");
                Ok(results)
            }
            Err(e) => Err(Error::Query(format!("fallback query failed: {}", e))),
        }
    }
}
