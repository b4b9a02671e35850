//! Graph-node integration
//!
//! The decentralized knowledge graph node is an external collaborator:
//! storage, consensus, transaction signing, and content addressing all live
//! behind its REST API. This module holds the narrow request/response
//! contract and the reqwest client that drives it.

pub mod client;
pub mod types;

pub use client::GraphClient;
pub use types::{NodeInfo, PublishOptions, PublishReceipt, QueryResultSet, QueryType, Ual};

use async_trait::async_trait;

use crate::error::Result;
use crate::ingest::StructuredEnvelope;

/// Seam for the graph-node collaborator.
///
/// The retry budget for each operation lives entirely inside the call:
/// callers pass the configured budget through and treat any error surfaced
/// here as terminal for the item at hand. Implemented by [`GraphClient`]
/// for production and by stubs in tests.
#[async_trait]
pub trait GraphService: Send + Sync {
    /// Fetch node info; used as the pre-run connectivity probe
    async fn node_info(&self) -> Result<NodeInfo>;

    /// Publish one envelope as a knowledge asset, returning its locator
    async fn publish(
        &self,
        envelope: &StructuredEnvelope,
        options: &PublishOptions,
    ) -> Result<PublishReceipt>;

    /// Attach a published asset to a paranet; independent of the publish
    async fn submit_to_paranet(
        &self,
        ual: &Ual,
        paranet: &Ual,
        options: &PublishOptions,
    ) -> Result<()>;

    /// Execute a SPARQL query, returning rows in service order
    async fn query(
        &self,
        query: &str,
        query_type: QueryType,
        options: &PublishOptions,
    ) -> Result<QueryResultSet>;
}
