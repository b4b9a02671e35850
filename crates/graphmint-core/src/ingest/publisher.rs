//! Publication engine
//!
//! Publishes one envelope at a time and converts every service failure into
//! a recorded outcome: nothing thrown here escapes to the batch loop. The
//! optional paranet attachment is a second, independent request whose
//! failure never demotes a successful publish.

use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, warn};

use crate::error::{Error, Result};
use crate::graph::{GraphService, NodeInfo, PublishOptions, Ual};

use super::StructuredEnvelope;

/// Outcome of publishing one raw input. Outcomes are independent: they
/// never roll each other back.
#[derive(Debug, Clone, Serialize)]
pub struct PublicationOutcome {
    /// Identifier of the source item (file name or label)
    pub source: String,
    pub status: PublishStatus,
}

impl PublicationOutcome {
    pub fn failed(source: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            status: PublishStatus::Failed {
                reason: reason.into(),
            },
        }
    }

    pub fn is_published(&self) -> bool {
        matches!(self.status, PublishStatus::Published { .. })
    }
}

/// Terminal status for one item
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum PublishStatus {
    Published {
        ual: Ual,
        #[serde(skip_serializing_if = "Option::is_none")]
        attachment: Option<AttachmentOutcome>,
    },
    Failed {
        reason: String,
    },
}

/// Result of the optional paranet attachment, reported separately from the
/// publish outcome it follows.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum AttachmentOutcome {
    Attached { paranet: Ual },
    AttachFailed { reason: String },
}

/// Publication engine
pub struct Publisher {
    graph: Arc<dyn GraphService>,
    paranet: Option<Ual>,
}

impl Publisher {
    pub fn new(graph: Arc<dyn GraphService>, paranet: Option<Ual>) -> Self {
        Self { graph, paranet }
    }

    /// Confirm a live connection to the graph node.
    ///
    /// Runs once per batch, before the first item; a failure here aborts
    /// the whole run before any item is processed.
    pub async fn probe(&self) -> Result<NodeInfo> {
        self.graph
            .node_info()
            .await
            .map_err(|e| Error::Connectivity(e.to_string()))
    }

    /// Publish one envelope, then optionally attach it to the configured
    /// paranet. Never returns an error: every failure becomes a recorded
    /// outcome.
    pub async fn publish_one(
        &self,
        source: &str,
        envelope: &StructuredEnvelope,
        options: &PublishOptions,
    ) -> PublicationOutcome {
        let receipt = match self.graph.publish(envelope, options).await {
            Ok(receipt) => receipt,
            Err(e) => {
                error!(source = %source, error = %e, "Publish failed");
                return PublicationOutcome::failed(source, e.to_string());
            }
        };

        info!(source = %source, ual = %receipt.ual, "Knowledge asset published");

        let attachment = match &self.paranet {
            None => None,
            Some(paranet) => Some(self.attach(source, &receipt.ual, paranet, options).await),
        };

        PublicationOutcome {
            source: source.to_string(),
            status: PublishStatus::Published {
                ual: receipt.ual,
                attachment,
            },
        }
    }

    async fn attach(
        &self,
        source: &str,
        ual: &Ual,
        paranet: &Ual,
        options: &PublishOptions,
    ) -> AttachmentOutcome {
        match self.graph.submit_to_paranet(ual, paranet, options).await {
            Ok(()) => {
                info!(source = %source, paranet = %paranet, "Asset submitted to paranet");
                AttachmentOutcome::Attached {
                    paranet: paranet.clone(),
                }
            }
            Err(e) => {
                warn!(source = %source, paranet = %paranet, error = %e, "Paranet submission failed");
                AttachmentOutcome::AttachFailed {
                    reason: e.to_string(),
                }
            }
        }
    }
}
