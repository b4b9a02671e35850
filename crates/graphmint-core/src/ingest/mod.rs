//! Ingestion pipeline
//!
//! Raw inputs flow through normalization into structured envelopes, which
//! the publication engine pushes to the graph node one at a time. The batch
//! orchestrator drives the whole sequence with per-item failure isolation.

pub mod batch;
pub mod normalizer;
pub mod publisher;
pub mod source;

pub use batch::BatchRunner;
pub use normalizer::Normalizer;
pub use publisher::{AttachmentOutcome, PublicationOutcome, Publisher, PublishStatus};
pub use source::{AssetFile, RawInput, RawPayload, enumerate_assets};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The canonical publishable unit: a `public` partition that is graph-wide
/// visible, plus an optional `private` partition restricted to permitted
/// holders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredEnvelope {
    pub public: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private: Option<Value>,
}

impl StructuredEnvelope {
    /// Wrap a document as a public-only envelope
    pub fn public_only(document: Value) -> Self {
        Self {
            public: document,
            private: None,
        }
    }

    /// Build an envelope from a pre-structured document, wrapping it in a
    /// `public` partition unless it is already partitioned.
    pub fn from_document(document: Value) -> Self {
        if let Some(object) = document.as_object()
            && object.contains_key("public")
        {
            let public = object.get("public").cloned().unwrap_or(Value::Null);
            let private = object.get("private").cloned();
            return Self { public, private };
        }

        Self::public_only(document)
    }
}
