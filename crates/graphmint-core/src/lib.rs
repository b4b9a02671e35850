//! Graphmint Core Library
//!
//! This crate provides the core functionality for Graphmint, including:
//! - Content normalization (free text -> JSON-LD knowledge assets via LLM)
//! - Publication engine (graph-node publishing with per-item isolation)
//! - Batch orchestration over an asset directory
//! - SPARQL query construction (LLM-generated with deterministic fallback)
//! - Query execution and result normalization
//! - Graph-node and LLM client integration

pub mod config;
pub mod error;
pub mod graph;
pub mod ingest;
pub mod llm;
pub mod query;
pub mod schema;

pub use error::{Error, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::error::{Error, Result};
    pub use crate::ingest::StructuredEnvelope;
    pub use crate::schema::SchemaTemplate;
}
