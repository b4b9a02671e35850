//! LLM integration
//!
//! The pipeline treats the generative model as an untrusted text source:
//! a prompt goes out, opaque text comes back, and everything structural is
//! recovered by extraction and validation downstream.

pub mod client;
pub mod types;

pub use client::{LlmClient, LlmClientBuilder};
pub use types::{ChatRequest, ChatResponse, LlmResponse, Message, MessageRole};

use async_trait::async_trait;

use crate::error::Result;

/// Seam for the generative-model collaborator.
///
/// One logical completion per call; the response carries no structural
/// guarantee. Implemented by [`LlmClient`] for production and by
/// deterministic stubs in tests.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generate a completion for the given prompt
    async fn generate(&self, prompt: &str) -> Result<String>;
}
