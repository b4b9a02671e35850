//! Error types for Graphmint

use thiserror::Error;

/// Result type alias using Graphmint's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Graphmint error types with helpful messages and suggestions
#[derive(Error, Debug)]
pub enum Error {
    // Connectivity errors (E100-E199) - fatal, abort the run before any item
    #[error("Node connection failed: {0}. Check node.endpoint and node.port with `graphmint config list`.")]
    Connectivity(String),

    #[error("Network error: {0}. Check your internet connection.")]
    Network(#[from] reqwest::Error),

    // LLM errors (E200-E299)
    #[error("LLM API error: {0}. Check your API key with `graphmint config get llm.api_key`.")]
    Llm(String),

    #[error("Rate limited. Waiting {0} seconds before retry.")]
    RateLimited(u64),

    // Pipeline errors (E300-E399) - isolated per item by the batch orchestrator
    #[error("Failed to transform '{0}': {1}")]
    Transform(String, String),

    #[error("Publication failed: {0}")]
    Publication(String),

    #[error("Paranet submission failed: {0}")]
    ParanetSubmission(String),

    // Query errors (E400-E499)
    #[error("Query generation failed: {0}")]
    Generation(String),

    #[error("Query failed: {0}")]
    Query(String),

    // Config errors (E600-E699) - fatal, abort before the run starts
    #[error("Configuration error: {0}")]
    Config(String),

    // Input errors (E800-E899)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // Generic errors
    #[error("{0}")]
    Other(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Get error code for this error type
    pub fn code(&self) -> &'static str {
        match self {
            Self::Connectivity(_) => "E100",
            Self::Network(_) => "E101",
            Self::Llm(_) => "E200",
            Self::RateLimited(_) => "E201",
            Self::Transform(..) => "E300",
            Self::Publication(_) => "E301",
            Self::ParanetSubmission(_) => "E302",
            Self::Generation(_) => "E400",
            Self::Query(_) => "E401",
            Self::Config(_) => "E600",
            Self::InvalidInput(_) => "E800",
            Self::Other(_) | Self::Io(_) => "E9999",
        }
    }

    /// Get suggestion for how to fix this error
    pub fn suggestion(&self) -> Option<String> {
        match self {
            Self::Connectivity(_) => Some("graphmint doctor".to_string()),
            Self::Network(_) => Some("Check internet connection".to_string()),
            Self::Llm(_) => Some("graphmint config get llm.api_key".to_string()),
            Self::Config(_) => Some("graphmint config list".to_string()),
            Self::Publication(_) | Self::ParanetSubmission(_) => {
                Some("graphmint doctor".to_string())
            }
            _ => None,
        }
    }

    /// Whether this error aborts a batch run (as opposed to failing one item)
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Connectivity(_) | Self::Config(_))
    }
}
