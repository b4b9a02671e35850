//! Graph-node request/response types

use std::fmt;
use std::str::FromStr;

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::config::Config;
use crate::error::{Error, Result};

/// Node info returned by the connectivity probe
#[derive(Debug, Clone, Deserialize)]
pub struct NodeInfo {
    pub version: String,
}

/// Publication budget and identity, built once per run from configuration
/// and never mutated per item.
#[derive(Debug, Clone)]
pub struct PublishOptions {
    /// Number of epochs the asset is paid to persist
    pub epochs_num: u32,
    /// Operation poll budget delegated to the node call
    pub max_retries: u32,
    /// Poll interval in seconds
    pub frequency_secs: u64,
    /// Which partitions to resolve ("public", "private", "all")
    pub content_type: String,
    /// Target network identifier (e.g. "base:84532")
    pub blockchain_name: String,
    /// Signer credential, passed through opaquely; signing is the node's concern
    pub private_key: String,
}

impl PublishOptions {
    /// Build options from validated configuration, resolving the signer key
    /// from the environment.
    pub fn from_config(config: &Config) -> Result<Self> {
        let private_key = config
            .blockchain
            .resolved_private_key()
            .map_err(|e| Error::Config(e.to_string()))?
            .ok_or_else(|| {
                Error::Config(
                    "No signer key found. Set GRAPHMINT_PRIVATE_KEY or PRIVATE_KEY".to_string(),
                )
            })?;

        Ok(Self {
            epochs_num: config.publish.epochs_num,
            max_retries: config.publish.max_retries,
            frequency_secs: config.publish.frequency_secs,
            content_type: config.publish.content_type.clone(),
            blockchain_name: config.blockchain.name.clone(),
            private_key,
        })
    }
}

/// Universal Asset Locator: the content-addressed identifier of a published
/// asset, `did:dkg:<blockchain>/<contract>/<token-id>[/<asset-id>]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ual {
    pub blockchain: String,
    pub contract: String,
    pub token_id: String,
    pub asset_id: Option<String>,
}

const UAL_PREFIX: &str = "did:dkg:";

impl Ual {
    /// Parse a locator string, rejecting anything that does not match the
    /// `did:dkg:` pattern.
    pub fn parse(input: &str) -> Result<Self> {
        let rest = input.strip_prefix(UAL_PREFIX).ok_or_else(|| {
            Error::InvalidInput(format!("UAL must start with '{}': {}", UAL_PREFIX, input))
        })?;

        let segments: Vec<&str> = rest.split('/').collect();
        if !(3..=4).contains(&segments.len()) {
            return Err(Error::InvalidInput(format!(
                "UAL must have 3 or 4 segments after the prefix: {}",
                input
            )));
        }
        if segments.iter().any(|s| s.is_empty()) {
            return Err(Error::InvalidInput(format!(
                "UAL has an empty segment: {}",
                input
            )));
        }

        Ok(Self {
            blockchain: segments[0].to_string(),
            contract: segments[1].to_string(),
            token_id: segments[2].to_string(),
            asset_id: segments.get(3).map(|s| s.to_string()),
        })
    }
}

impl fmt::Display for Ual {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}/{}/{}",
            UAL_PREFIX, self.blockchain, self.contract, self.token_id
        )?;
        if let Some(asset_id) = &self.asset_id {
            write!(f, "/{}", asset_id)?;
        }
        Ok(())
    }
}

impl FromStr for Ual {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for Ual {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Ual {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ual::parse(&s).map_err(DeError::custom)
    }
}

/// Receipt for a successfully published asset
#[derive(Debug, Clone, Serialize)]
pub struct PublishReceipt {
    /// Globally unique locator of the published asset
    pub ual: Ual,
    /// Node-side operation identifier, kept for manual follow-up
    pub operation_id: String,
}

/// Query language mode accepted by the graph node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryType {
    Select,
    Construct,
}

impl QueryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryType::Select => "SELECT",
            QueryType::Construct => "CONSTRUCT",
        }
    }
}

/// Ordered result rows from a SPARQL query.
///
/// Row order from the graph node is preserved and never re-sorted. Within a
/// row, keys iterate in sorted order (serde_json's map), which keeps the
/// flattened rendering stable across runs.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueryResultSet {
    pub rows: Vec<serde_json::Map<String, serde_json::Value>>,
}

impl QueryResultSet {
    pub fn new(rows: Vec<serde_json::Map<String, serde_json::Value>>) -> Self {
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Render each row as a stable "key: value" sequence for presentation
    pub fn flatten(&self) -> Vec<String> {
        self.rows
            .iter()
            .map(|row| {
                row.iter()
                    .map(|(key, value)| match value.as_str() {
                        Some(s) => format!("{}: {}", key, s),
                        None => format!("{}: {}", key, value),
                    })
                    .collect::<Vec<_>>()
                    .join(", ")
            })
            .collect()
    }
}
