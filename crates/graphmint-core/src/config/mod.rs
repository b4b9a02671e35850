//! Configuration management with file persistence
//!
//! The run configuration is loaded once, validated before any work begins,
//! and passed by value into the pipeline components. No component reads
//! ambient global state after startup.

use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;

use crate::graph::Ual;

/// Graphmint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub node: NodeConfig,
    pub blockchain: BlockchainConfig,
    pub publish: PublishConfig,
    pub paranet: ParanetConfig,
    pub llm: LlmConfig,
    pub assets: AssetsConfig,
}

/// Graph-node endpoint settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    pub endpoint: String,
    pub port: u16,
    pub use_ssl: bool,
    pub api_version: String,
}

/// Blockchain identity for signed publish transactions.
///
/// The signer key is never stored in the config file; it is resolved from
/// the environment at run start.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockchainConfig {
    pub name: String,
    #[serde(skip)]
    pub private_key: Option<String>,
}

/// Publication budget passed through to the graph node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishConfig {
    pub epochs_num: u32,
    pub max_retries: u32,
    pub frequency_secs: u64,
    pub content_type: String,
    /// Best-effort wait after paranet submission before querying the
    /// sub-graph. Not a consistency guarantee.
    pub propagation_wait_secs: u64,
}

/// Optional paranet (sub-graph) target for published assets
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParanetConfig {
    pub ual: Option<String>,
}

/// Generative-model settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(skip)]
    pub api_key: Option<String>,
    pub default_model: String,
    pub temperature: f32,
    pub max_tokens: usize,
    pub timeout_secs: u64,
}

/// Batch input source settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetsConfig {
    pub dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            node: NodeConfig {
                endpoint: "http://localhost".to_string(),
                port: 8900,
                use_ssl: false,
                api_version: "/v1".to_string(),
            },
            blockchain: BlockchainConfig {
                name: "base:84532".to_string(),
                private_key: None,
            },
            publish: PublishConfig {
                epochs_num: 2,
                max_retries: 100,
                frequency_secs: 2,
                content_type: "all".to_string(),
                propagation_wait_secs: 5,
            },
            paranet: ParanetConfig::default(),
            llm: LlmConfig {
                api_key: None,
                default_model: "google/gemini-pro-1.5".to_string(),
                temperature: 0.7,
                max_tokens: 8192,
                timeout_secs: 120,
            },
            assets: AssetsConfig {
                dir: PathBuf::from("assets"),
            },
        }
    }
}

/// Content types accepted by the graph node
const VALID_CONTENT_TYPES: [&str; 3] = ["public", "private", "all"];

impl BlockchainConfig {
    pub fn resolved_private_key(&self) -> anyhow::Result<Option<String>> {
        self.enforce_env_only()?;

        Ok(env::var("GRAPHMINT_PRIVATE_KEY")
            .or_else(|_| env::var("PRIVATE_KEY"))
            .ok())
    }

    pub fn redacted_private_key(&self) -> anyhow::Result<Option<String>> {
        self.resolved_private_key().map(|opt| opt.map(redact))
    }

    pub fn enforce_env_only(&self) -> anyhow::Result<()> {
        if self.private_key.is_some() {
            return Err(anyhow!(
                "Signer keys must be provided via environment variables, not stored in configuration"
            ));
        }
        Ok(())
    }
}

impl LlmConfig {
    pub fn resolved_api_key(&self) -> anyhow::Result<Option<String>> {
        self.enforce_env_only()?;

        Ok(env::var("GRAPHMINT_API_KEY")
            .or_else(|_| env::var("OPENROUTER_API_KEY"))
            .ok())
    }

    pub fn redacted_api_key(&self) -> anyhow::Result<Option<String>> {
        self.resolved_api_key().map(|opt| opt.map(redact))
    }

    pub fn enforce_env_only(&self) -> anyhow::Result<()> {
        if self.api_key.is_some() {
            return Err(anyhow!(
                "LLM API keys must be provided via environment variables, not stored in configuration"
            ));
        }
        Ok(())
    }
}

fn redact(key: String) -> String {
    if key.len() <= 4 {
        "***".to_string()
    } else {
        let suffix = &key[key.len() - 4..];
        format!("***{}", suffix)
    }
}

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> anyhow::Result<PathBuf> {
        let dir = if let Ok(custom_dir) = env::var("GRAPHMINT_CONFIG_DIR") {
            PathBuf::from(custom_dir)
        } else {
            dirs::config_dir()
                .ok_or_else(|| anyhow!("Could not determine config directory"))?
                .join("graphmint")
        };
        Ok(dir)
    }

    /// Get the config file path
    pub fn config_path() -> anyhow::Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load configuration from file, or create default if it doesn't exist
    pub fn load() -> anyhow::Result<Self> {
        let path = Self::config_path()?;

        if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            let config: Config = toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
            config.validate()?;
            Ok(config)
        } else {
            // Return default config without creating file
            Ok(Config::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self) -> anyhow::Result<()> {
        self.validate()?;

        let dir = Self::config_dir()?;
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create config directory: {}", dir.display()))?;

        let path = Self::config_path()?;
        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(&path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Validate configuration
    ///
    /// Runs once before a batch or query run starts; any failure here aborts
    /// before the first item is processed.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.node.endpoint.trim().is_empty() {
            return Err(anyhow!("Missing or invalid value for 'node.endpoint'"));
        }
        if self.node.port == 0 {
            return Err(anyhow!("Missing or invalid value for 'node.port'"));
        }
        if self.blockchain.name.trim().is_empty() {
            return Err(anyhow!("Missing or invalid value for 'blockchain.name'"));
        }
        if self.publish.frequency_secs == 0 {
            return Err(anyhow!("'publish.frequency_secs' must be at least 1"));
        }
        if !VALID_CONTENT_TYPES.contains(&self.publish.content_type.as_str()) {
            return Err(anyhow!(
                "Invalid content type: {}. Valid options: {}",
                self.publish.content_type,
                VALID_CONTENT_TYPES.join(", ")
            ));
        }
        if let Some(ual) = &self.paranet.ual {
            Ual::parse(ual)
                .map_err(|e| anyhow!("Invalid paranet UAL '{}': {}", ual, e))?;
        }
        self.blockchain.enforce_env_only()?;
        self.llm.enforce_env_only()?;
        Ok(())
    }

    /// Get a configuration value by key
    pub fn get(&self, key: &str) -> anyhow::Result<String> {
        match key {
            // Node settings
            "node.endpoint" => Ok(self.node.endpoint.clone()),
            "node.port" => Ok(self.node.port.to_string()),
            "node.use_ssl" => Ok(self.node.use_ssl.to_string()),
            "node.api_version" => Ok(self.node.api_version.clone()),

            // Blockchain settings
            "blockchain.name" => Ok(self.blockchain.name.clone()),
            "blockchain.private_key" | "private_key" => {
                match self.blockchain.redacted_private_key()? {
                    Some(redacted) => Ok(redacted),
                    None => Ok(
                        "(not set - use GRAPHMINT_PRIVATE_KEY or PRIVATE_KEY env var)".to_string()
                    ),
                }
            }

            // Publish settings
            "publish.epochs_num" => Ok(self.publish.epochs_num.to_string()),
            "publish.max_retries" => Ok(self.publish.max_retries.to_string()),
            "publish.frequency_secs" => Ok(self.publish.frequency_secs.to_string()),
            "publish.content_type" => Ok(self.publish.content_type.clone()),
            "publish.propagation_wait_secs" => Ok(self.publish.propagation_wait_secs.to_string()),

            // Paranet settings
            "paranet.ual" => Ok(self
                .paranet
                .ual
                .clone()
                .unwrap_or_else(|| "(not set)".to_string())),

            // LLM settings
            "llm.default_model" => Ok(self.llm.default_model.clone()),
            "llm.temperature" => Ok(self.llm.temperature.to_string()),
            "llm.max_tokens" => Ok(self.llm.max_tokens.to_string()),
            "llm.timeout_secs" => Ok(self.llm.timeout_secs.to_string()),
            "llm.api_key" | "api_key" => match self.llm.redacted_api_key()? {
                Some(redacted) => Ok(redacted),
                None => {
                    Ok("(not set - use GRAPHMINT_API_KEY or OPENROUTER_API_KEY env var)"
                        .to_string())
                }
            },

            // Assets settings
            "assets.dir" => Ok(self.assets.dir.display().to_string()),

            _ => Err(anyhow!(
                "Unknown configuration key: {}. Use `graphmint config list` to see available keys.",
                key
            )),
        }
    }

    /// Set a configuration value by key
    pub fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        match key {
            // Node settings
            "node.endpoint" => {
                self.node.endpoint = value.to_string();
            }
            "node.port" => {
                self.node.port = value
                    .parse()
                    .with_context(|| format!("Invalid port value: {}", value))?;
            }
            "node.use_ssl" => {
                self.node.use_ssl = value
                    .parse()
                    .with_context(|| format!("Invalid use_ssl value: {}", value))?;
            }
            "node.api_version" => {
                self.node.api_version = value.to_string();
            }

            // Blockchain settings
            "blockchain.name" => {
                self.blockchain.name = value.to_string();
            }

            // Publish settings
            "publish.epochs_num" => {
                let epochs: u32 = value
                    .parse()
                    .with_context(|| format!("Invalid epochs_num value: {}", value))?;
                if epochs == 0 {
                    return Err(anyhow!("epochs_num must be at least 1"));
                }
                self.publish.epochs_num = epochs;
            }
            "publish.max_retries" => {
                self.publish.max_retries = value
                    .parse()
                    .with_context(|| format!("Invalid max_retries value: {}", value))?;
            }
            "publish.frequency_secs" => {
                let freq: u64 = value
                    .parse()
                    .with_context(|| format!("Invalid frequency_secs value: {}", value))?;
                if freq == 0 {
                    return Err(anyhow!("frequency_secs must be at least 1"));
                }
                self.publish.frequency_secs = freq;
            }
            "publish.content_type" => {
                if !VALID_CONTENT_TYPES.contains(&value) {
                    return Err(anyhow!(
                        "Invalid content type: {}. Valid options: {}",
                        value,
                        VALID_CONTENT_TYPES.join(", ")
                    ));
                }
                self.publish.content_type = value.to_string();
            }
            "publish.propagation_wait_secs" => {
                self.publish.propagation_wait_secs = value
                    .parse()
                    .with_context(|| format!("Invalid propagation_wait_secs value: {}", value))?;
            }

            // Paranet settings
            "paranet.ual" => {
                if value.is_empty() {
                    self.paranet.ual = None;
                } else {
                    Ual::parse(value)
                        .map_err(|e| anyhow!("Invalid paranet UAL '{}': {}", value, e))?;
                    self.paranet.ual = Some(value.to_string());
                }
            }

            // LLM settings
            "llm.default_model" => {
                self.llm.default_model = value.to_string();
            }
            "llm.temperature" => {
                let temp: f32 = value
                    .parse()
                    .with_context(|| format!("Invalid temperature value: {}", value))?;
                if !(0.0..=2.0).contains(&temp) {
                    return Err(anyhow!("Temperature must be between 0.0 and 2.0"));
                }
                self.llm.temperature = temp;
            }
            "llm.max_tokens" => {
                self.llm.max_tokens = value
                    .parse()
                    .with_context(|| format!("Invalid max_tokens value: {}", value))?;
            }
            "llm.timeout_secs" => {
                self.llm.timeout_secs = value
                    .parse()
                    .with_context(|| format!("Invalid timeout_secs value: {}", value))?;
            }

            // Assets settings
            "assets.dir" => {
                self.assets.dir = PathBuf::from(value);
            }

            // Secrets cannot be set via config
            "llm.api_key" | "api_key" => {
                return Err(anyhow!(
                    "API keys cannot be stored in configuration for security. \
                     Set the GRAPHMINT_API_KEY or OPENROUTER_API_KEY environment variable instead."
                ));
            }
            "blockchain.private_key" | "private_key" => {
                return Err(anyhow!(
                    "Signer keys cannot be stored in configuration for security. \
                     Set the GRAPHMINT_PRIVATE_KEY or PRIVATE_KEY environment variable instead."
                ));
            }

            _ => {
                return Err(anyhow!(
                    "Unknown configuration key: {}. Use `graphmint config list` to see available keys.",
                    key
                ));
            }
        }
        Ok(())
    }

    /// List all configuration keys and their values
    pub fn list(&self) -> anyhow::Result<Vec<(String, String)>> {
        let keys = vec![
            "node.endpoint",
            "node.port",
            "node.use_ssl",
            "node.api_version",
            "blockchain.name",
            "blockchain.private_key",
            "publish.epochs_num",
            "publish.max_retries",
            "publish.frequency_secs",
            "publish.content_type",
            "publish.propagation_wait_secs",
            "paranet.ual",
            "llm.default_model",
            "llm.temperature",
            "llm.max_tokens",
            "llm.timeout_secs",
            "llm.api_key",
            "assets.dir",
        ];

        keys.into_iter()
            .map(|key| {
                let value = self.get(key)?;
                Ok((key.to_string(), value))
            })
            .collect()
    }

    /// Reset configuration to defaults
    pub fn reset() -> anyhow::Result<()> {
        let path = Self::config_path()?;
        if path.exists() {
            fs::remove_file(&path)
                .with_context(|| format!("Failed to remove config file: {}", path.display()))?;
        }
        Ok(())
    }
}
