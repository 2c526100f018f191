//! Node configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub node: NodeConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub api: ApiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Unique node identifier
    #[serde(default = "default_node_id")]
    pub id: String,

    /// Data directory (holds trackeco.db and offline.db)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Base URL of the AI video-classification service
    #[serde(default = "default_classifier_url")]
    pub base_url: String,

    /// Classification request timeout in milliseconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,

    /// Connectivity probe timeout in milliseconds
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// HTTP API port
    #[serde(default = "default_http_port")]
    pub http_port: u16,
}

impl ClassifierConfig {
    /// URL the probe checks for reachability.
    pub fn health_url(&self) -> String {
        format!("{}/health", self.base_url.trim_end_matches('/'))
    }

    /// URL that accepts raw video bytes for classification.
    pub fn classify_url(&self) -> String {
        format!("{}/classify", self.base_url.trim_end_matches('/'))
    }
}

// Defaults
fn default_node_id() -> String {
    "trackeco-node-1".to_string()
}
fn default_data_dir() -> PathBuf {
    PathBuf::from("/var/lib/trackeco")
}
fn default_classifier_url() -> String {
    "http://localhost:9090".to_string()
}
fn default_request_timeout() -> u64 {
    30_000
}
fn default_probe_timeout() -> u64 {
    2_000
}
fn default_http_port() -> u16 {
    5000
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            id: default_node_id(),
            data_dir: default_data_dir(),
        }
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            base_url: default_classifier_url(),
            request_timeout_ms: default_request_timeout(),
            probe_timeout_ms: default_probe_timeout(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            http_port: default_http_port(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            node: NodeConfig::default(),
            classifier: ClassifierConfig::default(),
            api: ApiConfig::default(),
        }
    }
}
