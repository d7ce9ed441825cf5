//! Stage configuration, read from a `stages.toml` file:
//!
//! ```toml
//! [[stage]]
//! name = "dev"
//! account = "123456789012"
//! region = "us-west-2"
//!
//! [stage.hosted_zone]
//! zone_name = "dev.example.com"
//!
//! [[stage.edge_function]]
//! event_type = "viewer-request"
//! runtime = "provided.al2"
//! handler = "bootstrap"
//! code_bucket = "artifacts"
//! code_key = "oidc.zip"
//! ```

use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::regions;

pub const CONFIG_ENV_VAR: &str = "EDGESTACK_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "stages.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}\n{source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config\n{0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid stage {stage:?}\n{reason}")]
    InvalidStage { stage: String, reason: String },

    #[error("Stage {0:?} is defined more than once")]
    DuplicateStage(String),

    #[error("Config must define at least one stage")]
    NoStages,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EdgeEventType {
    ViewerRequest,
    ViewerResponse,
    OriginRequest,
    OriginResponse,
}

impl EdgeEventType {
    /// the CloudFront association event type, eg: `viewer-request`
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeEventType::ViewerRequest => "viewer-request",
            EdgeEventType::ViewerResponse => "viewer-response",
            EdgeEventType::OriginRequest => "origin-request",
            EdgeEventType::OriginResponse => "origin-response",
        }
    }

    /// eg: `ViewerRequest`, used in construct ids.
    pub fn pascal_case(&self) -> &'static str {
        match self {
            EdgeEventType::ViewerRequest => "ViewerRequest",
            EdgeEventType::ViewerResponse => "ViewerResponse",
            EdgeEventType::OriginRequest => "OriginRequest",
            EdgeEventType::OriginResponse => "OriginResponse",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HostedZoneConfig {
    pub zone_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EdgeFunctionConfig {
    pub event_type: EdgeEventType,
    pub runtime: String,
    pub handler: String,
    pub code_bucket: String,
    pub code_key: String,
    #[serde(default = "default_edge_memory")]
    pub memory_size: u64,
    #[serde(default = "default_edge_timeout")]
    pub timeout: u32,
}

// viewer triggers are capped at 128MB and 5 seconds.
fn default_edge_memory() -> u64 {
    128
}

fn default_edge_timeout() -> u32 {
    5
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StageConfig {
    pub name: String,
    pub account: Option<String>,
    pub region: String,
    pub hosted_zone: Option<HostedZoneConfig>,
    #[serde(default)]
    pub edge_function: Vec<EdgeFunctionConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    #[serde(rename = "stage", default)]
    pub stages: Vec<StageConfig>,
}

impl AppConfig {
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.display().to_string(), source })?;
        Self::from_toml(&contents)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.stages.is_empty() {
            return Err(ConfigError::NoStages);
        }
        let mut seen = HashSet::new();
        for stage in self.stages.iter() {
            if !seen.insert(stage.name.as_str()) {
                return Err(ConfigError::DuplicateStage(stage.name.clone()));
            }
            if let Some(reason) = stage.is_valid() {
                return Err(ConfigError::InvalidStage { stage: stage.name.clone(), reason });
            }
        }
        Ok(())
    }

    pub fn stage(&self, name: &str) -> Option<&StageConfig> {
        self.stages.iter().find(|s| s.name == name)
    }
}

impl StageConfig {
    pub fn is_valid(&self) -> Option<String> {
        if self.name.is_empty() || !self.name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Some("Stage name must be non-empty and only contain alphanumeric characters and hyphens".into());
        }
        if !self.name.starts_with(|c: char| c.is_ascii_alphabetic()) {
            return Some("Stage name must start with an alphabetical character".into());
        }
        if let Some(err) = regions::verify_region(&self.region) {
            return Some(err);
        }
        if let Some(account) = &self.account {
            if account.len() != 12 || !account.chars().all(|c| c.is_ascii_digit()) {
                return Some(format!("Invalid account id {account:?}\nMust be 12 digits"));
            }
        }
        if let Some(zone) = &self.hosted_zone {
            if zone.zone_name.is_empty() || !zone.zone_name.contains('.') || zone.zone_name.ends_with('.') {
                return Some(format!("Invalid zone name {:?}. Must be a domain without a trailing dot", zone.zone_name));
            }
        }
        let mut event_types = HashSet::new();
        for edge in self.edge_function.iter() {
            if !event_types.insert(edge.event_type) {
                return Some(format!("More than one edge function for {}", edge.event_type.as_str()));
            }
            if edge.code_bucket.is_empty() || edge.code_key.is_empty() {
                return Some(format!("Edge function for {} must have a code_bucket and code_key", edge.event_type.as_str()));
            }
        }
        None
    }
}
