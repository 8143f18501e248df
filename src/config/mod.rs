#[cfg(feature = "cli")]
pub mod cli;
pub mod toml_config;

use crate::adapters::http::DEFAULT_GECKO_URL;
use crate::core::pipeline::PipelineSettings;
use crate::utils::error::Result;
use crate::utils::validation::{validate_path, validate_path_segment, validate_url, Validate};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use toml_config::TomlConfig;

pub const DEFAULT_API_PORT: u16 = 8080;
pub const DEFAULT_API_VERSION: &str = "v1";
pub const DEFAULT_DATA_DIR: &str = "./data";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum StoreKind {
    /// Keep verified items in process memory
    Memory,
    /// One JSON file per verified item under the data directory
    #[default]
    Json,
}

/// Fully resolved settings for `token-parser server`.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub api_port: u16,
    pub api_version: String,
    pub gecko_url: String,
    pub store: StoreKind,
    pub data_dir: String,
    pub pipeline: PipelineSettings,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            api_port: DEFAULT_API_PORT,
            api_version: DEFAULT_API_VERSION.to_string(),
            gecko_url: DEFAULT_GECKO_URL.to_string(),
            store: StoreKind::default(),
            data_dir: DEFAULT_DATA_DIR.to_string(),
            pipeline: PipelineSettings::default(),
        }
    }
}

impl ServerConfig {
    /// Overlays every value present in the file.
    pub fn apply_toml(&mut self, file: &TomlConfig) {
        if let Some(server) = &file.server {
            if let Some(port) = server.port {
                self.api_port = port;
            }
            if let Some(version) = &server.api_version {
                self.api_version = version.clone();
            }
        }

        if let Some(pipeline) = &file.pipeline {
            let settings = &mut self.pipeline;
            if let Some(v) = pipeline.queue_capacity {
                settings.queue_capacity = v;
            }
            if let Some(v) = pipeline.relay_capacity {
                settings.relay_capacity = v;
            }
            if let Some(v) = pipeline.rate_per_minute {
                settings.rate_per_minute = v;
            }
            if let Some(v) = pipeline.workers {
                settings.workers = v;
            }
            if let Some(secs) = pipeline.verify_timeout_secs {
                settings.verify_timeout = Some(Duration::from_secs(secs));
            }
            if let Some(dedup) = pipeline.dedup {
                settings.dedup = dedup;
            }
        }

        if let Some(url) = file.verifier.as_ref().and_then(|v| v.gecko_url.as_ref()) {
            self.gecko_url = url.clone();
        }

        if let Some(store) = &file.store {
            if let Some(kind) = store.kind {
                self.store = kind;
            }
            if let Some(dir) = &store.data_dir {
                self.data_dir = dir.clone();
            }
        }
    }
}

impl Validate for ServerConfig {
    fn validate(&self) -> Result<()> {
        validate_path_segment("api_version", &self.api_version)?;
        validate_url("gecko_url", &self.gecko_url)?;
        if self.store == StoreKind::Json {
            validate_path("data_dir", &self.data_dir)?;
        }
        self.pipeline.validate()
    }
}
