use crate::config::toml_config::TomlConfig;
use crate::config::{ServerConfig, StoreKind};
use crate::core::registry::DedupPolicy;
use crate::utils::error::Result;
use crate::utils::validation::Validate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Parser)]
#[command(name = "token-parser")]
#[command(about = "Verifies submitted coin identifiers against CoinGecko and stores their markets")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Start the token-parser server
    Server(ServerArgs),
    /// Print the version
    Version,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

/// 沒給的旗標是 None，才不會蓋掉設定檔裡的值
#[derive(Debug, Clone, Default, Args)]
pub struct ServerArgs {
    #[arg(long, env = "TOKEN_PARSER_CONFIG", help = "TOML config file")]
    pub config: Option<PathBuf>,

    #[arg(long, env = "TOKEN_PARSER_API_PORT", help = "API port to listen on [default: 8080]")]
    pub api_port: Option<u16>,

    #[arg(long, env = "TOKEN_PARSER_API_VERSION", help = "API version [default: v1]")]
    pub api_version: Option<String>,

    #[arg(long, env = "TOKEN_PARSER_API_RATE", help = "Rate limit in req / minute [default: 50]")]
    pub api_rate: Option<u32>,

    #[arg(long, help = "Ingress queue capacity [default: 500]")]
    pub queue_capacity: Option<usize>,

    #[arg(long, help = "Relay buffer capacity [default: 50]")]
    pub relay_capacity: Option<usize>,

    #[arg(long, help = "Worker count [default: number of CPUs]")]
    pub workers: Option<usize>,

    #[arg(long, help = "Give up on a verification call after this many seconds")]
    pub verify_timeout_secs: Option<u64>,

    #[arg(long, value_enum, help = "Dedup behaviour [default: record-on-success]")]
    pub dedup: Option<DedupPolicy>,

    #[arg(long, env = "TOKEN_PARSER_GECKO_URL", help = "CoinGecko API base URL")]
    pub gecko_url: Option<String>,

    #[arg(long, value_enum, env = "TOKEN_PARSER_STORE", help = "Item store backend [default: json]")]
    pub store: Option<StoreKind>,

    #[arg(long, env = "TOKEN_PARSER_DATA_DIR", help = "Directory for the json store [default: ./data]")]
    pub data_dir: Option<String>,

    #[arg(long, value_enum, default_value = "compact")]
    pub log_format: LogFormat,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,
}

impl ServerArgs {
    /// Defaults, then the config file, then flags.
    pub fn resolve(&self) -> Result<ServerConfig> {
        let mut config = ServerConfig::default();

        if let Some(path) = &self.config {
            tracing::debug!("Loading config file {}", path.display());
            config.apply_toml(&TomlConfig::from_file(path)?);
        }

        if let Some(port) = self.api_port {
            config.api_port = port;
        }
        if let Some(version) = &self.api_version {
            config.api_version = version.clone();
        }
        if let Some(rate) = self.api_rate {
            config.pipeline.rate_per_minute = rate;
        }
        if let Some(capacity) = self.queue_capacity {
            config.pipeline.queue_capacity = capacity;
        }
        if let Some(capacity) = self.relay_capacity {
            config.pipeline.relay_capacity = capacity;
        }
        if let Some(workers) = self.workers {
            config.pipeline.workers = workers;
        }
        if let Some(secs) = self.verify_timeout_secs {
            config.pipeline.verify_timeout = Some(Duration::from_secs(secs));
        }
        if let Some(dedup) = self.dedup {
            config.pipeline.dedup = dedup;
        }
        if let Some(url) = &self.gecko_url {
            config.gecko_url = url.clone();
        }
        if let Some(store) = self.store {
            config.store = store;
        }
        if let Some(dir) = &self.data_dir {
            config.data_dir = dir.clone();
        }

        config.validate()?;
        Ok(config)
    }
}
