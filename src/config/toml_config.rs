use crate::core::registry::DedupPolicy;
use crate::config::StoreKind;
use crate::utils::error::{Result, TokenError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// 設定檔內容，每個區塊都可以省略，省略的欄位沿用預設值
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    pub server: Option<ServerSection>,
    pub pipeline: Option<PipelineSection>,
    pub verifier: Option<VerifierSection>,
    pub store: Option<StoreSection>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerSection {
    pub port: Option<u16>,
    pub api_version: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineSection {
    pub queue_capacity: Option<usize>,
    pub relay_capacity: Option<usize>,
    pub rate_per_minute: Option<u32>,
    pub workers: Option<usize>,
    pub verify_timeout_secs: Option<u64>,
    pub dedup: Option<DedupPolicy>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VerifierSection {
    pub gecko_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreSection {
    pub kind: Option<StoreKind>,
    pub data_dir: Option<String>,
}

impl TomlConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(TokenError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| TokenError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${COINGECKO_URL})，找不到的變數保持原樣
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| TokenError::ConfigError {
            message: format!("invalid env substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }
}
