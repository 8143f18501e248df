use crate::domain::model::CoinMetadata;
use crate::domain::ports::MarketLookup;
use crate::utils::error::{LookupError, Result, TokenError};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use url::Url;

pub const DEFAULT_GECKO_URL: &str = "https://api.coingecko.com/api/v3";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// CoinGecko `/coins/{id}` client. Only the ticker list is requested.
#[derive(Debug, Clone)]
pub struct CoinGeckoClient {
    client: Client,
    base_url: Url,
}

impl CoinGeckoClient {
    pub fn new(base_url: &str) -> Result<Self> {
        crate::utils::validation::validate_url("gecko_url", base_url)?;
        let base_url = Url::parse(base_url).map_err(|e| TokenError::InvalidConfigValueError {
            field: "gecko_url".to_string(),
            value: base_url.to_string(),
            reason: e.to_string(),
        })?;

        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("token-parser/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TokenError::ConfigError {
                message: format!("failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            base_url,
        })
    }

    /// `{base}/coins/{id}`, with `id` percent-encoded as a single segment.
    fn coin_url(&self, id: &str) -> std::result::Result<Url, LookupError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| LookupError::Malformed {
                id: id.to_string(),
                message: format!("base URL {} cannot take path segments", self.base_url),
            })?
            .pop_if_empty()
            .push("coins")
            .push(id);
        Ok(url)
    }
}

#[async_trait]
impl MarketLookup for CoinGeckoClient {
    async fn fetch(&self, id: &str) -> std::result::Result<CoinMetadata, LookupError> {
        let url = self.coin_url(id)?;
        tracing::debug!("Making API request to: {}", url);

        let response = self
            .client
            .get(url)
            .query(&[
                ("localization", "false"),
                ("tickers", "true"),
                ("market_data", "false"),
                ("community_data", "false"),
                ("developer_data", "false"),
                ("sparkline", "false"),
            ])
            .send()
            .await?;

        let status = response.status();
        tracing::debug!("API response status for {}: {}", id, status);
        if !status.is_success() {
            return Err(LookupError::Status {
                id: id.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| LookupError::Malformed {
            id: id.to_string(),
            message: e.to_string(),
        })
    }
}
