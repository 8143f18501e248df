use crate::utils::error::{Result, TokenError};
use serde::{Deserialize, Serialize};

/// A single identifier submitted for verification.
///
/// `id` and `batch` are fixed at creation. `markets` starts empty and can only
/// grow through [`Item::enrich`], which the owning worker calls once after a
/// successful verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    id: String,
    markets: Vec<String>,
    batch: u64,
}

impl Item {
    pub fn new(id: impl Into<String>, batch: u64) -> Result<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(TokenError::ValidationError {
                message: "item id cannot be empty".to_string(),
            });
        }
        Ok(Self {
            id,
            markets: Vec::new(),
            batch,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn markets(&self) -> &[String] {
        &self.markets
    }

    pub fn batch(&self) -> u64 {
        self.batch
    }

    /// Appends the enrichment's markets in the order they were received.
    pub fn enrich(&mut self, enrichment: Enrichment) {
        self.markets.extend(enrichment.markets);
    }
}

/// Market identifiers derived from a successful verification.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Enrichment {
    pub markets: Vec<String>,
}

impl Enrichment {
    pub fn is_empty(&self) -> bool {
        self.markets.is_empty()
    }
}

impl From<CoinMetadata> for Enrichment {
    fn from(metadata: CoinMetadata) -> Self {
        let markets = metadata
            .tickers
            .unwrap_or_default()
            .into_iter()
            .map(|ticker| ticker.market.identifier)
            .collect();
        Self { markets }
    }
}

/// Subset of the verification service's coin response the pipeline reads.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CoinMetadata {
    pub id: String,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub tickers: Option<Vec<Ticker>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticker {
    #[serde(default)]
    pub base: Option<String>,
    #[serde(default)]
    pub target: Option<String>,
    pub market: Market,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Market {
    pub identifier: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// JSON body accepted by the ingress endpoint: `{"coins": ["bitcoin", ...]}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CoinsRequest {
    pub coins: Vec<String>,
}
