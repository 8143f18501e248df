use crate::domain::model::{CoinMetadata, Enrichment, Item};
use crate::utils::error::{LookupError, StoreError, VerifyError};
use async_trait::async_trait;

/// Checks an item against the remote service and returns its enrichment.
#[async_trait]
pub trait Verifier: Send + Sync {
    async fn verify(&self, item: &Item) -> Result<Enrichment, VerifyError>;
}

/// The remote verification service.
#[async_trait]
pub trait MarketLookup: Send + Sync {
    async fn fetch(&self, id: &str) -> Result<CoinMetadata, LookupError>;
}

/// Persistence port. Implementations must be safe to call from every worker
/// at once.
#[async_trait]
pub trait ItemStore: Send + Sync {
    async fn add(&self, item: &Item) -> Result<(), StoreError>;
    async fn delete(&self, id: &str) -> Result<(), StoreError>;
    async fn get(&self, id: &str) -> Result<Item, StoreError>;
}
