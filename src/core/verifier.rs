use crate::core::registry::{DedupPolicy, DedupRegistry};
use crate::domain::model::{Enrichment, Item};
use crate::domain::ports::{MarketLookup, Verifier};
use crate::utils::error::VerifyError;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Verifier backed by a [`DedupRegistry`] and a remote [`MarketLookup`].
pub struct RegistryVerifier<L: MarketLookup> {
    lookup: L,
    registry: Arc<DedupRegistry>,
    policy: DedupPolicy,
    timeout: Option<Duration>,
}

impl<L: MarketLookup> RegistryVerifier<L> {
    pub fn new(lookup: L, registry: Arc<DedupRegistry>, policy: DedupPolicy) -> Self {
        Self {
            lookup,
            registry,
            policy,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl<L: MarketLookup> Verifier for RegistryVerifier<L> {
    async fn verify(&self, item: &Item) -> Result<Enrichment, VerifyError> {
        let id = item.id();
        if self.registry.seen(id) {
            return Err(VerifyError::AlreadyKnown { id: id.to_string() });
        }

        tracing::debug!("Verifying {} (batch {})", id, item.batch());
        let fetched = match self.timeout {
            Some(after) => tokio::time::timeout(after, self.lookup.fetch(id))
                .await
                .map_err(|_| VerifyError::Timeout {
                    id: id.to_string(),
                    after,
                })?,
            None => self.lookup.fetch(id).await,
        };

        let metadata = fetched.map_err(|source| VerifyError::Upstream {
            id: id.to_string(),
            source,
        })?;

        if self.policy == DedupPolicy::RecordOnSuccess {
            self.registry.record(id);
        }

        Ok(Enrichment::from(metadata))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{CoinMetadata, Market, Ticker};
    use crate::utils::error::LookupError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct MockLookup {
        calls: Arc<AtomicUsize>,
        markets: Option<Vec<&'static str>>,
        delay: Option<Duration>,
    }

    impl MockLookup {
        fn ok(markets: Vec<&'static str>) -> (Self, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            (
                Self {
                    calls: Arc::clone(&calls),
                    markets: Some(markets),
                    delay: None,
                },
                calls,
            )
        }

        fn failing() -> (Self, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            (
                Self {
                    calls: Arc::clone(&calls),
                    markets: None,
                    delay: None,
                },
                calls,
            )
        }
    }

    #[async_trait]
    impl MarketLookup for MockLookup {
        async fn fetch(&self, id: &str) -> Result<CoinMetadata, LookupError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            match &self.markets {
                Some(markets) => Ok(CoinMetadata {
                    id: id.to_string(),
                    tickers: Some(
                        markets
                            .iter()
                            .map(|m| Ticker {
                                base: None,
                                target: None,
                                market: Market {
                                    identifier: m.to_string(),
                                    name: None,
                                },
                            })
                            .collect(),
                    ),
                    ..Default::default()
                }),
                None => Err(LookupError::Status {
                    id: id.to_string(),
                    status: 404,
                }),
            }
        }
    }

    #[tokio::test]
    async fn test_success_returns_markets_and_records() {
        let (lookup, calls) = MockLookup::ok(vec!["binance", "coinbase"]);
        let registry = Arc::new(DedupRegistry::new());
        let verifier =
            RegistryVerifier::new(lookup, Arc::clone(&registry), DedupPolicy::RecordOnSuccess);

        let item = Item::new("eth", 1).unwrap();
        let enrichment = verifier.verify(&item).await.unwrap();

        assert_eq!(enrichment.markets, vec!["binance", "coinbase"]);
        assert!(registry.seen("eth"));

        let err = verifier.verify(&item).await.unwrap_err();
        assert!(matches!(err, VerifyError::AlreadyKnown { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_check_only_keeps_registry_empty() {
        let (lookup, calls) = MockLookup::ok(vec!["binance"]);
        let registry = Arc::new(DedupRegistry::new());
        let verifier =
            RegistryVerifier::new(lookup, Arc::clone(&registry), DedupPolicy::CheckOnly);

        let item = Item::new("bitcoin", 1).unwrap();
        assert!(verifier.verify(&item).await.is_ok());
        assert!(verifier.verify(&item).await.is_ok());

        assert!(registry.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_known_id_skips_remote_call() {
        let (lookup, calls) = MockLookup::ok(vec![]);
        let registry = Arc::new(DedupRegistry::new());
        registry.record("bitcoin");
        let verifier = RegistryVerifier::new(lookup, registry, DedupPolicy::CheckOnly);

        let err = verifier
            .verify(&Item::new("bitcoin", 3).unwrap())
            .await
            .unwrap_err();
        assert_eq!(err.id(), "bitcoin");
        assert!(matches!(err, VerifyError::AlreadyKnown { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_upstream_failure_is_not_recorded() {
        let (lookup, _) = MockLookup::failing();
        let registry = Arc::new(DedupRegistry::new());
        let verifier =
            RegistryVerifier::new(lookup, Arc::clone(&registry), DedupPolicy::RecordOnSuccess);

        let err = verifier
            .verify(&Item::new("not-a-coin", 1).unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, VerifyError::Upstream { .. }));
        assert!(!registry.seen("not-a-coin"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_reported_as_upstream() {
        let (mut lookup, _) = MockLookup::ok(vec!["binance"]);
        lookup.delay = Some(Duration::from_secs(60));
        let registry = Arc::new(DedupRegistry::new());
        let verifier =
            RegistryVerifier::new(lookup, Arc::clone(&registry), DedupPolicy::RecordOnSuccess)
                .with_timeout(Some(Duration::from_secs(5)));

        let err = verifier
            .verify(&Item::new("slow", 1).unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, VerifyError::Timeout { .. }));
        assert!(err.is_upstream());
        assert!(!registry.seen("slow"));
    }
}
