use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Whether a successful verification is written back into the registry.
///
/// `RecordOnSuccess` makes repeat submissions of a verified id come back as
/// `AlreadyKnown`. `CheckOnly` keeps the older lookup-only behaviour, where
/// the registry is consulted but never filled by the verifier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum DedupPolicy {
    #[default]
    RecordOnSuccess,
    CheckOnly,
}

/// Identifiers already verified, shared by every worker.
///
/// All operations go through one lock. `seen` and `record` are separate
/// critical sections; there is no check-and-set.
#[derive(Debug, Default)]
pub struct DedupRegistry {
    known: Mutex<HashSet<String>>,
}

impl DedupRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seen(&self, id: &str) -> bool {
        self.known.lock().contains(id)
    }

    pub fn record(&self, id: impl Into<String>) {
        self.known.lock().insert(id.into());
    }

    /// Returns true if the id was present.
    pub fn forget(&self, id: &str) -> bool {
        self.known.lock().remove(id)
    }

    pub fn len(&self) -> usize {
        self.known.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.known.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_record_and_forget() {
        let registry = DedupRegistry::new();
        assert!(!registry.seen("bitcoin"));

        registry.record("bitcoin");
        assert!(registry.seen("bitcoin"));
        assert_eq!(registry.len(), 1);

        assert!(registry.forget("bitcoin"));
        assert!(!registry.forget("bitcoin"));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_concurrent_records_are_not_lost() {
        let registry = Arc::new(DedupRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    for i in 0..100 {
                        registry.record(format!("coin-{}-{}", t, i));
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(registry.len(), 800);
    }
}
