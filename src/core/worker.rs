use crate::domain::model::Item;
use crate::domain::ports::{ItemStore, Verifier};
use crate::utils::error::VerifyError;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

/// Per-outcome counters shared by every worker.
#[derive(Debug, Default)]
pub struct WorkerStats {
    received: AtomicU64,
    verified: AtomicU64,
    already_known: AtomicU64,
    upstream_failed: AtomicU64,
    persisted: AtomicU64,
    persist_failed: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub received: u64,
    pub verified: u64,
    pub already_known: u64,
    pub upstream_failed: u64,
    pub persisted: u64,
    pub persist_failed: u64,
}

impl WorkerStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            verified: self.verified.load(Ordering::Relaxed),
            already_known: self.already_known.load(Ordering::Relaxed),
            upstream_failed: self.upstream_failed.load(Ordering::Relaxed),
            persisted: self.persisted.load(Ordering::Relaxed),
            persist_failed: self.persist_failed.load(Ordering::Relaxed),
        }
    }
}

impl StatsSnapshot {
    /// Items whose processing has finished, successfully or not.
    pub fn completed(&self) -> u64 {
        self.already_known + self.upstream_failed + self.verified
    }
}

/// Fixed set of workers draining the relay buffer.
///
/// Each item gets one verification attempt. Every failure is logged and the
/// item dropped; nothing is retried or requeued.
pub struct WorkerPool {
    size: usize,
    verifier: Arc<dyn Verifier>,
    store: Option<Arc<dyn ItemStore>>,
    stats: Arc<WorkerStats>,
}

impl WorkerPool {
    pub fn new(
        size: usize,
        verifier: Arc<dyn Verifier>,
        store: Option<Arc<dyn ItemStore>>,
    ) -> Self {
        Self {
            size: size.max(1),
            verifier,
            store,
            stats: Arc::new(WorkerStats::default()),
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn stats(&self) -> Arc<WorkerStats> {
        Arc::clone(&self.stats)
    }

    /// Spawns the workers. They exit once the relay buffer is closed and empty.
    pub fn spawn(&self, relay: mpsc::Receiver<Item>) -> Vec<JoinHandle<()>> {
        let relay = Arc::new(Mutex::new(relay));
        tracing::info!("👷 Starting {} workers", self.size);

        (1..=self.size)
            .map(|worker_id| {
                let relay = Arc::clone(&relay);
                let verifier = Arc::clone(&self.verifier);
                let store = self.store.clone();
                let stats = Arc::clone(&self.stats);

                tokio::spawn(async move {
                    loop {
                        // 只在取件時持有鎖，驗證期間其他 worker 可以繼續取件
                        let next = relay.lock().await.recv().await;
                        let Some(item) = next else {
                            break;
                        };
                        process_item(
                            worker_id,
                            item,
                            verifier.as_ref(),
                            store.as_deref(),
                            &stats,
                        )
                        .await;
                    }
                    tracing::debug!("Worker {} exiting, relay buffer closed", worker_id);
                })
            })
            .collect()
    }
}

async fn process_item(
    worker_id: usize,
    mut item: Item,
    verifier: &dyn Verifier,
    store: Option<&dyn ItemStore>,
    stats: &WorkerStats,
) {
    stats.received.fetch_add(1, Ordering::Relaxed);

    let enrichment = match verifier.verify(&item).await {
        Ok(enrichment) => enrichment,
        Err(err @ VerifyError::AlreadyKnown { .. }) => {
            stats.already_known.fetch_add(1, Ordering::Relaxed);
            tracing::warn!("Worker {}: skipping {}: {}", worker_id, item.id(), err);
            return;
        }
        Err(err) => {
            stats.upstream_failed.fetch_add(1, Ordering::Relaxed);
            tracing::error!(
                "❌ Worker {}: an error occurred with {} (batch {}): {}",
                worker_id,
                item.id(),
                item.batch(),
                err
            );
            return;
        }
    };

    item.enrich(enrichment);
    stats.verified.fetch_add(1, Ordering::Relaxed);
    tracing::debug!(
        "Worker {}: verified {} with {} markets",
        worker_id,
        item.id(),
        item.markets().len()
    );

    let Some(store) = store else {
        return;
    };

    match store.add(&item).await {
        Ok(()) => {
            stats.persisted.fetch_add(1, Ordering::Relaxed);
        }
        Err(err) => {
            stats.persist_failed.fetch_add(1, Ordering::Relaxed);
            tracing::error!(
                "❌ Worker {}: an error occurred during store add for {}: {}",
                worker_id,
                item.id(),
                err
            );
        }
    }
}
