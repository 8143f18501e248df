use crate::core::ingress::IngressQueue;
use crate::core::registry::{DedupPolicy, DedupRegistry};
use crate::core::throttle::Throttle;
use crate::core::verifier::RegistryVerifier;
use crate::core::worker::{StatsSnapshot, WorkerPool, WorkerStats};
use crate::domain::ports::{ItemStore, MarketLookup, Verifier};
use crate::utils::error::{Result, TokenError};
use crate::utils::validation::{validate_positive_number, Validate};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

pub const DEFAULT_QUEUE_CAPACITY: usize = 500;
pub const DEFAULT_RELAY_CAPACITY: usize = 50;
pub const DEFAULT_RATE_PER_MINUTE: u32 = 50;

/// 一個 CPU 一個 worker
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Sizing of the pipeline, fixed once it has started.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
    pub queue_capacity: usize,
    pub relay_capacity: usize,
    pub rate_per_minute: u32,
    pub workers: usize,
    pub verify_timeout: Option<Duration>,
    pub dedup: DedupPolicy,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            relay_capacity: DEFAULT_RELAY_CAPACITY,
            rate_per_minute: DEFAULT_RATE_PER_MINUTE,
            workers: default_workers(),
            verify_timeout: None,
            dedup: DedupPolicy::default(),
        }
    }
}

impl PipelineSettings {
    /// Verifier over `lookup` using this pipeline's dedup policy and timeout.
    pub fn build_verifier<L: MarketLookup>(
        &self,
        lookup: L,
        registry: Arc<DedupRegistry>,
    ) -> RegistryVerifier<L> {
        RegistryVerifier::new(lookup, registry, self.dedup).with_timeout(self.verify_timeout)
    }
}

impl Validate for PipelineSettings {
    fn validate(&self) -> Result<()> {
        validate_positive_number("pipeline.queue_capacity", self.queue_capacity, 1)?;
        validate_positive_number("pipeline.relay_capacity", self.relay_capacity, 1)?;
        validate_positive_number("pipeline.rate_per_minute", self.rate_per_minute as usize, 1)?;
        validate_positive_number("pipeline.workers", self.workers, 1)?;
        if self.verify_timeout.is_some_and(|timeout| timeout.is_zero()) {
            return Err(TokenError::ConfigValidationError {
                field: "pipeline.verify_timeout".to_string(),
                message: "Verify timeout must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

/// Ingress queue → throttle → worker pool → store.
pub struct VerificationPipeline;

impl VerificationPipeline {
    pub fn start(
        settings: &PipelineSettings,
        verifier: Arc<dyn Verifier>,
        store: Option<Arc<dyn ItemStore>>,
    ) -> Result<PipelineHandle> {
        settings.validate()?;

        let (ingress, source) = IngressQueue::bounded(settings.queue_capacity);
        let throttle = Throttle::new(settings.rate_per_minute, settings.relay_capacity)?;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (relay, throttle_task) = throttle.spawn(source, shutdown_rx);

        let pool = WorkerPool::new(settings.workers, verifier, store);
        let stats = pool.stats();
        let workers = pool.spawn(relay);

        tracing::info!(
            "🚀 Pipeline started: queue={}, relay={}, rate={}/min, workers={}, dedup={:?}",
            settings.queue_capacity,
            settings.relay_capacity,
            settings.rate_per_minute,
            settings.workers,
            settings.dedup
        );

        Ok(PipelineHandle {
            ingress,
            shutdown: shutdown_tx,
            throttle_task,
            workers,
            stats,
        })
    }
}

pub struct PipelineHandle {
    ingress: IngressQueue,
    shutdown: watch::Sender<bool>,
    throttle_task: JoinHandle<()>,
    workers: Vec<JoinHandle<()>>,
    stats: Arc<WorkerStats>,
}

impl PipelineHandle {
    /// Producer side for the ingress boundary.
    pub fn ingress(&self) -> IngressQueue {
        self.ingress.clone()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Stops pulling from the ingress queue, lets the workers drain the relay
    /// buffer, then waits for every task. Items still queued at ingress are
    /// dropped.
    pub async fn shutdown(self) {
        let pending = self.ingress.capacity() - self.ingress.available();
        let _ = self.shutdown.send(true);

        if let Err(e) = self.throttle_task.await {
            tracing::error!("Throttle task failed: {}", e);
        }
        for worker in self.workers {
            if let Err(e) = worker.await {
                tracing::error!("Worker task failed: {}", e);
            }
        }

        if pending > 0 {
            tracing::warn!("Shutdown dropped {} items still waiting at ingress", pending);
        }
        tracing::info!("🛑 Pipeline stopped: {:?}", self.stats.snapshot());
    }
}
