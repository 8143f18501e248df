use crate::domain::model::Item;
use crate::utils::error::{Result, TokenError};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Rate-limited relay between the ingress queue and the worker pool.
///
/// One item is pulled per tick, at most `rate_per_minute` per minute. Ticks
/// are never banked: time spent waiting on an empty source or a full relay
/// buffer is lost, and the next pull is scheduled one full interval after the
/// previous item was handed off.
#[derive(Debug, Clone)]
pub struct Throttle {
    interval: Duration,
    relay_capacity: usize,
}

impl Throttle {
    pub fn new(rate_per_minute: u32, relay_capacity: usize) -> Result<Self> {
        if rate_per_minute == 0 {
            return Err(TokenError::ConfigValidationError {
                field: "rate_per_minute".to_string(),
                message: "throttle rate must be at least 1 item per minute".to_string(),
            });
        }
        if relay_capacity == 0 {
            return Err(TokenError::ConfigValidationError {
                field: "relay_capacity".to_string(),
                message: "relay buffer needs room for at least one item".to_string(),
            });
        }

        Ok(Self {
            interval: Duration::from_secs(60) / rate_per_minute,
            relay_capacity,
        })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Starts the relay task and returns the read side of the relay buffer.
    ///
    /// The task ends when `shutdown` changes (or its sender is dropped) or
    /// the source closes. Either way the relay sender is dropped, so workers
    /// see the buffer close once they have drained it.
    pub fn spawn(
        &self,
        mut source: mpsc::Receiver<Item>,
        mut shutdown: watch::Receiver<bool>,
    ) -> (mpsc::Receiver<Item>, JoinHandle<()>) {
        let (relay_tx, relay_rx) = mpsc::channel(self.relay_capacity);
        let period = self.interval;
        tracing::info!("⏱️ Throttle interval: {:?}", period);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut relayed: u64 = 0;

            loop {
                // 第一次 tick 立即觸發
                tokio::select! {
                    biased;
                    _ = shutdown.changed() => break,
                    _ = ticker.tick() => {}
                }

                let item = tokio::select! {
                    biased;
                    _ = shutdown.changed() => break,
                    next = source.recv() => match next {
                        Some(item) => item,
                        None => break,
                    },
                };

                let id = item.id().to_string();
                tokio::select! {
                    biased;
                    _ = shutdown.changed() => {
                        tracing::warn!("Throttle stopped while relaying {}, item dropped", id);
                        break;
                    }
                    sent = relay_tx.send(item) => {
                        if sent.is_err() {
                            tracing::warn!("Relay buffer closed, throttle exiting");
                            break;
                        }
                    }
                }

                relayed += 1;
                tracing::trace!("Relayed {} ({} total)", id, relayed);
                ticker.reset();
            }

            tracing::info!("Throttle stopped after relaying {} items", relayed);
        });

        (relay_rx, handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    fn item(id: &str) -> Item {
        Item::new(id, 1).unwrap()
    }

    #[test]
    fn test_interval_from_rate() {
        let throttle = Throttle::new(50, 50).unwrap();
        assert_eq!(throttle.interval(), Duration::from_millis(1200));
        assert!(Throttle::new(0, 50).is_err());
        assert!(Throttle::new(10, 0).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_never_exceeds_rate_with_ready_source() {
        let (tx, rx) = mpsc::channel(100);
        for i in 0..10 {
            tx.send(item(&format!("coin-{}", i))).await.unwrap();
        }
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        let throttle = Throttle::new(2, 50).unwrap();
        let (mut relay, _handle) = throttle.spawn(rx, shutdown_rx);

        let start = Instant::now();
        let mut arrivals = Vec::new();
        for _ in 0..5 {
            relay.recv().await.unwrap();
            arrivals.push(start.elapsed());
        }

        // rate = 2/min -> 30 秒一筆，第一筆立即
        assert!(arrivals[0] < Duration::from_secs(1));
        for pair in arrivals.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_secs(30));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_source_does_not_bank_ticks() {
        let (tx, rx) = mpsc::channel(100);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let throttle = Throttle::new(1, 50).unwrap();
        let (mut relay, _handle) = throttle.spawn(rx, shutdown_rx);

        // 來源空了五分鐘，之後一次送入三筆
        tokio::time::sleep(Duration::from_secs(300)).await;
        for id in ["a", "b", "c"] {
            tx.send(item(id)).await.unwrap();
        }

        let first = {
            relay.recv().await.unwrap();
            Instant::now()
        };
        relay.recv().await.unwrap();
        let third = {
            relay.recv().await.unwrap();
            Instant::now()
        };

        assert!(third - first >= Duration::from_secs(120));
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_relay_pauses_intake() {
        let (tx, rx) = mpsc::channel(100);
        for i in 0..5 {
            tx.send(item(&format!("coin-{}", i))).await.unwrap();
        }
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let throttle = Throttle::new(6000, 2).unwrap();
        let (mut relay, _handle) = throttle.spawn(rx, shutdown_rx);

        tokio::time::sleep(Duration::from_secs(5)).await;
        // relay 裝兩筆、throttle 手上握一筆，來源剩兩筆
        assert_eq!(tx.capacity(), 100 - 2);

        let mut ids = Vec::new();
        for _ in 0..5 {
            ids.push(relay.recv().await.unwrap().id().to_string());
        }
        assert_eq!(ids, vec!["coin-0", "coin-1", "coin-2", "coin-3", "coin-4"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_closes_relay() {
        let (_tx, rx) = mpsc::channel::<Item>(10);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let throttle = Throttle::new(60, 10).unwrap();
        let (mut relay, handle) = throttle.spawn(rx, shutdown_rx);

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
        assert!(relay.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_source_closes_relay_after_draining() {
        let (tx, rx) = mpsc::channel(10);
        tx.send(item("last")).await.unwrap();
        drop(tx);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let throttle = Throttle::new(60, 10).unwrap();
        let (mut relay, handle) = throttle.spawn(rx, shutdown_rx);

        assert_eq!(relay.recv().await.unwrap().id(), "last");
        assert!(relay.recv().await.is_none());
        handle.await.unwrap();
    }
}
