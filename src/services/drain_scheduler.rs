use crate::error::{AppError, Result};
use crate::models::DrainResult;
use crate::services::{ErrorPolicy, QueuingClient, RemoteClient};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

/// Periodically drains a `QueuingClient` from a single task.
///
/// Each drain runs on the blocking pool and is awaited before the next tick,
/// so drains never overlap.
pub struct DrainScheduler<C> {
    client: Arc<QueuingClient<C>>,
    interval: Duration,
    policy: ErrorPolicy,
}

impl<C: RemoteClient + 'static> DrainScheduler<C> {
    pub fn new(client: Arc<QueuingClient<C>>, interval: Duration, policy: ErrorPolicy) -> Self {
        Self {
            client,
            interval,
            policy,
        }
    }

    /// Runs until `shutdown` flips to true, then drains one last time.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(
            "Drain scheduler started (every {:?}, policy {:?})",
            self.interval,
            self.policy
        );

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.drain_once().await {
                        tracing::error!("Drain failed: {:?}", e);
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!("Drain scheduler stopping, flushing {} queued events", self.client.count());
        if let Err(e) = self.drain_once().await {
            tracing::error!("Final drain failed: {:?}", e);
        }
    }

    /// `Ok(None)` means no session key is set, whether or not events are queued.
    pub async fn drain_once(&self) -> Result<Option<Vec<DrainResult>>> {
        if !self.client.has_session() {
            return Ok(None);
        }
        if self.client.count() == 0 {
            return Ok(Some(Vec::new()));
        }
        run_drain(self.client.clone(), self.policy).await
    }
}

/// Runs `process` on the blocking pool so remote calls never stall the runtime.
pub async fn run_drain<C: RemoteClient + 'static>(
    client: Arc<QueuingClient<C>>,
    policy: ErrorPolicy,
) -> Result<Option<Vec<DrainResult>>> {
    tokio::task::spawn_blocking(move || client.process(policy))
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Drain task panicked: {}", e)))?
}
