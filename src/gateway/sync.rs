use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::executor::Gateway;

#[derive(Debug, Clone, Copy)]
pub struct SyncSettings {
    pub push_debounce: Duration,
    pub pull_interval: Duration,
}

impl From<&crate::models::RemoteConfig> for SyncSettings {
    fn from(config: &crate::models::RemoteConfig) -> Self {
        Self {
            push_debounce: Duration::from_millis(config.push_debounce_ms),
            pull_interval: Duration::from_secs(config.pull_interval_secs.max(1)),
        }
    }
}

/// Coalesces push requests and pulls periodically until cancelled. A final
/// push runs on shutdown.
pub fn start_sync_worker(
    gateway: Arc<Gateway>,
    settings: SyncSettings,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let pool = gateway.pool().clone();
        let mut interval = tokio::time::interval(settings.pull_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately; load() already pulled.
        interval.tick().await;
        let mut dirty = false;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Pool sync worker received cancel signal");
                    break;
                }
                _ = pool.push_requested() => {
                    dirty = true;
                    // Collapse a burst of mutations into one push.
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(settings.push_debounce) => {}
                    }
                    match gateway.push_remote().await {
                        Ok(()) => dirty = false,
                        Err(e) => tracing::warn!(
                            "Pool push failed, will retry on next change or tick: {}",
                            e
                        ),
                    }
                }
                _ = interval.tick() => {
                    if dirty {
                        match gateway.push_remote().await {
                            Ok(()) => dirty = false,
                            Err(e) => tracing::warn!("Pool push retry failed: {}", e),
                        }
                    } else if let Err(e) = gateway.pull_remote().await {
                        tracing::warn!("Periodic pool pull failed: {}", e);
                    }
                }
            }
        }

        if let Err(e) = gateway.push_remote().await {
            tracing::warn!("Final pool push failed: {}", e);
        }
        tracing::info!("Pool sync worker stopped");
    })
}
