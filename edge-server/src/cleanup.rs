//! Background sweep for abandoned translation locks.
//!
//! A job that dies with its process leaves its lock row behind, and every
//! later request for that hash would stay `Pending`. The sweep releases locks
//! not refreshed within the configured TTL. Running jobs refresh theirs every
//! [`LOCK_REFRESH_INTERVAL`](crate::translation::LOCK_REFRESH_INTERVAL).

use crate::config::CleanupConfig;
use crate::storage::{SqliteStore, TranslationStore};
use crate::translation::LOCK_REFRESH_INTERVAL;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;

/// Spawn a background cleanup task.
///
/// Returns a handle that can be used to abort the task.
pub fn spawn_cleanup_task(
    store: Arc<dyn TranslationStore>,
    config: CleanupConfig,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        if !config.enabled {
            tracing::info!("Cleanup task disabled");
            return;
        }

        let interval_secs = config.interval_secs.max(1);
        tracing::info!(
            "Cleanup task started (interval: {}s, lock ttl: {}s)",
            interval_secs,
            config.lock_ttl_secs
        );

        if config.lock_ttl_secs <= LOCK_REFRESH_INTERVAL.as_secs() {
            tracing::warn!(
                "Lock ttl {}s does not exceed the {}s refresh interval; running jobs may lose their locks",
                config.lock_ttl_secs,
                LOCK_REFRESH_INTERVAL.as_secs()
            );
        }

        let mut timer = interval(Duration::from_secs(interval_secs));

        loop {
            timer.tick().await;

            let cutoff = SqliteStore::current_timestamp() - config.lock_ttl_secs as i64;
            match store.release_stale_locks(cutoff).await {
                Ok(released) => {
                    if released > 0 {
                        tracing::warn!("Cleanup: released {} stale translation locks", released);
                    } else {
                        tracing::debug!("Cleanup: no stale locks");
                    }
                }
                Err(e) => {
                    tracing::error!("Cleanup error: {}", e);
                }
            }
        }
    })
}
