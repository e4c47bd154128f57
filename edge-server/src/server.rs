//! Main EdgeServer coordination.
//!
//! EdgeServer is constructed once at startup and shared by `Arc` with every
//! request handler. It owns the group registry, the translation store and the
//! translation pipeline.

use crate::config::Config;
use crate::groups::GroupRegistry;
use crate::storage::TranslationStore;
use crate::translation::TranslationPipeline;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use std::time::Instant;

/// Operational metrics for monitoring edge activity.
///
/// All counters are monotonically increasing (reset only on restart).
/// Thread-safe via `AtomicU64`, no locks needed for incrementing.
#[derive(Debug, Default)]
pub struct EdgeMetrics {
    /// Total relay sockets accepted.
    pub connections_total: AtomicU64,
    /// Total frames published to group channels.
    pub frames_relayed: AtomicU64,
    /// Total frames delivered from group channels to sockets.
    pub frames_delivered: AtomicU64,
    /// Total oversized frames dropped.
    pub frames_dropped: AtomicU64,
    /// Total PONG replies sent.
    pub pongs_sent: AtomicU64,
    /// Total translation requests handled.
    pub translations_requested: AtomicU64,
    /// Total requests answered from the cache.
    pub translations_ready: AtomicU64,
    /// Total requests answered with pending.
    pub translations_pending: AtomicU64,
    /// Total translation jobs that wrote a cache entry.
    pub jobs_completed: AtomicU64,
    /// Total translation jobs abandoned on error.
    pub jobs_failed: AtomicU64,
}

/// Main edge server.
pub struct EdgeServer {
    config: Config,
    groups: Arc<GroupRegistry>,
    store: Arc<dyn TranslationStore>,
    pipeline: TranslationPipeline,
    metrics: Arc<EdgeMetrics>,
    started_at: Instant,
}

impl std::fmt::Debug for EdgeServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EdgeServer")
            .field("config", &self.config)
            .field("groups", &self.groups.total_groups())
            .field("connections", &self.groups.total_connections())
            .field("metrics", &self.metrics)
            .finish_non_exhaustive()
    }
}

impl EdgeServer {
    /// Create a new EdgeServer from its collaborators.
    pub fn new(
        config: Config,
        store: Arc<dyn TranslationStore>,
        pipeline: TranslationPipeline,
        metrics: Arc<EdgeMetrics>,
    ) -> Self {
        let groups = Arc::new(GroupRegistry::new(config.relay.channel_capacity));
        Self {
            config,
            groups,
            store,
            pipeline,
            metrics,
            started_at: Instant::now(),
        }
    }

    /// Get the server configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get the group registry.
    pub fn groups(&self) -> &Arc<GroupRegistry> {
        &self.groups
    }

    /// Get access to the translation store.
    pub fn store(&self) -> &dyn TranslationStore {
        self.store.as_ref()
    }

    /// Get the translation pipeline.
    pub fn pipeline(&self) -> &TranslationPipeline {
        &self.pipeline
    }

    /// Get access to the operational metrics.
    pub fn metrics(&self) -> &EdgeMetrics {
        &self.metrics
    }

    /// Seconds since the server was constructed.
    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::storage::SqliteStore;
    use crate::translation::TranslationJob;
    use tokio::sync::mpsc;

    /// A server over an in-memory store whose job queue is returned to the
    /// caller instead of being consumed by a worker.
    pub async fn server_with_queue() -> (Arc<EdgeServer>, mpsc::Receiver<TranslationJob>) {
        let config = Config::default();
        let store: Arc<dyn TranslationStore> = Arc::new(SqliteStore::in_memory().await.unwrap());
        let metrics = Arc::new(EdgeMetrics::default());
        let (pipeline, jobs) = TranslationPipeline::new(
            store.clone(),
            metrics.clone(),
            config.translation.queue_capacity,
        );
        let server = EdgeServer::new(config, store, pipeline, metrics);
        (Arc::new(server), jobs)
    }
}
