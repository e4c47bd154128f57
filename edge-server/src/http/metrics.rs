//! Prometheus metrics endpoint.

use crate::server::EdgeServer;
use axum::{http::header::CONTENT_TYPE, response::IntoResponse, Extension};
use std::sync::atomic::Ordering;
use std::sync::Arc;

/// Prometheus metrics handler.
///
/// Returns metrics in Prometheus text format.
/// Includes both gauges (current state) and counters (monotonic since startup).
pub async fn metrics_handler(Extension(server): Extension<Arc<EdgeServer>>) -> impl IntoResponse {
    let m = server.metrics();

    // Gauges: current state
    let connections = server.groups().total_connections();
    let groups = server.groups().total_groups();
    let cached = server.store().count().await.unwrap_or(0);

    // Counters: monotonic since startup
    let conns_total = m.connections_total.load(Ordering::Relaxed);
    let relayed = m.frames_relayed.load(Ordering::Relaxed);
    let delivered = m.frames_delivered.load(Ordering::Relaxed);
    let dropped = m.frames_dropped.load(Ordering::Relaxed);
    let pongs = m.pongs_sent.load(Ordering::Relaxed);
    let requested = m.translations_requested.load(Ordering::Relaxed);
    let ready = m.translations_ready.load(Ordering::Relaxed);
    let pending = m.translations_pending.load(Ordering::Relaxed);
    let completed = m.jobs_completed.load(Ordering::Relaxed);
    let failed = m.jobs_failed.load(Ordering::Relaxed);

    let body = format!(
        r#"# HELP xmcl_edge_connections_active Number of active relay connections
# TYPE xmcl_edge_connections_active gauge
xmcl_edge_connections_active {connections}

# HELP xmcl_edge_groups_active Number of active relay groups
# TYPE xmcl_edge_groups_active gauge
xmcl_edge_groups_active {groups}

# HELP xmcl_edge_translations_cached Number of cached translations
# TYPE xmcl_edge_translations_cached gauge
xmcl_edge_translations_cached {cached}

# HELP xmcl_edge_info Server information
# TYPE xmcl_edge_info gauge
xmcl_edge_info{{version="{version}"}} 1

# HELP xmcl_edge_connections_total Total relay connections accepted
# TYPE xmcl_edge_connections_total counter
xmcl_edge_connections_total {conns_total}

# HELP xmcl_edge_frames_relayed_total Total frames published to groups
# TYPE xmcl_edge_frames_relayed_total counter
xmcl_edge_frames_relayed_total {relayed}

# HELP xmcl_edge_frames_delivered_total Total frames delivered to sockets
# TYPE xmcl_edge_frames_delivered_total counter
xmcl_edge_frames_delivered_total {delivered}

# HELP xmcl_edge_frames_dropped_total Total oversized frames dropped
# TYPE xmcl_edge_frames_dropped_total counter
xmcl_edge_frames_dropped_total {dropped}

# HELP xmcl_edge_pongs_sent_total Total PONG replies sent
# TYPE xmcl_edge_pongs_sent_total counter
xmcl_edge_pongs_sent_total {pongs}

# HELP xmcl_edge_translations_requested_total Total translation requests
# TYPE xmcl_edge_translations_requested_total counter
xmcl_edge_translations_requested_total {requested}

# HELP xmcl_edge_translations_ready_total Total requests served from cache
# TYPE xmcl_edge_translations_ready_total counter
xmcl_edge_translations_ready_total {ready}

# HELP xmcl_edge_translations_pending_total Total requests answered pending
# TYPE xmcl_edge_translations_pending_total counter
xmcl_edge_translations_pending_total {pending}

# HELP xmcl_edge_jobs_completed_total Total translation jobs completed
# TYPE xmcl_edge_jobs_completed_total counter
xmcl_edge_jobs_completed_total {completed}

# HELP xmcl_edge_jobs_failed_total Total translation jobs failed
# TYPE xmcl_edge_jobs_failed_total counter
xmcl_edge_jobs_failed_total {failed}
"#,
        version = env!("CARGO_PKG_VERSION"),
    );

    (
        [(CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
}
