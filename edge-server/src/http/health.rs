//! Health check endpoint.

use crate::server::EdgeServer;
use axum::{Extension, Json};
use serde::Serialize;
use std::sync::Arc;

/// Health status response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    /// Overall status.
    pub status: String,
    /// Server version.
    pub version: String,
    /// Number of active relay connections.
    pub connections: usize,
    /// Number of active groups.
    pub groups: usize,
    /// Number of cached translations, if the store answered.
    pub translations: Option<u64>,
    /// Uptime in seconds.
    pub uptime_seconds: u64,
}

/// Health check handler.
pub async fn health_handler(Extension(server): Extension<Arc<EdgeServer>>) -> Json<HealthStatus> {
    let translations = match server.store().count().await {
        Ok(count) => Some(count),
        Err(e) => {
            tracing::warn!("Health check could not count translations: {}", e);
            None
        }
    };

    Json(HealthStatus {
        status: if translations.is_some() { "ok" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        connections: server.groups().total_connections(),
        groups: server.groups().total_groups(),
        translations,
        uptime_seconds: server.uptime_secs(),
    })
}
