//! HTTP endpoints for xmcl-edge.
//!
//! Provides the relay upgrade, the translation cache, health checks and
//! metrics.

mod group;
pub mod health;
mod metrics;
mod translation;

use crate::server::EdgeServer;
use axum::{
    routing::{get, post},
    Extension, Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub use group::JoinParams;
pub use health::HealthStatus;
pub use translation::{ErrorBody, TranslationBody};

/// Build the HTTP router with all endpoints.
pub fn build_router(server: Arc<EdgeServer>) -> Router {
    Router::new()
        .route("/group/:id", get(group::group_handler))
        .route("/translation", post(translation::translation_handler))
        .route("/health", get(health::health_handler))
        .route("/metrics", get(metrics::metrics_handler))
        .layer(TraceLayer::new_for_http())
        .layer(Extension(server))
}
