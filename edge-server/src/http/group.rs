//! Relay endpoint: `GET /group/:id[?client=<id>]`.

use crate::server::EdgeServer;
use crate::session::Session;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Path, Query};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Extension;
use edge_types::{ClientId, GroupId};
use serde::Deserialize;
use std::sync::Arc;

/// Query parameters accepted on join.
#[derive(Debug, Default, Deserialize)]
pub struct JoinParams {
    /// Client id hint; counts as the first identity seen.
    pub client: Option<String>,
}

/// Upgrade to a WebSocket and join the group.
///
/// Plain HTTP requests get `501 Not Implemented`.
pub async fn group_handler(
    Path(id): Path<String>,
    Query(params): Query<JoinParams>,
    Extension(server): Extension<Arc<EdgeServer>>,
    upgrade: Option<WebSocketUpgrade>,
) -> Response {
    let Some(upgrade) = upgrade else {
        return (StatusCode::NOT_IMPLEMENTED, "Not Implemented").into_response();
    };

    let group = match GroupId::new(id) {
        Ok(group) => group,
        Err(e) => return (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
    };

    let hint = params
        .client
        .filter(|c| !c.is_empty())
        .map(ClientId::new);

    upgrade.on_upgrade(move |socket| Session::new(server, group, hint).run(socket))
}
