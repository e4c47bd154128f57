//! Translation endpoint.
//!
//! `POST /translation` with `{text, locale?, kind?, type?}`. When `locale` is
//! absent the preferred `Accept-Language` tag is used. Source text is
//! English, so English (and `*`) requests are answered with 204.

use crate::server::EdgeServer;
use crate::translation::TranslationRequest;
use axum::http::header::{ACCEPT_LANGUAGE, CACHE_CONTROL, CONTENT_LANGUAGE, CONTENT_TYPE};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use edge_types::{DescriptionKind, TextKind, TranslationStatus};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Request body for `POST /translation`.
#[derive(Debug, Clone, Deserialize)]
pub struct TranslationBody {
    /// Source text.
    pub text: String,
    /// Target locale; falls back to `Accept-Language`.
    #[serde(default)]
    pub locale: Option<String>,
    /// Markup flavour (default: `text/markdown`).
    #[serde(default)]
    pub kind: Option<TextKind>,
    /// Which part of the listing the text is (default: `description`).
    #[serde(default, rename = "type")]
    pub description_kind: Option<DescriptionKind>,
}

/// Error body, `{"error": {"code", "message", "type"}}`.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Serialize)]
struct ErrorDetail {
    code: u16,
    message: String,
    #[serde(rename = "type")]
    kind: &'static str,
}

fn error_response(status: StatusCode, kind: &'static str, message: impl Into<String>) -> Response {
    let body = ErrorBody {
        error: ErrorDetail {
            code: status.as_u16(),
            message: message.into(),
            kind,
        },
    };
    (status, Json(body)).into_response()
}

/// Translation handler.
pub async fn translation_handler(
    Extension(server): Extension<Arc<EdgeServer>>,
    headers: HeaderMap,
    Json(body): Json<TranslationBody>,
) -> Response {
    let locale = body
        .locale
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
        .or_else(|| {
            headers
                .get(ACCEPT_LANGUAGE)
                .and_then(|v| v.to_str().ok())
                .and_then(preferred_language)
        });

    let Some(locale) = locale else {
        return error_response(StatusCode::BAD_REQUEST, "invalid_request", "No language specified");
    };

    if body.text.trim().is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "invalid_request", "No text specified");
    }

    if is_source_language(&locale) {
        return StatusCode::NO_CONTENT.into_response();
    }

    let request = TranslationRequest {
        text: body.text,
        locale: locale.clone(),
        text_kind: body.kind.unwrap_or(TextKind::Markdown),
        kind: body.description_kind.unwrap_or_default(),
    };

    match server.pipeline().request(request).await {
        // The cache key ignores markup, so label with what was stored.
        Ok(TranslationStatus::Ready { content, text_kind }) => {
            let mut response = (StatusCode::OK, content).into_response();
            let headers = response.headers_mut();
            headers.insert(CONTENT_TYPE, HeaderValue::from_static(text_kind.mime()));
            headers.insert(
                CACHE_CONTROL,
                HeaderValue::from_static("public, max-age=86400"),
            );
            if let Ok(value) = HeaderValue::from_str(&locale) {
                headers.insert(CONTENT_LANGUAGE, value);
            }
            response
        }
        Ok(TranslationStatus::Pending) => StatusCode::ACCEPTED.into_response(),
        Err(e) => {
            tracing::error!("Translation lookup failed: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "storage_error", e.to_string())
        }
    }
}

/// Whether `locale` names the language source texts are written in.
fn is_source_language(locale: &str) -> bool {
    locale == "*" || locale.to_ascii_lowercase().starts_with("en")
}

/// Highest-weighted tag of an `Accept-Language` header.
///
/// Ties keep header order. Tags with `q=0` are never chosen.
fn preferred_language(header: &str) -> Option<String> {
    let mut best: Option<(&str, f32)> = None;

    for entry in header.split(',') {
        let mut parts = entry.split(';');
        let tag = parts.next().unwrap_or_default().trim();
        if tag.is_empty() {
            continue;
        }

        let q = parts
            .filter_map(|p| p.trim().strip_prefix("q="))
            .find_map(|q| q.trim().parse::<f32>().ok())
            .unwrap_or(1.0);
        if q <= 0.0 {
            continue;
        }

        if best.map_or(true, |(_, best_q)| q > best_q) {
            best = Some((tag, q));
        }
    }

    best.map(|(tag, _)| tag.to_string())
}
