//! HTTP surface: any request on any path is matched by its headers.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use axum::Router;
use serde_json::Value;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::config::Settings;
use crate::engine::RuleEngine;
use crate::error::PayloadError;

#[derive(Clone)]
struct AppState {
    engine: Arc<RuleEngine>,
    settings: Settings,
}

/// Build the router. Every method and path lands in the same handler;
/// only headers decide the response.
pub fn app(engine: Arc<RuleEngine>, settings: Settings) -> Router {
    let state = AppState { engine, settings };
    Router::new()
        .route("/", any(route_handler))
        .route("/{*path}", any(route_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Run the server until a shutdown signal arrives.
pub async fn serve(
    engine: Arc<RuleEngine>,
    settings: Settings,
    listener: TcpListener,
) -> std::io::Result<()> {
    let addr = listener.local_addr()?;
    info!(%addr, rules = engine.rule_count(), "Listening");
    axum::serve(listener, app(engine, settings))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(err) => {
            error!(error = %err, "Failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
    }
}

/// Collapse a header map to one value per name.
///
/// Names arrive already lowercased; repeated headers keep their first
/// value and values that are not valid UTF-8 are dropped.
fn flatten_headers(headers: &HeaderMap) -> HashMap<String, String> {
    let mut flat = HashMap::with_capacity(headers.keys_len());
    for name in headers.keys() {
        if let Some(value) = headers.get(name).and_then(|v| v.to_str().ok()) {
            flat.insert(name.as_str().to_string(), value.to_string());
        }
    }
    flat
}

async fn route_handler(State(state): State<AppState>, uri: Uri, headers: HeaderMap) -> Response {
    let flat = flatten_headers(&headers);
    let outcome = state.engine.match_headers(&flat).await;

    if outcome.matched {
        if state.settings.log_matches {
            info!(path = %uri.path(), winners = ?outcome.responses, "Request matched");
        }
    } else if state.settings.log_unmatched {
        warn!(path = %uri.path(), "No rule matched, serving fallback");
    }

    let mut payloads = Vec::with_capacity(outcome.responses.len());
    for id in &outcome.responses {
        let bytes = match state.engine.resolve(id).await {
            Ok(bytes) => bytes,
            Err(err) => return error_response(&err),
        };
        match serde_json::from_slice::<Value>(&bytes) {
            Ok(value) => payloads.push(value),
            Err(source) => {
                return error_response(&PayloadError::Decode {
                    id: id.clone(),
                    source,
                })
            }
        }
    }

    match serde_json::to_vec(&payloads) {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/json")],
            body,
        )
            .into_response(),
        Err(err) => {
            error!(error = %err, "Failed to serialize response body");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

fn error_response(err: &PayloadError) -> Response {
    let (status, code) = match err {
        PayloadError::NotFound { .. } => (StatusCode::NOT_FOUND, "not_found"),
        PayloadError::Decode { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "invalid_payload"),
    };
    warn!(error = %err, "Payload resolution failed");
    let body = serde_json::json!({
        "error": code,
        "message": err.to_string(),
    });
    (status, axum::Json(body)).into_response()
}
