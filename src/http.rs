// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Info and health HTTP endpoints.
//!
//! | Path       | Response                                           |
//! |------------|----------------------------------------------------|
//! | `/`        | `poolwatch version <version>`                      |
//! | `/health`  | `OK`                                               |
//! | `/info`    | version and active watches, as JSON                |
//! | `/metrics` | Prometheus text format                             |
//! | other      | `307 Temporary Redirect` to `/`                    |

use crate::constants::VERSION;
use crate::metrics::gather_metrics;
use crate::registry::{WatchConfig, WatchRegistry};
use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tracing::{error, info};

/// Body of `GET /info`.
#[derive(Debug, Serialize)]
pub struct InfoResponse {
    pub version: &'static str,
    pub registrations: Vec<WatchConfig>,
}

/// Build the router of all endpoints.
pub fn router(registry: Arc<WatchRegistry>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/info", get(watch_info))
        .route("/metrics", get(metrics))
        .fallback(fallback)
        .with_state(registry)
}

/// Serve the endpoints on `listen_addr` until `shutdown` completes.
///
/// # Errors
///
/// Returns an error if the address cannot be bound or the server fails.
pub async fn serve(
    listen_addr: &str,
    registry: Arc<WatchRegistry>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("Failed to bind info endpoint to {listen_addr}"))?;
    info!(listen_addr = %listen_addr, "Info endpoint listening");

    axum::serve(listener, router(registry))
        .with_graceful_shutdown(shutdown)
        .await
        .context("Info endpoint failed")
}

async fn root() -> String {
    format!("poolwatch version {VERSION}")
}

async fn health() -> &'static str {
    "OK"
}

async fn watch_info(State(registry): State<Arc<WatchRegistry>>) -> Json<InfoResponse> {
    Json(InfoResponse {
        version: VERSION,
        registrations: registry.registrations(),
    })
}

async fn metrics() -> Response {
    match gather_metrics() {
        Ok(body) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn fallback() -> Redirect {
    Redirect::temporary("/")
}

#[cfg(test)]
#[path = "http_tests.rs"]
mod http_tests;
