//! HTTP ingress for alert batches.
//!
//! Provides REST API endpoints for:
//! - Health checks
//! - Receiving Alertmanager webhook batches
//!
//! Each alert in a batch is handed to its own detached task; the handler
//! answers before any processing happens.

use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing::{debug, info};

use crate::pipeline::Pipeline;

/// Upper bound on a webhook body.
const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Server state shared across handlers.
pub struct ServerState {
    /// Pipeline each alert is run through
    pub pipeline: Arc<Pipeline>,
}

impl ServerState {
    /// Create server state around a pipeline.
    #[must_use]
    pub fn new(pipeline: Pipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
        }
    }
}

/// Build the HTTP router.
pub fn build_router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/webhook", post(webhook_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES)),
        )
        .with_state(state)
}

/// Start the HTTP server.
///
/// # Errors
///
/// Returns an error if the server fails to bind or stops unexpectedly.
pub async fn run_server(state: Arc<ServerState>, addr: &str) -> Result<()> {
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("Responder listening on {addr}");

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

// ============================================================================
// Response types
// ============================================================================

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// Webhook acknowledgement.
#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    /// `accepted` or `no alerts`
    pub status: &'static str,
    /// Present when alerts were accepted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
    /// Number of alerts scheduled
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alerts: Option<usize>,
}

// ============================================================================
// Handlers
// ============================================================================

async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Accept a batch and schedule one background task per alert.
async fn webhook_handler(
    State(state): State<Arc<ServerState>>,
    Json(payload): Json<Value>,
) -> impl IntoResponse {
    let alerts = payload
        .get("alerts")
        .and_then(Value::as_array)
        .filter(|alerts| !alerts.is_empty());

    let Some(alerts) = alerts else {
        debug!("Webhook carried no alerts");
        return (
            StatusCode::OK,
            Json(WebhookResponse {
                status: "no alerts",
                message: None,
                alerts: None,
            }),
        );
    };

    info!(count = alerts.len(), "Received alert batch");

    for raw in alerts {
        let pipeline = Arc::clone(&state.pipeline);
        let raw = raw.clone();
        tokio::spawn(async move {
            pipeline.process(&raw).await;
        });
    }

    (
        StatusCode::ACCEPTED,
        Json(WebhookResponse {
            status: "accepted",
            message: Some("Processing in background"),
            alerts: Some(alerts.len()),
        }),
    )
}
