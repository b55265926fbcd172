//! Main axum router and HTTP request handlers.
//!
//! Routes:
//! - `PUT /upload/{name}`   - Ingest an uploaded chart (raw byte body)
//! - `GET /charts/{*name}`  - Serve a chart through the cache resolver
//! - `GET /healthz`         - Health check
//! - `GET /metrics`         - Prometheus metrics

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, put},
    Router,
};
use tracing::{error, info, instrument, warn};

use crate::cache::Source;
use crate::metrics::{ReadLabels, ReadOutcome};
use crate::AppState;

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the axum [`Router`] with all HTTP routes and shared state.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/upload/{name}", put(handle_upload))
        .route("/charts/{*name}", get(handle_chart))
        .route("/healthz", get(handle_health))
        .route("/metrics", get(handle_metrics))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `PUT /upload/{name}`
///
/// Accepts the raw chart bytes as the request body and runs them through
/// the ingest pipeline.  Holds the chart's name lock so a concurrent read
/// cannot observe a partially written file.
#[instrument(skip(state, body), fields(%name, bytes = body.len()))]
async fn handle_upload(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    body: Bytes,
) -> Result<Response, AppError> {
    validate_chart_name(&name)?;

    let lock = state.locks.for_name(&name);
    let _guard = lock.lock().await;

    match state.ingestor.ingest(&name, &body).await {
        Ok(()) => {
            state.metrics.metrics.uploads_total.inc();
            state.metrics.metrics.upload_bytes.inc_by(body.len() as u64);
            Ok(StatusCode::OK.into_response())
        }
        Err(e) => {
            state.metrics.metrics.upload_failures.inc();
            Err(AppError::Internal(e))
        }
    }
}

/// `GET /charts/{*name}`
///
/// Serves the chart's current authoritative bytes, refreshing the local
/// copy from the remote mirror when its fingerprint no longer matches.
#[instrument(skip(state), fields(%name))]
async fn handle_chart(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Response, AppError> {
    validate_chart_name(&name)?;

    let lock = state.locks.for_name(&name);
    let _guard = lock.lock().await;

    let resolved = state.resolver.resolve(&name).await?;

    let Some(resolved) = resolved else {
        state
            .metrics
            .metrics
            .reads_total
            .get_or_create(&ReadLabels {
                outcome: ReadOutcome::Miss,
            })
            .inc();
        warn!("chart not found in either tier");
        return Err(AppError::NotFound);
    };

    let outcome = match resolved.source {
        Source::CacheHit => ReadOutcome::Hit,
        Source::Refreshed => {
            state
                .metrics
                .metrics
                .refresh_bytes
                .inc_by(resolved.bytes.len() as u64);
            ReadOutcome::Refreshed
        }
        Source::LocalOnly => ReadOutcome::Local,
    };
    state
        .metrics
        .metrics
        .reads_total
        .get_or_create(&ReadLabels { outcome })
        .inc();

    info!(source = ?resolved.source, bytes = resolved.bytes.len(), "serving chart");

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        resolved.bytes,
    )
        .into_response())
}

/// `GET /healthz`
async fn handle_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health_state = crate::health::HealthState {
        config: Arc::clone(&state.config),
        remote: state.remote.clone(),
    };
    crate::health::health_handler(axum::extract::State(health_state)).await
}

/// `GET /metrics`
///
/// Returns Prometheus metrics collected by the server.
async fn handle_metrics(State(state): State<Arc<AppState>>) -> Result<Response, AppError> {
    let mut buf = String::new();
    prometheus_client::encoding::text::encode(&mut buf, &state.metrics.registry)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("metrics encoding failed: {e}")))?;

    Ok((
        StatusCode::OK,
        [(
            header::CONTENT_TYPE,
            "application/openmetrics-text; version=1.0.0; charset=utf-8",
        )],
        buf,
    )
        .into_response())
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

/// Validate that a chart name is safe to join onto the chart directory.
///
/// Rejects empty names, path traversal and null bytes.
fn validate_chart_name(name: &str) -> Result<(), AppError> {
    if name.is_empty()
        || name.contains('\0')
        || name.split('/').any(|seg| seg.is_empty() || seg == "..")
    {
        warn!(%name, "rejected invalid chart name");
        return Err(AppError::BadRequest);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Application-level error type that maps cleanly to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    /// The chart exists in neither storage tier.
    NotFound,
    /// The request itself is malformed.
    BadRequest,
    /// An unexpected internal error.
    Internal(anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::NotFound => StatusCode::NOT_FOUND.into_response(),
            AppError::BadRequest => StatusCode::BAD_REQUEST.into_response(),
            AppError::Internal(err) => {
                error!(error = %err, "internal server error");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err)
    }
}
