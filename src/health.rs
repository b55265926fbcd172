use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use crate::config::Config;
use crate::storage::RemoteStore;

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub checks: HealthChecks,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Ok,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Serialize)]
pub struct HealthChecks {
    pub disk: CheckResult,
    pub remote: CheckResult,
}

#[derive(Debug, Serialize)]
pub struct CheckResult {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl CheckResult {
    fn healthy() -> Self {
        Self {
            ok: true,
            detail: None,
        }
    }

    fn healthy_with(detail: impl Into<String>) -> Self {
        Self {
            ok: true,
            detail: Some(detail.into()),
        }
    }

    fn unhealthy(detail: impl Into<String>) -> Self {
        Self {
            ok: false,
            detail: Some(detail.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Shared state expected by the handler
// ---------------------------------------------------------------------------

/// Minimal subset of `AppState` required by the health-check handler.
#[derive(Clone)]
pub struct HealthState {
    pub config: Arc<Config>,
    pub remote: Option<Arc<dyn RemoteStore>>,
}

// ---------------------------------------------------------------------------
// Individual checks
// ---------------------------------------------------------------------------

async fn check_disk(config: &Config) -> CheckResult {
    match tokio::fs::metadata(&config.repo.path).await {
        Ok(meta) if meta.is_dir() => CheckResult::healthy(),
        Ok(_) => CheckResult::unhealthy(format!(
            "chart path {} exists but is not a directory",
            config.repo.path
        )),
        Err(e) => CheckResult::unhealthy(format!(
            "chart directory {} unavailable: {e}",
            config.repo.path
        )),
    }
}

async fn check_remote(remote: Option<&Arc<dyn RemoteStore>>) -> CheckResult {
    let Some(remote) = remote else {
        return CheckResult::healthy_with("mirroring disabled");
    };

    // Probe the bucket through a metadata lookup; a missing object is a
    // healthy answer, a transport error is not.
    match remote.fingerprint("index.yaml").await {
        Ok(_) => CheckResult::healthy(),
        Err(e) => CheckResult::unhealthy(format!("remote store unreachable: {e}")),
    }
}

// ---------------------------------------------------------------------------
// Aggregate status
// ---------------------------------------------------------------------------

fn aggregate_status(checks: &HealthChecks) -> HealthStatus {
    if checks.disk.ok && checks.remote.ok {
        HealthStatus::Ok
    } else if !checks.disk.ok {
        // Without the chart directory nothing can be served.
        HealthStatus::Unhealthy
    } else {
        // Remote outages degrade reads to refresh attempts but the server
        // keeps running.
        HealthStatus::Degraded
    }
}

// ---------------------------------------------------------------------------
// Axum handler
// ---------------------------------------------------------------------------

/// `GET /healthz` handler.  Returns 200 on Ok/Degraded, 503 on Unhealthy.
pub async fn health_handler(State(state): State<HealthState>) -> impl IntoResponse {
    let (disk, remote) = tokio::join!(
        check_disk(&state.config),
        check_remote(state.remote.as_ref()),
    );

    let checks = HealthChecks { disk, remote };
    let status = aggregate_status(&checks);
    let body = HealthResponse { status, checks };

    let http_status = match status {
        HealthStatus::Ok | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (http_status, Json(body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disk_failure_is_unhealthy() {
        let checks = HealthChecks {
            disk: CheckResult::unhealthy("gone"),
            remote: CheckResult::healthy(),
        };
        assert_eq!(aggregate_status(&checks), HealthStatus::Unhealthy);
    }

    #[test]
    fn remote_failure_only_degrades() {
        let checks = HealthChecks {
            disk: CheckResult::healthy(),
            remote: CheckResult::unhealthy("timeout"),
        };
        assert_eq!(aggregate_status(&checks), HealthStatus::Degraded);
    }

    #[test]
    fn all_ok_is_ok() {
        let checks = HealthChecks {
            disk: CheckResult::healthy(),
            remote: CheckResult::healthy_with("mirroring disabled"),
        };
        assert_eq!(aggregate_status(&checks), HealthStatus::Ok);
    }
}
