//! Health check handlers

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use std::future::Future;
use std::time::Instant;

use crate::AppState;
use msaboard_common::errors::Result;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(Serialize)]
pub struct ReadyResponse {
    pub status: String,
    pub checks: HealthChecks,
}

#[derive(Serialize)]
pub struct HealthChecks {
    pub store: CheckResult,
    pub cache: CheckResult,
}

#[derive(Serialize)]
pub struct CheckResult {
    pub status: String,
    pub backend: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CheckResult {
    fn is_up(&self) -> bool {
        self.status == "up"
    }
}

/// Liveness probe - always returns healthy if server is running
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
    })
}

/// Readiness probe - checks the document store and the query cache
pub async fn ready(State(state): State<AppState>) -> (StatusCode, Json<ReadyResponse>) {
    let service = &state.service;

    let store = check(service.store().name(), service.store().ping()).await;
    let cache = check(service.cache().name(), service.cache().ping()).await;

    let all_healthy = store.is_up() && cache.is_up();
    let status = if all_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(ReadyResponse {
            status: if all_healthy { "ready" } else { "not_ready" }.to_string(),
            checks: HealthChecks { store, cache },
        }),
    )
}

async fn check(backend: &str, probe: impl Future<Output = Result<()>>) -> CheckResult {
    let start = Instant::now();

    match probe.await {
        Ok(()) => CheckResult {
            status: "up".to_string(),
            backend: backend.to_string(),
            latency_ms: Some(start.elapsed().as_millis() as u64),
            error: None,
        },
        Err(e) => {
            tracing::warn!(backend, error = %e, "Readiness check failed");
            CheckResult {
                status: "down".to_string(),
                backend: backend.to_string(),
                latency_ms: None,
                error: Some(e.to_string()),
            }
        }
    }
}
