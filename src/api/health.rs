// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::state::AppState;

/// Health check response with individual component status.
#[derive(Debug, Serialize, ToSchema)]
pub struct ReadyResponse {
    /// Overall health status ("ok" or "degraded").
    pub status: String,
    /// Individual health checks and their results.
    pub checks: HealthChecks,
}

/// Individual health check results.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthChecks {
    /// Whether the service process is running.
    pub service: String,
    /// Platform database: a read transaction can be opened.
    pub database: String,
    /// Media root exists and is a directory.
    pub media: String,
    /// Mails accepted by the transport since startup.
    pub mail_delivered: u64,
    /// Mails dropped or given up on since startup. Informational only.
    pub mail_failed: u64,
}

/// Simple health check response for liveness probes.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
}

fn outcome<E: std::fmt::Display>(component: &str, result: Result<(), E>) -> String {
    match result {
        Ok(()) => "ok".to_string(),
        Err(e) => {
            tracing::warn!(component, error = %e, "Health check failed");
            "unavailable".to_string()
        }
    }
}

/// Health check endpoint handler.
///
/// Returns 200 if all checks pass, 503 if any check fails.
#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service is healthy", body = ReadyResponse),
        (status = 503, description = "Service is unhealthy", body = ReadyResponse)
    )
)]
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<ReadyResponse>) {
    let database = outcome("database", state.db.health_check());
    let media = outcome("media", state.media.health_check().await);
    let all_ok = database == "ok" && media == "ok";

    let response = ReadyResponse {
        status: if all_ok { "ok" } else { "degraded" }.to_string(),
        checks: HealthChecks {
            service: "ok".to_string(),
            database,
            media,
            mail_delivered: state.mail.delivered_count(),
            mail_failed: state.mail.failed_count(),
        },
    };

    let status = if all_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, Json(response))
}

/// Liveness probe handler.
///
/// Always returns 200 if the process is running.
#[utoipa::path(
    get,
    path = "/health/live",
    tag = "Health",
    responses(
        (status = 200, description = "Service is alive", body = HealthResponse)
    )
)]
pub async fn liveness() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// Readiness probe handler.
///
/// Returns 200 only if the database and media root are usable.
#[utoipa::path(
    get,
    path = "/health/ready",
    tag = "Health",
    responses(
        (status = 200, description = "Service is ready", body = ReadyResponse),
        (status = 503, description = "Service is not ready", body = ReadyResponse)
    )
)]
pub async fn readiness(state: State<AppState>) -> (StatusCode, Json<ReadyResponse>) {
    health(state).await
}

#[cfg(test)]
mod tests {
    use crate::api::test_support::{get, send};
    use crate::state::test_support::test_app;
    use axum::http::StatusCode;

    #[tokio::test]
    async fn ready_when_database_and_media_are_usable() {
        let app = test_app().await;
        let (status, _, body) = send(&app, get("/health/ready", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["checks"]["database"], "ok");
        assert_eq!(body["checks"]["media"], "ok");
        assert_eq!(body["checks"]["mail_delivered"], 0);
        assert_eq!(body["checks"]["mail_failed"], 0);
    }

    #[tokio::test]
    async fn mail_counters_follow_dispatcher() {
        let app = test_app().await;
        app.state.mail.enqueue(crate::mail::templates::otp_mail("a@x.com", "123456", 5));
        for _ in 0..200 {
            if app.state.mail.delivered_count() == 1 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }

        let (status, _, body) = send(&app, get("/health", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["checks"]["mail_delivered"], 1);
        assert_eq!(body["checks"]["mail_failed"], 0);
    }

    #[tokio::test]
    async fn missing_media_root_degrades_readiness() {
        let app = test_app().await;
        std::fs::remove_dir_all(app.state.media.root()).unwrap();

        let (status, _, body) = send(&app, get("/health", None)).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["status"], "degraded");
        assert_eq!(body["checks"]["media"], "unavailable");

        let (status, _, body) = send(&app, get("/health/live", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }
}
