use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::api::AppState;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub payroll: HealthCheck,
    pub checked_at: String,
}

pub fn router(state: AppState) -> Router {
    Router::new().route("/health", get(health)).with_state(state)
}

pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let payroll = payroll_check(&state).await;
    let ready = payroll.status == "ready";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck {
            status: "ready",
            detail: format!("paydesk-server serving {} employees", state.roster().len()),
        },
        payroll,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

async fn payroll_check(state: &AppState) -> HealthCheck {
    match state.projector().ensure_current().await {
        Ok(projection) if projection.is_consistent() => HealthCheck {
            status: "ready",
            detail: format!("projection current at generation {}", projection.generation()),
        },
        Ok(projection) => HealthCheck {
            status: "ready",
            detail: format!(
                "projection current at generation {} with {} reported inconsistencies",
                projection.generation(),
                projection.issues().len()
            ),
        },
        Err(error) => {
            HealthCheck { status: "degraded", detail: format!("payroll computation failed: {error}") }
        }
    }
}
