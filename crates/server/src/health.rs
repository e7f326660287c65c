use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::bootstrap::AppState;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub dataset: HealthCheck,
    pub recommendations: HealthCheck,
    pub checked_at: String,
}

pub fn router(state: AppState) -> Router {
    Router::new().route("/health", get(health)).with_state(state)
}

/// Always `200`: an empty store or a missing credential are normal states.
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let dataset = match state.store.latest() {
        Some(table) => HealthCheck {
            status: "loaded",
            detail: format!("{} rows from run {}", table.len(), table.correlation_id),
        },
        None => HealthCheck { status: "empty", detail: "no file processed yet".to_string() },
    };

    let recommendations = if state.config.llm.credential().is_some() {
        HealthCheck { status: "llm", detail: format!("model {}", state.config.llm.model) }
    } else {
        HealthCheck { status: "rule_based", detail: "no LLM credential configured".to_string() }
    };

    let payload = HealthResponse {
        status: "ready",
        service: HealthCheck {
            status: "ready",
            detail: "pricepromo-server runtime initialized".to_string(),
        },
        dataset,
        recommendations,
        checked_at: Utc::now().to_rfc3339(),
    };

    (StatusCode::OK, Json(payload))
}
