//! Router configuration.

use axum::{http::StatusCode, response::Json, routing::get, Router};
use serde::Serialize;
use tower_http::trace::TraceLayer;

use crate::handlers::{service_provider_get, service_provider_post};
use crate::state::AppState;

/// Creates the application router.
pub fn create_router(state: AppState) -> Router {
    let health = Router::new()
        .route("/health", get(health_check))
        .route("/health/live", get(liveness_check));

    Router::new()
        .route(
            "/ServiceProvider",
            get(service_provider_get).post(service_provider_post),
        )
        .with_state(state)
        .merge(health)
        .layer(TraceLayer::new_for_http())
}

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    version: Option<String>,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: Some(env!("CARGO_PKG_VERSION").to_string()),
    })
}

async fn liveness_check() -> StatusCode {
    StatusCode::OK
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_health_check() {
        let response = health_check().await;
        assert_eq!(response.0.status, "healthy");
    }
}
