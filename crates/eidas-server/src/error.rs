//! HTTP rendering of ProxyService outcomes.

use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    Json,
};
use eidas_node::ProxyServiceError;
use eidas_saml::bindings::{HttpPostBinding, SamlMessageType};
use serde::{Deserialize, Serialize};

/// JSON error body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Catalog error code.
    pub code: String,
    /// Catalog message, omitted for security violations.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// A [`ProxyServiceError`] answered over HTTP.
#[derive(Debug)]
pub struct ApiError(pub ProxyServiceError);

impl From<ProxyServiceError> for ApiError {
    fn from(err: ProxyServiceError) -> Self {
        Self(err)
    }
}

impl ApiError {
    /// HTTP status of the answer.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match &self.0 {
            ProxyServiceError::ValidationFailure { failure, .. } => {
                if failure.assertion_consumer_url.is_some() {
                    StatusCode::OK
                } else {
                    StatusCode::BAD_REQUEST
                }
            }
            ProxyServiceError::InvalidMessage { .. } => StatusCode::BAD_REQUEST,
            ProxyServiceError::SecurityViolation { .. } => StatusCode::FORBIDDEN,
            ProxyServiceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match self.0 {
            ProxyServiceError::ValidationFailure { failure, code, message, .. } => {
                match failure.assertion_consumer_url.as_deref() {
                    // The connector learns about the failure at its own endpoint.
                    Some(acs) => Html(HttpPostBinding::auto_submit_form(
                        &failure.saml_response,
                        acs,
                        failure.relay_state.as_deref(),
                        SamlMessageType::Response,
                    ))
                    .into_response(),
                    None => (status, Json(ErrorResponse { code, message: Some(message) })).into_response(),
                }
            }
            ProxyServiceError::InvalidMessage { code, message } => {
                (status, Json(ErrorResponse { code, message: Some(message) })).into_response()
            }
            ProxyServiceError::SecurityViolation { code, .. } => {
                (status, Json(ErrorResponse { code, message: None })).into_response()
            }
            ProxyServiceError::Internal { code, .. } => (
                status,
                Json(ErrorResponse {
                    code,
                    message: Some("internal error".to_string()),
                }),
            )
                .into_response(),
        }
    }
}
