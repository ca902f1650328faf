//! ProxyService endpoint handlers.
//!
//! The validation pipeline is synchronous and CPU bound, so each request is
//! processed on the blocking thread pool.

use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Query, State},
    response::{IntoResponse, Response},
    Form, Json,
};
use eidas_node::ProxyServiceError;
use eidas_saml::{AuthenticationRequest, SpType};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::error::ApiError;
use crate::state::AppState;

/// Parameters of a connector request, as form fields or query string.
#[derive(Debug, Deserialize)]
pub struct ServiceProviderParams {
    /// Encoded SAML request.
    #[serde(rename = "SAMLRequest")]
    pub saml_request: String,
    /// Opaque state echoed back to the connector.
    #[serde(rename = "RelayState")]
    pub relay_state: Option<String>,
}

/// Summary of an accepted request.
#[derive(Debug, Serialize, Deserialize)]
pub struct AcceptedRequest {
    /// Request id.
    pub id: String,
    /// Connector entity id.
    pub issuer: String,
    /// Country of the citizen.
    pub citizen_country_code: Option<String>,
    /// Requested level of assurance.
    pub level_of_assurance: Option<String>,
    /// Sector of the service provider.
    pub sp_type: Option<SpType>,
    /// Name URIs of the requested attributes.
    pub requested_attributes: Vec<String>,
    /// Where the answer will be sent.
    pub assertion_consumer_service_url: Option<String>,
}

impl From<&AuthenticationRequest> for AcceptedRequest {
    fn from(request: &AuthenticationRequest) -> Self {
        Self {
            id: request.id.clone(),
            issuer: request.issuer.clone(),
            citizen_country_code: request.citizen_country_code.clone(),
            level_of_assurance: request.level_of_assurance().map(str::to_string),
            sp_type: request.sp_type,
            requested_attributes: request
                .requested_attributes
                .definitions()
                .map(|d| d.name_uri.clone())
                .collect(),
            assertion_consumer_service_url: request.assertion_consumer_service_url.clone(),
        }
    }
}

/// `POST /ServiceProvider`.
pub async fn service_provider_post(
    State(state): State<AppState>,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
    Form(params): Form<ServiceProviderParams>,
) -> Response {
    process(state, "POST", remote, params).await
}

/// `GET /ServiceProvider`.
pub async fn service_provider_get(
    State(state): State<AppState>,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
    Query(params): Query<ServiceProviderParams>,
) -> Response {
    process(state, "GET", remote, params).await
}

async fn process(
    state: AppState,
    http_method: &'static str,
    remote: SocketAddr,
    params: ServiceProviderParams,
) -> Response {
    let service = state.service.clone();
    let remote_ip = remote.ip().to_string();
    let outcome = tokio::task::spawn_blocking(move || {
        service.process_authentication_request(
            &params.saml_request,
            http_method,
            Some(&remote_ip),
            params.relay_state.as_deref(),
        )
    })
    .await;

    match outcome {
        Ok(Ok(request)) => Json(AcceptedRequest::from(&request)).into_response(),
        Ok(Err(e)) => ApiError(e).into_response(),
        Err(e) => {
            error!(error = %e, "validation task failed");
            ApiError(ProxyServiceError::internal(&state.catalog)).into_response()
        }
    }
}
