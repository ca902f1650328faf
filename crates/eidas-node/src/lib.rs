//! # eidas-node
//!
//! ProxyService core of an eIDAS node.
//!
//! - [`pipeline`] - validation of incoming connector requests
//! - [`consent`] - citizen consent and attribute completeness
//! - [`response`] - signed success and failure responses
//! - [`loa`] - level of assurance comparison
//! - [`service`] - the [`ProxyService`] tying them to the correlation and
//!   replay stores
//!
//! Every operation is synchronous and CPU bound; callers on an async runtime
//! run it on a blocking thread.
//!
//! ## Example
//!
//! ```rust,ignore
//! use eidas_node::{ProxyService, ProxyServiceError};
//!
//! match service.process_authentication_request(&saml_request, "POST", Some(ip), relay_state) {
//!     Ok(request) => forward(request),
//!     Err(ProxyServiceError::ValidationFailure { failure, .. }) => post_back(*failure),
//!     Err(other) => reject(other),
//! }
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod consent;
pub mod error;
pub mod loa;
pub mod pipeline;
pub mod response;
pub mod service;

#[cfg(test)]
mod test_support;

pub use consent::{
    build_consent, check_mandatory_attribute_set, check_mandatory_attributes, filter_consented,
    CitizenConsent,
};
pub use error::{FailureResponse, ProxyServiceError, ProxyServiceResult, SignedResponse};
pub use pipeline::{EidasAcceptancePolicy, RequestAcceptancePolicy, RequestValidator};
pub use response::{FailureStatus, Rejection, ResponseAssembler};
pub use service::{ProxyService, StoredAuthenticationRequest};
