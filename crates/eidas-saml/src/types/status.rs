//! SAML status of a response.

use serde::{Deserialize, Serialize};

use super::status_codes;

/// SAML protocol status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    /// Top-level status code URI.
    pub status_code: String,

    /// Optional second-level status code URI.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_status_code: Option<String>,

    /// Optional status message; failures carry the catalog code here.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_message: Option<String>,
}

impl Status {
    /// Creates a success status.
    #[must_use]
    pub fn success() -> Self {
        Self {
            status_code: status_codes::SUCCESS.to_string(),
            sub_status_code: None,
            status_message: None,
        }
    }

    /// Creates a status blaming the requester.
    #[must_use]
    pub fn requester_error(message: impl Into<String>) -> Self {
        Self {
            status_code: status_codes::REQUESTER.to_string(),
            sub_status_code: None,
            status_message: Some(message.into()),
        }
    }

    /// Creates a status blaming the responder.
    #[must_use]
    pub fn responder_error(message: impl Into<String>) -> Self {
        Self {
            status_code: status_codes::RESPONDER.to_string(),
            sub_status_code: None,
            status_message: Some(message.into()),
        }
    }

    /// Returns true if this status indicates success.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status_code == status_codes::SUCCESS
    }

    /// Sets the second-level status code.
    #[must_use]
    pub fn with_sub_status(mut self, sub_status_code: impl Into<String>) -> Self {
        self.sub_status_code = Some(sub_status_code.into());
        self
    }
}

impl Default for Status {
    fn default() -> Self {
        Self::success()
    }
}
