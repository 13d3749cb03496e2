//! Response envelopes. Errors follow RFC 7807 problem details.

use serde::{Deserialize, Serialize};

/// Successful response wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

/// RFC 7807 Problem Details, extended with a machine-readable `code`.
///
/// See: https://datatracker.ietf.org/doc/html/rfc7807
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    #[serde(rename = "type")]
    pub error_type: String,

    pub title: String,

    pub status: u16,

    /// Stable identifier the dashboard switches on, e.g. `not-found`.
    pub code: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ErrorResponse {
    pub fn new(status: u16, code: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            error_type: "about:blank".to_string(),
            title: title.into(),
            status,
            code: code.into(),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn not_found(detail: impl Into<String>) -> Self {
        Self::new(404, "not-found", "Not Found").with_detail(detail)
    }

    pub fn invalid_query(detail: impl Into<String>) -> Self {
        Self::new(400, "invalid-query", "Bad Request").with_detail(detail)
    }

    pub fn validation(detail: impl Into<String>) -> Self {
        Self::new(422, "validation", "Validation Failed").with_detail(detail)
    }

    pub fn unauthorized() -> Self {
        Self::new(401, "unauthorized", "Unauthorized")
    }

    pub fn permission_denied(detail: impl Into<String>) -> Self {
        Self::new(403, "permission-denied", "Forbidden").with_detail(detail)
    }

    pub fn unavailable() -> Self {
        Self::new(503, "unavailable", "Service Unavailable")
            .with_detail("The post store could not be reached. Please retry.")
    }
}
