//! Owner identity extractor.
//!
//! The upstream auth layer resolves the session and forwards the owner as an
//! opaque string in `X-Owner-Id`. Nothing here verifies it.

use actix_web::{FromRequest, HttpRequest, dev::Payload};
use std::future::{Ready, ready};

use nichofy_core::DomainError;

use super::error::AppError;

/// Header carrying the owner identity.
pub static OWNER_HEADER: &str = "X-Owner-Id";

/// The owner every post operation in a request is scoped to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Owner(pub String);

impl Owner {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromRequest for Owner {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let owner = req
            .headers()
            .get(OWNER_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(|value| Owner(value.to_string()))
            .ok_or_else(|| AppError::from(DomainError::Unauthorized));

        ready(owner)
    }
}
