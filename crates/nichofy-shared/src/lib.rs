//! # NichoFy Shared
//!
//! Wire types exchanged between the dashboard and the API server.

pub mod dto;
pub mod response;

pub use response::{ApiResponse, ErrorResponse};
