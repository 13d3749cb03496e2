//! # NichoFy Core
//!
//! The domain layer of the NichoFy post library.
//! Posts, the query vocabulary used to list them, and the document store port.
//! No infrastructure lives here.

pub mod domain;
pub mod error;
pub mod ports;

pub use error::{DomainError, RepoError};
