//! REST client for the Go VV activity backend.
//!
//! The backend stores finished rides and awards points for them. No
//! authentication is involved.

pub mod client;
pub mod error;

pub use client::{ActivityClient, ApiResponse, HealthStatus, DEFAULT_API_BASE_URL, DEFAULT_PAGE_SIZE};
pub use error::ApiError;
