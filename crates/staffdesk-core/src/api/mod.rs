//! REST API client module for the staffdesk backend.
//!
//! This module provides the `ApiClient` for communicating with the
//! employee-management API: authentication, companies, departments,
//! employees and their statistics.
//!
//! The API uses JWT bearer token authentication. Tokens are read from the
//! `TokenStore` on every call; a 401 clears them.

pub mod client;
pub mod endpoints;
pub mod error;

pub use client::{ApiClient, RequestOptions, RequestOutcome};
pub use error::{ApiError, ErrorCategory};
