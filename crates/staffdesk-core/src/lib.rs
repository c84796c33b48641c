//! Client core for the staffdesk employee-management backend.
//!
//! - [`auth`]: JWT token storage and the process-wide auth session
//! - [`api`]: the authenticated HTTP client and typed endpoint wrappers
//! - [`cache`]: deduplicating, revalidating request cache
//! - [`models`]: wire types for companies, departments, employees and users
//! - [`context`]: wiring of all of the above from a [`Config`]

pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod context;
pub mod models;

pub use api::{ApiClient, ApiError, ErrorCategory, RequestOptions, RequestOutcome};
pub use auth::{AuthSession, SessionError, SessionState, SessionStatus, TokenStore};
pub use cache::{CacheEvent, FetchCache, RevalidationPolicy, Subscription};
pub use config::{Config, TokenStorage};
pub use context::AppContext;
