//! Authentication module for managing tokens and the user session.
//!
//! This module provides:
//! - `TokenStore`: the single owner of the persisted access/refresh pair
//! - `TokenBackend`: where tokens live (OS keyring, a JSON file, or memory)
//! - `AuthSession`: the process-wide session state machine
//!
//! Tokens are JWTs; only their payload is inspected locally, for expiry.

pub mod session;
pub mod storage;
pub mod store;
pub mod token;

pub use session::{AuthSession, SessionError, SessionState, SessionStatus};
pub use storage::{FileBackend, KeyringBackend, MemoryBackend, TokenBackend};
pub use store::{TokenStore, ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY};
