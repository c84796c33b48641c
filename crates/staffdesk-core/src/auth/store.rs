use std::sync::Arc;

use tracing::{debug, warn};

use super::storage::TokenBackend;
use super::token;

/// Storage key for the access token
pub const ACCESS_TOKEN_KEY: &str = "access_token";

/// Storage key for the refresh token
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";

/// Owner of the persisted access/refresh token pair.
///
/// Every write to token storage goes through this type. Readers only ever
/// get tokens that pass [`token::is_valid`]. Clone is cheap and shares the
/// backend.
#[derive(Clone)]
pub struct TokenStore {
    backend: Arc<dyn TokenBackend>,
}

impl TokenStore {
    pub fn new(backend: Arc<dyn TokenBackend>) -> Self {
        Self { backend }
    }

    pub fn is_valid(token: &str) -> bool {
        token::is_valid(token)
    }

    /// Persist both tokens, or neither.
    ///
    /// Returns `false` without touching storage when either token is invalid.
    pub fn store(&self, access_token: &str, refresh_token: &str) -> bool {
        if !Self::is_valid(access_token) || !Self::is_valid(refresh_token) {
            warn!("Refusing to store malformed or expired tokens");
            return false;
        }

        let previous_access = self.read(ACCESS_TOKEN_KEY);

        if let Err(e) = self.backend.set(ACCESS_TOKEN_KEY, access_token) {
            warn!(error = %e, "Failed to persist access token");
            return false;
        }

        if let Err(e) = self.backend.set(REFRESH_TOKEN_KEY, refresh_token) {
            warn!(error = %e, "Failed to persist refresh token, rolling back access token");
            let rollback = match previous_access {
                Some(ref prev) => self.backend.set(ACCESS_TOKEN_KEY, prev),
                None => self.backend.remove(ACCESS_TOKEN_KEY),
            };
            if let Err(e) = rollback {
                warn!(error = %e, "Failed to roll back access token");
            }
            return false;
        }

        debug!("Stored token pair");
        true
    }

    /// Remove both tokens. Safe to call when nothing is stored.
    pub fn clear(&self) {
        for key in [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY] {
            if let Err(e) = self.backend.remove(key) {
                warn!(key, error = %e, "Failed to remove token");
            }
        }
        debug!("Cleared stored tokens");
    }

    /// Drop each stored token that no longer passes validation.
    pub fn cleanup_invalid(&self) {
        for key in [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY] {
            if let Some(stored) = self.read(key) {
                if !Self::is_valid(&stored) {
                    debug!(key, "Removing invalid stored token");
                    if let Err(e) = self.backend.remove(key) {
                        warn!(key, error = %e, "Failed to remove invalid token");
                    }
                }
            }
        }
    }

    pub fn current_valid_access(&self) -> Option<String> {
        self.read_valid(ACCESS_TOKEN_KEY)
    }

    pub fn current_valid_refresh(&self) -> Option<String> {
        self.read_valid(REFRESH_TOKEN_KEY)
    }

    /// Whether an access token is stored at all, valid or not.
    pub(crate) fn has_access_token(&self) -> bool {
        self.read(ACCESS_TOKEN_KEY).is_some()
    }

    fn read_valid(&self, key: &str) -> Option<String> {
        self.read(key).filter(|t| Self::is_valid(t))
    }

    /// Storage failures read as "no token".
    fn read(&self, key: &str) -> Option<String> {
        match self.backend.get(key) {
            Ok(value) => value.filter(|v| !v.is_empty()),
            Err(e) => {
                warn!(key, error = %e, "Failed to read token");
                None
            }
        }
    }
}
