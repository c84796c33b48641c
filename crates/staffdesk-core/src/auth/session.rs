//! Process-wide authentication state.
//!
//! `AuthSession` owns the session state machine:
//!
//! ```text
//! Uninitialized --initialize--> Anonymous | Authenticated
//! Anonymous --login--> Authenticated --logout / 401--> Anonymous
//! ```
//!
//! `loading` is true only until the initial check has finished. Readers get
//! snapshots through [`AuthSession::state`] or follow changes through
//! [`AuthSession::subscribe`].

use thiserror::Error;
use tokio::sync::{watch, OnceCell};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::api::{ApiClient, ApiError, ErrorCategory};
use crate::models::{LoginCredentials, ProfileUpdate, Registration, UserProfile};

use super::TokenStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// The initial check has not produced a verdict yet
    Uninitialized,
    Anonymous,
    Authenticated,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    pub status: SessionStatus,
    pub user: Option<UserProfile>,
    pub loading: bool,
    /// Why the last auth check reached no verdict. Cleared once one does.
    pub last_error: Option<SessionError>,
}

impl SessionState {
    fn initial() -> Self {
        Self {
            status: SessionStatus::Uninitialized,
            user: None,
            loading: true,
            last_error: None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.status == SessionStatus::Authenticated
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SessionError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid token received from server")]
    InvalidTokens,
}

impl SessionError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            SessionError::Api(e) => e.category(),
            SessionError::InvalidCredentials | SessionError::InvalidTokens => ErrorCategory::Login,
        }
    }
}

pub struct AuthSession {
    api: ApiClient,
    state: watch::Sender<SessionState>,
    init: OnceCell<()>,
}

impl AuthSession {
    pub fn new(api: ApiClient) -> Self {
        let (state, _) = watch::channel(SessionState::initial());
        Self {
            api,
            state,
            init: OnceCell::new(),
        }
    }

    fn tokens(&self) -> &TokenStore {
        self.api.tokens()
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Follow state changes. Dropping the receiver unsubscribes.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated()
    }

    pub fn user(&self) -> Option<UserProfile> {
        self.state.borrow().user.clone()
    }

    /// Succeed only for an authenticated session. While the startup check
    /// is still undecided its failure is returned, so an outage reads as
    /// something to retry rather than a missing login.
    pub fn require_authenticated(&self) -> Result<(), SessionError> {
        let state = self.state.borrow();
        match (state.status, &state.last_error) {
            (SessionStatus::Authenticated, _) => Ok(()),
            (SessionStatus::Uninitialized, Some(err)) => Err(err.clone()),
            _ => Err(ApiError::AuthenticationRequired.into()),
        }
    }

    fn set_authenticated(&self, user: Option<UserProfile>) {
        self.state.send_modify(|state| {
            state.status = SessionStatus::Authenticated;
            state.user = user;
            state.last_error = None;
        });
    }

    fn set_anonymous(&self) {
        self.state.send_modify(|state| {
            state.status = SessionStatus::Anonymous;
            state.user = None;
            state.last_error = None;
        });
    }

    /// The stored credential was rejected: drop tokens and the user.
    pub(crate) fn invalidate(&self) {
        self.tokens().clear();
        self.set_anonymous();
        info!("Session invalidated");
    }

    /// Run the startup check. Only the first call does any work; concurrent
    /// and later callers wait for it and get the resulting state.
    pub async fn initialize(&self) -> SessionState {
        self.init
            .get_or_init(|| async {
                self.tokens().cleanup_invalid();

                if self.tokens().current_valid_access().is_none() {
                    debug!("No stored access token, starting anonymous");
                    self.set_anonymous();
                } else if let Err(e) = self.check_auth_status().await {
                    debug!(error = %e, "Initial profile check did not authenticate");
                }

                self.state.send_modify(|state| state.loading = false);
            })
            .await;
        self.state()
    }

    /// Re-verify the stored access token against the profile endpoint.
    ///
    /// Only an authentication rejection ends the session; network and server
    /// failures leave state and tokens as they were.
    pub async fn check_auth_status(&self) -> Result<UserProfile, SessionError> {
        if self.tokens().current_valid_access().is_none() {
            self.invalidate();
            return Err(ApiError::AuthenticationRequired.into());
        }

        match self.api.fetch_profile().await {
            Ok(user) => {
                info!(user = %user.display_name(), "Session authenticated");
                self.set_authenticated(Some(user.clone()));
                Ok(user)
            }
            Err(ApiError::AuthenticationRequired) => {
                self.invalidate();
                Err(ApiError::AuthenticationRequired.into())
            }
            Err(e) => {
                warn!(error = %e, "Auth check failed, keeping current session");
                let err = SessionError::from(e);
                self.state.send_modify(|state| state.last_error = Some(err.clone()));
                Err(err)
            }
        }
    }

    pub async fn login(&self, credentials: &LoginCredentials) -> Result<UserProfile, SessionError> {
        let response = match self.api.login(credentials).await {
            Ok(response) => response,
            Err(ApiError::AuthenticationRequired) => {
                error!(email = %credentials.email, "Login failed: invalid credentials");
                return Err(SessionError::InvalidCredentials);
            }
            Err(e) => {
                error!(email = %credentials.email, error = %e, "Login failed");
                return Err(e.into());
            }
        };

        if !self.tokens().store(&response.access_token, &response.refresh_token) {
            error!("Login failed: server returned unusable tokens");
            return Err(SessionError::InvalidTokens);
        }

        let user = match response.user {
            Some(user) => user,
            None => match self.api.fetch_profile().await {
                Ok(user) => user,
                Err(e) => {
                    warn!(error = %e, "Login succeeded but profile fetch failed");
                    UserProfile::default()
                }
            },
        };

        info!(user = %user.display_name(), "Login successful");
        self.set_authenticated(Some(user.clone()));
        Ok(user)
    }

    /// Create an account. Registering does not sign the user in.
    pub async fn register(&self, registration: &Registration) -> Result<UserProfile, SessionError> {
        match self.api.register(registration).await {
            Ok(user) => {
                info!(email = %registration.email, "Registration successful");
                Ok(user)
            }
            Err(e) => {
                error!(email = %registration.email, error = %e, "Registration failed");
                Err(e.into())
            }
        }
    }

    /// End the session.
    ///
    /// Tokens are cleared and the state becomes anonymous immediately. When a
    /// valid refresh token was held, the backend is told in a background task
    /// whose handle is returned; its failure is only logged. Must be called
    /// from within a tokio runtime.
    pub fn logout(&self) -> Option<JoinHandle<()>> {
        let refresh = self.tokens().current_valid_refresh();
        let access = self.tokens().current_valid_access();

        self.tokens().clear();
        self.set_anonymous();
        info!("Logged out");

        let refresh = refresh?;
        let api = self.api.clone();
        Some(tokio::spawn(async move {
            match api.notify_logout(access.as_deref(), &refresh).await {
                Ok(_) => debug!("Backend acknowledged logout"),
                Err(e) => warn!(error = %e, "Logout notification failed"),
            }
        }))
    }

    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<UserProfile, SessionError> {
        match self.api.update_profile(update).await {
            Ok(user) => {
                self.state.send_modify(|state| state.user = Some(user.clone()));
                info!("Profile updated");
                Ok(user)
            }
            Err(ApiError::AuthenticationRequired) => {
                error!("Profile update rejected: not authenticated");
                self.invalidate();
                Err(ApiError::AuthenticationRequired.into())
            }
            Err(e) => {
                error!(error = %e, "Profile update failed");
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::auth::storage::{MemoryBackend, TokenBackend};
    use crate::auth::token::test_tokens::{expired, valid};
    use crate::auth::{ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY};
    use mockito::{Matcher, Server};
    use serde_json::json;

    const PROFILE: &str = r#"{"id": 1, "email": "ada@example.com", "username": "ada",
        "first_name": "Ada", "last_name": "Lovelace", "role": "admin", "is_active": true}"#;

    fn session_for(url: &str) -> (AuthSession, Arc<MemoryBackend>) {
        let backend = Arc::new(MemoryBackend::new());
        let tokens = TokenStore::new(backend.clone());
        let api = ApiClient::new(url, Duration::from_secs(5), tokens).unwrap();
        (AuthSession::new(api), backend)
    }

    #[tokio::test]
    async fn test_starts_loading_and_uninitialized() {
        let (session, _) = session_for("http://127.0.0.1:1");
        let state = session.state();
        assert_eq!(state.status, SessionStatus::Uninitialized);
        assert!(state.loading);
        assert!(!state.is_authenticated());
    }

    #[tokio::test]
    async fn test_initialize_with_valid_token_authenticates() {
        let mut server = Server::new_async().await;
        let access = valid(1);
        let m = server
            .mock("GET", "/auth/profile/")
            .match_header("authorization", format!("Bearer {}", access).as_str())
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(PROFILE)
            .expect(1)
            .create_async()
            .await;

        let (session, backend) = session_for(&server.url());
        backend.set(ACCESS_TOKEN_KEY, &access).unwrap();
        backend.set(REFRESH_TOKEN_KEY, &valid(1)).unwrap();

        let state = session.initialize().await;
        // A second call does not repeat the check
        session.initialize().await;

        m.assert_async().await;
        assert_eq!(state.status, SessionStatus::Authenticated);
        assert!(!state.loading);
        assert_eq!(state.user.unwrap().display_name(), "Ada Lovelace");
    }

    #[tokio::test]
    async fn test_initialize_with_expired_token_skips_profile_fetch() {
        let mut server = Server::new_async().await;
        let m = server
            .mock("GET", Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let (session, backend) = session_for(&server.url());
        backend.set(ACCESS_TOKEN_KEY, &expired(1)).unwrap();

        let state = session.initialize().await;
        m.assert_async().await;
        assert_eq!(state.status, SessionStatus::Anonymous);
        assert!(!state.loading);
        assert_eq!(backend.get(ACCESS_TOKEN_KEY).unwrap(), None);
    }

    #[tokio::test]
    async fn test_initialize_keeps_token_on_server_error() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/auth/profile/")
            .with_status(503)
            .create_async()
            .await;

        let (session, backend) = session_for(&server.url());
        let access = valid(1);
        backend.set(ACCESS_TOKEN_KEY, &access).unwrap();

        let state = session.initialize().await;
        assert_eq!(state.status, SessionStatus::Uninitialized);
        assert!(!state.loading);
        assert_eq!(backend.get(ACCESS_TOKEN_KEY).unwrap(), Some(access));
        assert_eq!(
            state.last_error,
            Some(SessionError::Api(ApiError::ServerError(503)))
        );

        let err = session.require_authenticated().unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Retry);
    }

    #[tokio::test]
    async fn test_successful_recheck_clears_last_error() {
        let mut server = Server::new_async().await;
        let outage = server
            .mock("GET", "/auth/profile/")
            .with_status(502)
            .create_async()
            .await;

        let (session, backend) = session_for(&server.url());
        backend.set(ACCESS_TOKEN_KEY, &valid(1)).unwrap();
        session.initialize().await;
        assert!(session.state().last_error.is_some());
        outage.remove_async().await;

        let _m = server
            .mock("GET", "/auth/profile/")
            .with_status(200)
            .with_body(PROFILE)
            .create_async()
            .await;

        session.check_auth_status().await.unwrap();
        let state = session.state();
        assert!(state.is_authenticated());
        assert_eq!(state.last_error, None);
        assert!(session.require_authenticated().is_ok());
    }

    #[tokio::test]
    async fn test_anonymous_session_requires_login() {
        let server = Server::new_async().await;
        let (session, _backend) = session_for(&server.url());
        session.initialize().await;

        let err = session.require_authenticated().unwrap_err();
        assert_eq!(err, SessionError::Api(ApiError::AuthenticationRequired));
        assert_eq!(err.category(), ErrorCategory::Login);
    }

    #[tokio::test]
    async fn test_initialize_rejected_token_goes_anonymous() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/auth/profile/")
            .with_status(401)
            .create_async()
            .await;

        let (session, backend) = session_for(&server.url());
        backend.set(ACCESS_TOKEN_KEY, &valid(1)).unwrap();
        backend.set(REFRESH_TOKEN_KEY, &valid(1)).unwrap();

        let state = session.initialize().await;
        assert_eq!(state.status, SessionStatus::Anonymous);
        assert_eq!(backend.get(REFRESH_TOKEN_KEY).unwrap(), None);
    }

    #[tokio::test]
    async fn test_login_rejected_stores_nothing() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("POST", "/auth/login/")
            .with_status(401)
            .with_header("content-type", "application/json")
            .with_body(r#"{"error": "Invalid credentials"}"#)
            .create_async()
            .await;

        let (session, _) = session_for(&server.url());
        session.initialize().await;

        let result = session
            .login(&LoginCredentials {
                email: "ada@example.com".to_string(),
                password: "wrong".to_string(),
            })
            .await;

        assert_eq!(result, Err(SessionError::InvalidCredentials));
        assert!(!session.is_authenticated());
        assert_eq!(session.tokens().current_valid_access(), None);
    }

    #[tokio::test]
    async fn test_login_with_malformed_tokens_fails() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("POST", "/auth/login/")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "access_token": "not-a-jwt",
                    "refresh_token": valid(1),
                    "user": serde_json::from_str::<serde_json::Value>(PROFILE).unwrap(),
                })
                .to_string(),
            )
            .create_async()
            .await;

        let (session, backend) = session_for(&server.url());
        let result = session
            .login(&LoginCredentials {
                email: "ada@example.com".to_string(),
                password: "pw".to_string(),
            })
            .await;

        assert_eq!(result, Err(SessionError::InvalidTokens));
        assert_eq!(result.unwrap_err().to_string(), "Invalid token received from server");
        assert!(!session.is_authenticated());
        assert_eq!(backend.get(REFRESH_TOKEN_KEY).unwrap(), None);
    }

    #[tokio::test]
    async fn test_subscribers_see_transitions() {
        let (session, _) = session_for("http://127.0.0.1:1");
        let mut rx = session.subscribe();

        session.initialize().await;
        assert!(rx.has_changed().unwrap());
        let state = rx.borrow_and_update().clone();
        assert_eq!(state.status, SessionStatus::Anonymous);
        assert!(!state.loading);
    }

    #[tokio::test]
    async fn test_update_profile_replaces_user_only_on_success() {
        let mut server = Server::new_async().await;
        let access = valid(1);
        let _profile = server
            .mock("GET", "/auth/profile/")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(PROFILE)
            .create_async()
            .await;
        let update_ok = server
            .mock("PUT", "/auth/profile/update/")
            .match_body(Matcher::Json(json!({"first_name": "Augusta"})))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(PROFILE.replace("\"Ada\"", "\"Augusta\""))
            .expect(1)
            .create_async()
            .await;

        let (session, backend) = session_for(&server.url());
        backend.set(ACCESS_TOKEN_KEY, &access).unwrap();
        session.initialize().await;

        let update = ProfileUpdate {
            first_name: Some("Augusta".to_string()),
            ..Default::default()
        };
        let user = session.update_profile(&update).await.unwrap();
        update_ok.assert_async().await;
        assert_eq!(user.display_name(), "Augusta Lovelace");
        assert!(session.is_authenticated());

        let _update_fail = server
            .mock("PUT", "/auth/profile/update/")
            .match_body(Matcher::Json(json!({"email": "bad"})))
            .with_status(400)
            .with_header("content-type", "application/json")
            .with_body(r#"{"email": ["Enter a valid email address."]}"#)
            .create_async()
            .await;

        let bad = ProfileUpdate {
            email: Some("bad".to_string()),
            ..Default::default()
        };
        let err = session.update_profile(&bad).await.unwrap_err();
        assert_eq!(err.to_string(), "email: Enter a valid email address.");
        assert_eq!(session.user().unwrap().display_name(), "Augusta Lovelace");
        assert!(session.is_authenticated());
    }

    #[tokio::test]
    async fn test_logout_without_refresh_token_skips_notify() {
        let mut server = Server::new_async().await;
        let m = server.mock("POST", Matcher::Any).expect(0).create_async().await;

        let (session, backend) = session_for(&server.url());
        backend.set(ACCESS_TOKEN_KEY, &valid(1)).unwrap();
        backend.set(REFRESH_TOKEN_KEY, &expired(1)).unwrap();

        assert!(session.logout().is_none());
        m.assert_async().await;
        assert_eq!(session.state().status, SessionStatus::Anonymous);
        assert_eq!(backend.get(ACCESS_TOKEN_KEY).unwrap(), None);
    }

    #[tokio::test]
    async fn test_logout_notify_failure_is_swallowed() {
        let mut server = Server::new_async().await;
        let m = server
            .mock("POST", "/auth/logout/")
            .with_status(500)
            .expect(1)
            .create_async()
            .await;

        let (session, backend) = session_for(&server.url());
        backend.set(ACCESS_TOKEN_KEY, &valid(1)).unwrap();
        backend.set(REFRESH_TOKEN_KEY, &valid(1)).unwrap();

        let handle = session.logout().expect("notify task");
        handle.await.unwrap();
        m.assert_async().await;
        assert_eq!(session.state().status, SessionStatus::Anonymous);
        assert_eq!(backend.get(REFRESH_TOKEN_KEY).unwrap(), None);
    }
}
