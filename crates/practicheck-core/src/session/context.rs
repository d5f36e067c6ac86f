//! The auth context: single owner of the current session.
//!
//! `AuthContext` composes the token store, the request wrapper and the idle
//! timer. It is an ordinary value handed to whatever drives the UI; there is
//! no global. At most one session exists per context.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::clock::Clock;
use super::timer::{IdleTimer, TimeoutPolicy, TimerError, TimerEvent, TimerState};
use crate::api::{ApiClient, ApiError, AuthApi, DashboardApi, LoginResult, RequestOptions};
use crate::auth::{StoredSession, TokenStore};
use crate::models::{LoginCredentials, Route, User};

/// Shown when a login fails without a message from the server
const DEFAULT_INVALID_CREDENTIALS: &str = "Invalid credentials";

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    InvalidCredentials(String),

    #[error("A new password must be set before signing in")]
    PasswordChangeRequired,

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Not logged in")]
    NoSession,

    #[error(transparent)]
    Timer(#[from] TimerError),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl AuthError {
    fn from_login_failure(err: ApiError) -> Self {
        match err {
            ApiError::InvalidRequest(msg) => AuthError::Validation(msg),
            ApiError::Storage(msg) => AuthError::Storage(msg),
            ApiError::ServiceUnavailable(msg) => AuthError::ServiceUnavailable(msg),
            e @ ApiError::InvalidResponse(_) => AuthError::ServiceUnavailable(e.to_string()),
            ApiError::Server { message, .. } => AuthError::ServiceUnavailable(message),
            ref e => AuthError::InvalidCredentials(
                e.server_message()
                    .unwrap_or(DEFAULT_INVALID_CREDENTIALS)
                    .to_string(),
            ),
        }
    }

    /// The string to put in front of the user.
    pub fn user_message(&self) -> String {
        match self {
            AuthError::ServiceUnavailable(_) => "Service unavailable. Please try again.".to_string(),
            AuthError::Timer(TimerError::Expired) => {
                "Your session has expired. Please log in again.".to_string()
            }
            other => other.to_string(),
        }
    }
}

/// A live session: the stored token and user plus when it will expire.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub token: String,
    pub user: User,
    pub expires_at: DateTime<Utc>,
}

/// What `tick` observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Show the timeout prompt with this many seconds on the countdown
    WarningStarted { remaining_secs: u64 },
    /// Idle limit reached; the session has been logged out
    Expired,
}

pub struct AuthContext {
    store: TokenStore,
    auth_api: AuthApi,
    api: ApiClient,
    policy: TimeoutPolicy,
    clock: Arc<dyn Clock>,
    current: Option<StoredSession>,
    timer: Option<IdleTimer>,
    route: Route,
    epoch: u64,
}

impl AuthContext {
    /// `api` is the client for authenticated dashboard calls; both it and
    /// `auth_api` should share `store`.
    pub fn new(
        store: TokenStore,
        auth_api: AuthApi,
        api: ApiClient,
        policy: TimeoutPolicy,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            auth_api,
            api,
            policy,
            clock,
            current: None,
            timer: None,
            route: Route::Landing,
            epoch: 0,
        }
    }

    // =========================================================================
    // Session lifecycle
    // =========================================================================

    /// Pick up a session persisted by an earlier run. The idle timer starts
    /// fresh from now.
    pub fn restore(&mut self) -> Result<Option<Session>, AuthError> {
        let stored = self
            .store
            .load()
            .map_err(|e| AuthError::Storage(format!("{:#}", e)))?;

        match stored {
            Some(stored) => {
                info!(user_id = %stored.user.id, role = %stored.user.role, "Restored stored session");
                self.route = Route::Dashboard(stored.user.role.clone());
                self.begin(stored);
                Ok(self.session())
            }
            None => {
                debug!("No stored session");
                Ok(None)
            }
        }
    }

    pub async fn login(&mut self, credentials: LoginCredentials) -> Result<Session, AuthError> {
        credentials.validate().map_err(AuthError::Validation)?;

        let result = match self.auth_api.login(&credentials).await {
            Ok(result) => result,
            Err(e) => {
                warn!(role = %credentials.role, error = %e, "Login failed");
                return Err(AuthError::from_login_failure(e));
            }
        };

        let response = match result {
            LoginResult::Authenticated(response) => response,
            LoginResult::PasswordChangeRequired => return Err(AuthError::PasswordChangeRequired),
        };

        self.store
            .save(&response.access_token, &response.user)
            .map_err(|e| AuthError::Storage(format!("{:#}", e)))?;

        info!(user_id = %response.user.id, role = %response.user.role, "Login successful");
        self.route = Route::Dashboard(response.user.role.clone());
        self.begin(StoredSession {
            token: response.access_token,
            user: response.user,
        });

        self.session().ok_or(AuthError::NoSession)
    }

    fn begin(&mut self, stored: StoredSession) {
        self.current = Some(stored);
        self.timer = Some(IdleTimer::new(self.policy, self.clock.now()));
        self.epoch += 1;
    }

    /// Clear the stored session, drop the timer and go to the landing route.
    pub fn logout(&mut self) {
        if let Err(e) = self.store.clear() {
            warn!(error = %e, "Failed to clear stored session");
        }
        if let Some(ref stored) = self.current {
            info!(user_id = %stored.user.id, "Logged out");
        }
        self.current = None;
        self.timer = None;
        self.route = Route::Landing;
        self.epoch += 1;
    }

    /// Advance the idle timer. Expiry logs the user out before returning.
    pub fn tick(&mut self) -> Option<SessionEvent> {
        let now = self.clock.now();
        let event = self.timer.as_mut()?.tick(now)?;

        match event {
            TimerEvent::WarningStarted { remaining_secs } => {
                info!(remaining_secs, "Session timeout warning");
                Some(SessionEvent::WarningStarted { remaining_secs })
            }
            TimerEvent::Expired => {
                info!("Session expired after inactivity");
                self.logout();
                Some(SessionEvent::Expired)
            }
        }
    }

    pub fn record_activity(&mut self) {
        let now = self.clock.now();
        if let Some(timer) = self.timer.as_mut() {
            timer.record_activity(now);
        }
    }

    pub fn extend_session(&mut self) -> Result<(), AuthError> {
        let now = self.clock.now();
        let timer = self.timer.as_mut().ok_or(AuthError::NoSession)?;
        timer.extend(now)?;
        debug!("Session extended");
        Ok(())
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn user(&self) -> Option<&User> {
        self.current.as_ref().map(|s| &s.user)
    }

    pub fn is_authenticated(&self) -> bool {
        self.current.is_some()
    }

    pub fn session(&self) -> Option<Session> {
        let stored = self.current.as_ref()?;
        let timer = self.timer.as_ref()?;

        let remaining = timer.expires_at().saturating_duration_since(self.clock.now());
        let remaining = chrono::Duration::from_std(remaining).unwrap_or_else(|_| chrono::Duration::zero());
        Some(Session {
            token: stored.token.clone(),
            user: stored.user.clone(),
            expires_at: Utc::now() + remaining,
        })
    }

    pub fn show_timeout_warning(&self) -> bool {
        self.timer
            .as_ref()
            .map(|t| t.state() == TimerState::Warning)
            .unwrap_or(false)
    }

    /// Seconds until forced logout; 0 without a session.
    pub fn time_remaining(&self) -> u64 {
        self.timer
            .as_ref()
            .map(|t| t.time_remaining(self.clock.now()))
            .unwrap_or(0)
    }

    pub fn timer_state(&self) -> Option<TimerState> {
        self.timer.as_ref().map(IdleTimer::state)
    }

    pub fn policy(&self) -> &TimeoutPolicy {
        &self.policy
    }

    // =========================================================================
    // Navigation
    // =========================================================================

    pub fn route(&self) -> &Route {
        &self.route
    }

    /// Move to `route`. Dashboards need a session; returns whether the
    /// route was taken.
    pub fn navigate(&mut self, route: Route) -> bool {
        if !route.is_public() && !self.is_authenticated() {
            debug!(route = %route, "Refusing protected route without a session");
            return false;
        }
        self.route = route;
        true
    }

    // =========================================================================
    // API access
    // =========================================================================

    /// Changes on every login and logout. Results of background work started
    /// under an older epoch belong to a session that no longer exists.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn is_current(&self, epoch: u64) -> bool {
        self.epoch == epoch
    }

    pub fn auth_api(&self) -> &AuthApi {
        &self.auth_api
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn dashboard(&self) -> DashboardApi {
        DashboardApi::new(self.api.clone())
    }

    /// Authenticated call; a 401/403 ends the session.
    pub async fn request(&mut self, path: &str, options: RequestOptions) -> Result<Value, ApiError> {
        let result = self.api.request(path, options).await;
        if let Err(ref e) = result {
            self.handle_api_error(e);
        }
        result
    }

    /// Apply the session consequences of a failed call made elsewhere.
    /// Returns true if it logged the user out.
    pub fn handle_api_error(&mut self, err: &ApiError) -> bool {
        if err.is_auth_failure() && self.is_authenticated() {
            warn!(error = %err, "Server rejected the session token, logging out");
            self.logout();
            return true;
        }
        false
    }
}
