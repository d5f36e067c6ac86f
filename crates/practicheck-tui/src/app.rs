//! Application state management for PractiCheck.
//!
//! `App` owns the `AuthContext` plus the UI state around it: role selection,
//! the login form, the dashboard data and the background load channel.

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use practicheck_core::api::{ApiError, AuthApi, DashboardApi, PasswordChange};
use practicheck_core::models::{
    DashboardOverview, EmailCheckOutcome, LoginCredentials, Role, Route, UniversityInfo, User,
};
use practicheck_core::{AuthContext, AuthError, Config, SessionEvent};

// ============================================================================
// Constants
// ============================================================================

/// Buffer size for the background load channel.
const CHANNEL_BUFFER_SIZE: usize = 8;

/// Maximum length for the email / ID input.
const MAX_IDENTIFIER_LENGTH: usize = 100;

/// Maximum length for password input.
const MAX_PASSWORD_LENGTH: usize = 128;

const SESSION_EXPIRED_MESSAGE: &str = "Your session has expired. Please log in again.";

const SETUP_LINK_MESSAGE: &str = "A password setup link has been sent to your email. \
Please check your inbox and follow the instructions to set up your password.";

const NO_STUDENT_ACCOUNT_MESSAGE: &str =
    "No student account found with this email. Please contact your university administrator.";

const PASSWORD_CHANGE_PROMPT: &str = "Your password is temporary. Choose a new one to continue.";

const PASSWORD_MISMATCH_MESSAGE: &str = "Passwords do not match";

// ============================================================================
// UI State Types
// ============================================================================

/// Overall application state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    SelectingRole,
    LoggingIn,
    Normal,
    ShowingHelp,
    ConfirmingQuit,
    Quitting,
}

/// Which page of the login form is showing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginStep {
    /// Students confirm their email before the ID/password form
    Email,
    Credentials,
    /// Lecturer first sign-in with a temporary password
    ChangePassword,
}

/// Login form focus state
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LoginFocus {
    Email,
    Identifier,
    University,
    Password,
    NewPassword,
    ConfirmPassword,
    Button,
}

/// Everything on the role selection list, in order.
pub fn login_roles() -> Vec<Role> {
    let mut roles = Role::SELECTABLE.to_vec();
    roles.push(Role::company_admin());
    roles
}

/// Label for the first login field
pub fn identifier_label(role: &Role) -> &'static str {
    match role {
        Role::Student => "Student ID",
        Role::Lecturer => "Staff ID",
        _ => "Email",
    }
}

/// Whether the login form for `role` has a university field
pub fn needs_university(role: &Role) -> bool {
    matches!(role, Role::Student | Role::Lecturer)
}

/// Fields shown on one login page, in tab order.
pub fn login_fields(step: LoginStep, role: &Role) -> Vec<LoginFocus> {
    let mut fields = match step {
        LoginStep::Email => vec![LoginFocus::Email],
        LoginStep::Credentials => {
            let mut fields = vec![LoginFocus::Identifier];
            if needs_university(role) {
                fields.push(LoginFocus::University);
            }
            fields.push(LoginFocus::Password);
            fields
        }
        LoginStep::ChangePassword => vec![LoginFocus::NewPassword, LoginFocus::ConfirmPassword],
    };
    fields.push(LoginFocus::Button);
    fields
}

/// Message for a failed form submission. Local validation text is shown
/// without its prefix.
fn form_error_message(err: &ApiError) -> String {
    match err {
        ApiError::InvalidRequest(msg) => msg.clone(),
        other => other
            .server_message()
            .map(str::to_string)
            .unwrap_or_else(|| other.user_message()),
    }
}

// ============================================================================
// Background Load Results
// ============================================================================

/// Result of a background dashboard load. Sent tagged with the session
/// epoch it was started under.
#[derive(Debug)]
enum LoadResult {
    Overview(DashboardOverview),
    Profile(User),
    Universities(Vec<UniversityInfo>),
    /// The login form falls back to a typed university ID
    UniversitiesUnavailable(ApiError),
    Error(ApiError),
}

// ============================================================================
// Main Application Struct
// ============================================================================

pub struct App {
    pub config: Config,
    pub ctx: AuthContext,

    // UI State
    pub state: AppState,
    pub role_selection: usize,

    // Login form state
    pub login_role: Role,
    pub login_step: LoginStep,
    pub login_email: String,
    pub login_identifier: String,
    pub login_university: String,
    pub login_password: String,
    pub login_new_password: String,
    pub login_confirm_password: String,
    pub login_focus: LoginFocus,
    pub login_error: Option<String>,
    pub login_notice: Option<String>,

    // University picker; empty until `GET /universities` answers
    pub universities: Vec<UniversityInfo>,
    pub university_index: Option<usize>,

    // Dashboard data
    pub overview: Option<DashboardOverview>,
    pub profile: Option<User>,
    pub loading: bool,

    pub status_message: Option<String>,

    load_rx: mpsc::Receiver<(u64, LoadResult)>,
    load_tx: mpsc::Sender<(u64, LoadResult)>,
}

impl App {
    /// Create the app over the configured services, picking up any stored
    /// session.
    pub fn new(config: Config) -> Result<Self> {
        let ctx = config.auth_context()?;
        Self::with_context(config, ctx)
    }

    pub fn with_context(config: Config, mut ctx: AuthContext) -> Result<Self> {
        let restored = match ctx.restore() {
            Ok(session) => session.is_some(),
            Err(e) => {
                warn!(error = %e, "Failed to restore session");
                false
            }
        };
        debug!(restored, "App created");

        let (tx, rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);

        let login_identifier = config.last_email.clone().unwrap_or_default();
        let login_password = std::env::var(practicheck_core::config::ENV_PASSWORD).unwrap_or_default();

        Ok(Self {
            config,
            ctx,
            state: if restored {
                AppState::Normal
            } else {
                AppState::SelectingRole
            },
            role_selection: 0,
            login_role: Role::Student,
            login_step: LoginStep::Credentials,
            login_email: String::new(),
            login_identifier,
            login_university: String::new(),
            login_password,
            login_new_password: String::new(),
            login_confirm_password: String::new(),
            login_focus: LoginFocus::Identifier,
            login_error: None,
            login_notice: None,
            universities: Vec::new(),
            university_index: None,
            overview: None,
            profile: None,
            loading: false,
            status_message: None,
            load_rx: rx,
            load_tx: tx,
        })
    }

    // =========================================================================
    // Authentication
    // =========================================================================

    pub fn is_authenticated(&self) -> bool {
        self.ctx.is_authenticated()
    }

    /// Open the login form for the highlighted role.
    pub fn start_login(&mut self) {
        let roles = login_roles();
        let role = roles
            .get(self.role_selection)
            .cloned()
            .unwrap_or(Role::Student);

        self.ctx.navigate(Route::Login(role.clone()));
        self.login_university.clear();
        self.university_index = None;
        self.login_new_password.clear();
        self.login_confirm_password.clear();
        self.login_error = None;
        self.login_notice = None;

        if role == Role::Student {
            self.login_step = LoginStep::Email;
            self.login_focus = LoginFocus::Email;
        } else {
            self.login_step = LoginStep::Credentials;
            self.login_focus = if self.login_identifier.is_empty() {
                LoginFocus::Identifier
            } else {
                LoginFocus::Password
            };
        }
        if needs_university(&role) {
            self.load_universities();
        }
        self.login_role = role;
        self.state = AppState::LoggingIn;
    }

    /// Back from the login form to role selection.
    pub fn cancel_login(&mut self) {
        self.ctx.navigate(Route::RoleSelection);
        self.login_password.clear();
        self.login_new_password.clear();
        self.login_confirm_password.clear();
        self.login_error = None;
        self.login_notice = None;
        self.state = AppState::SelectingRole;
    }

    /// Esc on the login form: one page back, or out to role selection.
    pub fn login_back(&mut self) {
        self.login_error = None;
        self.login_notice = None;
        match self.login_step {
            LoginStep::ChangePassword => {
                self.login_new_password.clear();
                self.login_confirm_password.clear();
                self.login_step = LoginStep::Credentials;
                self.login_focus = LoginFocus::Password;
            }
            LoginStep::Credentials if self.login_role == Role::Student => {
                self.login_step = LoginStep::Email;
                self.login_focus = LoginFocus::Email;
            }
            _ => self.cancel_login(),
        }
    }

    /// Submit whichever login page is showing.
    pub async fn submit_login_form(&mut self) {
        match self.login_step {
            LoginStep::Email => self.check_student_email().await,
            // On failure login_error is set and the form stays up
            LoginStep::Credentials => {
                let _ = self.attempt_login().await;
            }
            LoginStep::ChangePassword => {
                let _ = self.submit_password_change().await;
            }
        }
    }

    /// The text field under the cursor and whether it is masked.
    pub fn focused_input(&mut self) -> Option<(&mut String, bool)> {
        match self.login_focus {
            LoginFocus::Email => Some((&mut self.login_email, false)),
            LoginFocus::Identifier => Some((&mut self.login_identifier, false)),
            LoginFocus::University if self.universities.is_empty() => {
                Some((&mut self.login_university, false))
            }
            LoginFocus::Password => Some((&mut self.login_password, true)),
            LoginFocus::NewPassword => Some((&mut self.login_new_password, true)),
            LoginFocus::ConfirmPassword => Some((&mut self.login_confirm_password, true)),
            LoginFocus::University | LoginFocus::Button => None,
        }
    }

    /// First step of the student login: does this email have an account
    /// with a password yet?
    pub async fn check_student_email(&mut self) {
        self.login_error = None;
        self.login_notice = None;

        let check = self.ctx.auth_api().check_email(&self.login_email).await;
        match check {
            Ok(check) => match check.outcome() {
                EmailCheckOutcome::ProceedToLogin => {
                    debug!("Email recognised, showing student login");
                    self.login_step = LoginStep::Credentials;
                    self.login_focus = LoginFocus::Identifier;
                }
                EmailCheckOutcome::SetupLinkSent => {
                    self.login_notice = Some(SETUP_LINK_MESSAGE.to_string());
                }
                EmailCheckOutcome::NoAccount => {
                    self.login_error = Some(NO_STUDENT_ACCOUNT_MESSAGE.to_string());
                }
            },
            Err(e) => {
                warn!(error = %e, "Email check failed");
                self.login_error = Some(form_error_message(&e));
            }
        }
    }

    /// Replace a lecturer's temporary password, then sign in with the new one.
    pub async fn submit_password_change(&mut self) -> Result<(), AuthError> {
        self.login_error = None;

        if self.login_new_password != self.login_confirm_password {
            self.login_error = Some(PASSWORD_MISMATCH_MESSAGE.to_string());
            return Err(AuthError::Validation(PASSWORD_MISMATCH_MESSAGE.to_string()));
        }

        let change = PasswordChange {
            staff_id: self.login_identifier.trim().to_string(),
            current_password: self.login_password.clone(),
            new_password: self.login_new_password.clone(),
            university_id: self.login_university.trim().to_string(),
        };
        let changed = self.ctx.auth_api().change_password(&change).await;
        if let Err(e) = changed {
            warn!(error = %e, "Password change failed");
            let message = form_error_message(&e);
            self.login_error = Some(message.clone());
            return Err(AuthError::Validation(message));
        }

        info!("Temporary password replaced");
        self.login_password = std::mem::take(&mut self.login_new_password);
        self.login_confirm_password.clear();
        self.login_notice = None;
        self.login_step = LoginStep::Credentials;
        self.login_focus = LoginFocus::Button;
        self.attempt_login().await
    }

    // =========================================================================
    // University picker
    // =========================================================================

    /// Fetch the university list for the login form in the background.
    fn load_universities(&mut self) {
        if !self.universities.is_empty() {
            return;
        }
        let auth = self.ctx.auth_api().clone();
        let epoch = self.ctx.epoch();
        let tx = self.load_tx.clone();
        tokio::spawn(async move {
            let result = match auth.universities().await {
                Ok(list) => LoadResult::Universities(list),
                Err(e) => LoadResult::UniversitiesUnavailable(e),
            };
            Self::send_result(&tx, epoch, result).await;
        });
    }

    /// Step through the loaded universities. Does nothing without a list.
    pub fn cycle_university(&mut self, forward: bool) {
        let count = self.universities.len();
        if count == 0 {
            return;
        }
        let next = match self.university_index {
            None if forward => 0,
            None => count - 1,
            Some(i) if forward => (i + 1) % count,
            Some(i) => i.checked_sub(1).unwrap_or(count - 1),
        };
        self.university_index = Some(next);
        self.login_university = self.universities[next].id.clone();
    }

    /// Name of the chosen university, or the typed ID.
    pub fn university_display(&self) -> String {
        match self.university_index.and_then(|i| self.universities.get(i)) {
            Some(university) => university.name.clone(),
            None => self.login_university.clone(),
        }
    }

    fn credentials(&self) -> LoginCredentials {
        let identifier = self.login_identifier.trim().to_string();
        let university = self.login_university.trim().to_string();
        let password = self.login_password.clone();

        match self.login_role {
            Role::Student => LoginCredentials::student(identifier, university, password),
            Role::Lecturer => LoginCredentials::lecturer(
                identifier,
                Some(university).filter(|u| !u.is_empty()),
                password,
            ),
            ref role => LoginCredentials::email(role.clone(), identifier, password),
        }
    }

    /// Attempt login with the credentials from the login form
    pub async fn attempt_login(&mut self) -> Result<(), AuthError> {
        self.login_error = None;

        match self.ctx.login(self.credentials()).await {
            Ok(session) => {
                if !matches!(self.login_role, Role::Student | Role::Lecturer) {
                    self.config.last_email = Some(self.login_identifier.trim().to_string());
                    if let Err(e) = self.config.save() {
                        warn!(error = %e, "Failed to save config");
                    }
                }

                self.login_password.clear();
                self.login_notice = None;
                self.status_message = None;
                self.state = AppState::Normal;
                info!(role = %session.user.role, "Signed in from login form");
                self.load_dashboard();
                Ok(())
            }
            Err(AuthError::PasswordChangeRequired) => {
                info!("Temporary password in use, asking for a new one");
                self.login_step = LoginStep::ChangePassword;
                self.login_focus = LoginFocus::NewPassword;
                self.login_notice = Some(PASSWORD_CHANGE_PROMPT.to_string());
                Err(AuthError::PasswordChangeRequired)
            }
            Err(e) => {
                self.login_error = Some(e.user_message());
                Err(e)
            }
        }
    }

    pub fn logout(&mut self) {
        self.ctx.logout();
        self.after_logout(None);
    }

    fn after_logout(&mut self, message: Option<&str>) {
        self.overview = None;
        self.profile = None;
        self.loading = false;
        self.status_message = message.map(str::to_string);
        self.role_selection = 0;
        self.state = AppState::SelectingRole;
    }

    // =========================================================================
    // Idle timeout
    // =========================================================================

    /// Advance the idle timer; called every loop iteration and before
    /// each key press is handled.
    pub fn tick(&mut self) -> Option<SessionEvent> {
        let event = self.ctx.tick();
        match event {
            Some(SessionEvent::Expired) => {
                self.after_logout(Some(SESSION_EXPIRED_MESSAGE));
            }
            Some(SessionEvent::WarningStarted { remaining_secs }) => {
                debug!(remaining_secs, "Showing timeout warning");
            }
            None => {}
        }
        event
    }

    /// A key press counts as activity.
    pub fn record_activity(&mut self) {
        self.ctx.record_activity();
    }

    pub fn show_timeout_warning(&self) -> bool {
        self.ctx.show_timeout_warning()
    }

    /// "Stay logged in" on the warning prompt.
    pub fn extend_session(&mut self) {
        if let Err(e) = self.ctx.extend_session() {
            warn!(error = %e, "Could not extend session");
            self.status_message = Some(e.user_message());
        }
    }

    // =========================================================================
    // Dashboard data
    // =========================================================================

    /// Start a background load of whatever the current user's dashboard
    /// shows. Results arrive through `check_background_tasks`.
    pub fn load_dashboard(&mut self) {
        let Some(user) = self.ctx.user() else {
            return;
        };
        let epoch = self.ctx.epoch();
        let tx = self.load_tx.clone();

        if let Role::CompanyAdmin(_) = user.role {
            let dashboard = self.ctx.dashboard();
            let auth = self.ctx.auth_api().clone();
            self.loading = true;
            tokio::spawn(async move {
                Self::execute_admin_load(tx, epoch, dashboard, auth).await;
            });
        } else {
            self.profile = Some(user.clone());
        }
    }

    async fn execute_admin_load(
        tx: mpsc::Sender<(u64, LoadResult)>,
        epoch: u64,
        dashboard: DashboardApi,
        auth: AuthApi,
    ) {
        let overview = match dashboard.overview().await {
            Ok(overview) => LoadResult::Overview(overview),
            Err(e) => LoadResult::Error(e),
        };
        Self::send_result(&tx, epoch, overview).await;

        let profile = match auth.me().await {
            Ok(user) => LoadResult::Profile(user),
            Err(e) => LoadResult::Error(e),
        };
        Self::send_result(&tx, epoch, profile).await;
    }

    async fn send_result(tx: &mpsc::Sender<(u64, LoadResult)>, epoch: u64, result: LoadResult) {
        if tx.send((epoch, result)).await.is_err() {
            debug!("Load channel closed");
        }
    }

    /// Check for completed background tasks and process results
    pub fn check_background_tasks(&mut self) {
        let mut results = Vec::new();
        while let Ok(result) = self.load_rx.try_recv() {
            results.push(result);
        }

        for (epoch, result) in results {
            if !self.ctx.is_current(epoch) {
                debug!(epoch, current = self.ctx.epoch(), "Dropping result from an old session");
                continue;
            }
            self.process_load_result(result);
        }
    }

    fn process_load_result(&mut self, result: LoadResult) {
        match result {
            LoadResult::Overview(overview) => {
                self.loading = false;
                self.overview = Some(overview);
            }
            LoadResult::Profile(user) => {
                self.profile = Some(user);
            }
            LoadResult::Universities(list) => {
                debug!(count = list.len(), "Universities loaded");
                self.universities = list;
                self.university_index = None;
            }
            LoadResult::UniversitiesUnavailable(e) => {
                warn!(error = %e, "Could not load universities, university ID must be typed");
            }
            LoadResult::Error(e) => {
                self.loading = false;
                if self.ctx.handle_api_error(&e) {
                    self.after_logout(Some(SESSION_EXPIRED_MESSAGE));
                } else {
                    warn!(error = %e, "Dashboard load failed");
                    self.status_message = Some(e.user_message());
                }
            }
        }
    }
}

// ============================================================================
// Input validation helpers (exported for use in input.rs)
// ============================================================================

fn is_valid_input_char(c: char) -> bool {
    !c.is_control()
}

pub fn can_add_identifier_char(current_len: usize, c: char) -> bool {
    current_len < MAX_IDENTIFIER_LENGTH && is_valid_input_char(c)
}

pub fn can_add_password_char(current_len: usize, c: char) -> bool {
    current_len < MAX_PASSWORD_LENGTH && is_valid_input_char(c)
}

// ============================================================================
// Tests
// ============================================================================
