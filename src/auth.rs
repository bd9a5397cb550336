//! Credential entry: the login / register form and what happens on submit.

use crate::api::AuthService;
use crate::error::ApiError;
use crate::session::Session;

pub const FALLBACK_ERROR: &str = "An error occurred.";
pub const REGISTERED_NOTICE: &str = "Registration successful! Please log in.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    Login,
    Register,
}

impl AuthMode {
    pub fn title(&self) -> &'static str {
        match self {
            AuthMode::Login => "Login",
            AuthMode::Register => "Register",
        }
    }

    pub fn toggled(&self) -> Self {
        match self {
            AuthMode::Login => AuthMode::Register,
            AuthMode::Register => AuthMode::Login,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Username,
    Password,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Info(String),
    Error(String),
}

/// A validated snapshot of the form, ready to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialDraft {
    pub username: String,
    pub password: String,
    pub mode: AuthMode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    LoggedIn(String),
    Registered,
}

/// Perform the remote half of a submission.
pub async fn authenticate(
    service: &dyn AuthService,
    draft: &CredentialDraft,
) -> Result<AuthOutcome, ApiError> {
    match draft.mode {
        AuthMode::Login => service
            .login(&draft.username, &draft.password)
            .await
            .map(AuthOutcome::LoggedIn),
        AuthMode::Register => service
            .register(&draft.username, &draft.password)
            .await
            .map(|_| AuthOutcome::Registered),
    }
}

#[derive(Debug, Clone)]
pub struct CredentialForm {
    pub username: String,
    pub password: String,
    pub mode: AuthMode,
    pub focus: Field,
    pub cursor: usize,
    pub notice: Option<Notice>,
    pub submitting: bool,
}

impl Default for CredentialForm {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialForm {
    pub fn new() -> Self {
        Self {
            username: String::new(),
            password: String::new(),
            mode: AuthMode::Login,
            focus: Field::Username,
            cursor: 0,
            notice: None,
            submitting: false,
        }
    }

    /// Switch between login and register. Ignored while a submit is in flight.
    pub fn toggle_mode(&mut self) {
        if self.submitting {
            return;
        }
        self.mode = self.mode.toggled();
        self.notice = None;
    }

    pub fn focused_value(&self) -> &str {
        match self.focus {
            Field::Username => &self.username,
            Field::Password => &self.password,
        }
    }

    pub fn focused_value_mut(&mut self) -> &mut String {
        match self.focus {
            Field::Username => &mut self.username,
            Field::Password => &mut self.password,
        }
    }

    pub fn focus_next(&mut self) {
        self.focus = match self.focus {
            Field::Username => Field::Password,
            Field::Password => Field::Username,
        };
        self.cursor = self.focused_value().chars().count();
    }

    pub fn can_submit(&self) -> bool {
        !self.submitting && !self.username.is_empty() && !self.password.is_empty()
    }

    /// Snapshot the form for submission and mark it in flight.
    ///
    /// Returns `None` while a field is empty or a previous submit is pending.
    pub fn begin_submit(&mut self) -> Option<CredentialDraft> {
        if !self.can_submit() {
            return None;
        }
        self.submitting = true;
        Some(CredentialDraft {
            username: self.username.clone(),
            password: self.password.clone(),
            mode: self.mode,
        })
    }

    /// Apply the result of [`authenticate`] to the form and the session.
    pub fn finish_submit(&mut self, result: Result<AuthOutcome, ApiError>, session: &Session) {
        self.submitting = false;
        match result {
            Ok(AuthOutcome::LoggedIn(token)) => {
                self.notice = None;
                session.save_token(&token);
            }
            Ok(AuthOutcome::Registered) => {
                self.mode = AuthMode::Login;
                self.notice = Some(Notice::Info(REGISTERED_NOTICE.to_string()));
            }
            Err(e) => {
                tracing::error!("{} failed: {}", self.mode.title(), e);
                let message = e.detail().unwrap_or(FALLBACK_ERROR).to_string();
                self.notice = Some(Notice::Error(message));
            }
        }
    }

    pub async fn submit(&mut self, service: &dyn AuthService, session: &Session) {
        if let Some(draft) = self.begin_submit() {
            let result = authenticate(service, &draft).await;
            self.finish_submit(result, session);
        }
    }
}
