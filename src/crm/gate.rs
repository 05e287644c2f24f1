//! Session gate: decides between the login form and the application.
//!
//! The gate never switches to the application on a successful sign-in call
//! by itself. It waits for the session event published by the auth provider,
//! so the same path handles sign-in, auto-confirmed sign-up and sign-out.

use crate::{
    core::auth::{AuthProvider, Session, SignUpOutcome},
    error::CrmResult,
};

pub const CONFIRMATION_SENT: &str = "Check your email to confirm your registration.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthAction {
    SignIn,
    SignUp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// Text under the login form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InlineMessage {
    Info(String),
    Error(String),
}

impl InlineMessage {
    pub fn text(&self) -> &str {
        match self {
            InlineMessage::Info(text) | InlineMessage::Error(text) => text,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
    pub message: Option<InlineMessage>,
    pub busy: bool,
}

/// Result of an auth call, reduced to what the form shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthReply {
    /// Sign-in accepted; the session event follows.
    Accepted,
    ConfirmationSent,
    Failed(AuthAction, String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateState {
    /// Reading the initial session.
    Starting,
    SignedOut(LoginForm),
    SignedIn(Session),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gate {
    state: GateState,
}

impl Default for Gate {
    fn default() -> Self {
        Self {
            state: GateState::Starting,
        }
    }
}

impl Gate {
    pub fn state(&self) -> &GateState {
        &self.state
    }

    pub fn session(&self) -> Option<&Session> {
        match &self.state {
            GateState::SignedIn(session) => Some(session),
            _ => None,
        }
    }

    pub fn form_mut(&mut self) -> Option<&mut LoginForm> {
        match &mut self.state {
            GateState::SignedOut(form) => Some(form),
            _ => None,
        }
    }

    /// Result of the initial session read. A failed read shows the login form.
    pub fn bootstrap(&mut self, initial: CrmResult<Option<Session>>) -> bool {
        match initial {
            Ok(session) => self.on_session(session),
            Err(e) => {
                tracing::error!(error = %e, "could not read the initial session");
                self.state = GateState::SignedOut(LoginForm::default());
                false
            }
        }
    }

    /// Session change event. Returns true when the user (re)entered the
    /// application, meaning the shell should start over on its first view.
    pub fn on_session(&mut self, session: Option<Session>) -> bool {
        match (session, &self.state) {
            (Some(new), GateState::SignedIn(current)) if current.user_id() == new.user_id() => {
                self.state = GateState::SignedIn(new);
                false
            }
            (Some(new), _) => {
                tracing::info!(user = %new.user.email, "entering application");
                self.state = GateState::SignedIn(new);
                true
            }
            (None, GateState::SignedOut(_)) => false,
            (None, _) => {
                self.state = GateState::SignedOut(LoginForm::default());
                false
            }
        }
    }

    /// Validates the form before any call. Empty fields are answered inline.
    pub fn submit(&mut self, action: AuthAction) -> Option<Credentials> {
        let form = self.form_mut()?;
        if form.busy {
            return None;
        }
        let email = form.email.trim();
        if email.is_empty() || form.password.is_empty() {
            form.message = Some(InlineMessage::Error(
                "Please enter both email and password.".to_string(),
            ));
            return None;
        }
        form.message = None;
        form.busy = true;
        Some(Credentials {
            email: email.to_string(),
            password: form.password.clone(),
        })
    }

    pub fn on_reply(&mut self, reply: AuthReply) {
        let Some(form) = self.form_mut() else {
            return;
        };
        form.busy = false;
        form.message = match reply {
            AuthReply::Accepted => None,
            AuthReply::ConfirmationSent => Some(InlineMessage::Info(CONFIRMATION_SENT.to_string())),
            AuthReply::Failed(AuthAction::SignIn, reason) => {
                Some(InlineMessage::Error(format!("Login failed: {reason}")))
            }
            AuthReply::Failed(AuthAction::SignUp, reason) => {
                Some(InlineMessage::Error(format!("Registration failed: {reason}")))
            }
        };
    }
}

/// Runs the auth call; every error becomes an inline reply.
pub async fn authenticate<A: AuthProvider>(auth: &A, action: AuthAction, credentials: Credentials) -> AuthReply {
    match action {
        AuthAction::SignIn => match auth
            .sign_in_with_password(&credentials.email, &credentials.password)
            .await
        {
            Ok(_) => AuthReply::Accepted,
            Err(e) => {
                tracing::warn!(error = %e, "sign-in failed");
                AuthReply::Failed(action, e.to_string())
            }
        },
        AuthAction::SignUp => match auth.sign_up(&credentials.email, &credentials.password).await {
            Ok(SignUpOutcome::ConfirmationRequired { .. }) => AuthReply::ConfirmationSent,
            Ok(SignUpOutcome::SignedIn(_)) => AuthReply::Accepted,
            Err(e) => {
                tracing::warn!(error = %e, "sign-up failed");
                AuthReply::Failed(action, e.to_string())
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::{core::auth::User, error::CrmError};

    fn session() -> Session {
        Session {
            access_token: "token".into(),
            refresh_token: None,
            expires_at: None,
            user: User {
                id: Uuid::new_v4(),
                email: "ann@example.com".into(),
            },
        }
    }

    fn signed_out() -> Gate {
        let mut gate = Gate::default();
        gate.bootstrap(Ok(None));
        gate
    }

    #[test]
    fn failed_bootstrap_falls_back_to_login() {
        let mut gate = Gate::default();
        assert!(!gate.bootstrap(Err(CrmError::NotSignedIn)));
        assert!(matches!(gate.state(), GateState::SignedOut(_)));
    }

    #[test]
    fn empty_fields_are_rejected_inline() {
        let mut gate = signed_out();
        gate.form_mut().unwrap().email = "  ".into();
        assert_eq!(gate.submit(AuthAction::SignIn), None);
        let GateState::SignedOut(form) = gate.state() else { panic!("expected login form") };
        assert!(matches!(form.message, Some(InlineMessage::Error(_))));
        assert!(!form.busy);
    }

    #[test]
    fn replies_map_to_inline_messages() {
        let mut gate = signed_out();
        {
            let form = gate.form_mut().unwrap();
            form.email = "ann@example.com".into();
            form.password = "secret1".into();
        }
        assert!(gate.submit(AuthAction::SignIn).is_some());
        gate.on_reply(AuthReply::Failed(AuthAction::SignIn, "Invalid login credentials".into()));
        let form = gate.form_mut().unwrap();
        assert_eq!(
            form.message.as_ref().map(InlineMessage::text),
            Some("Login failed: Invalid login credentials")
        );

        assert!(gate.submit(AuthAction::SignUp).is_some());
        gate.on_reply(AuthReply::ConfirmationSent);
        assert_eq!(
            gate.form_mut().unwrap().message,
            Some(InlineMessage::Info(CONFIRMATION_SENT.into()))
        );
    }

    #[test]
    fn session_events_drive_transitions() {
        let mut gate = signed_out();
        let s = session();
        assert!(gate.on_session(Some(s.clone())));
        assert_eq!(gate.session(), Some(&s));
        // Same user again (token refresh) keeps the current view.
        assert!(!gate.on_session(Some(s)));
        gate.on_session(None);
        assert!(matches!(gate.state(), GateState::SignedOut(_)));
    }
}
