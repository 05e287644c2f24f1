//! Authentication seam.
//!
//! Both data adapters implement [`AuthProvider`]. The session lives in a
//! [`SessionCell`], a `tokio::sync::watch` channel that plays the role of the
//! backend's auth-state-change subscription: every sign-in and sign-out is
//! published to all receivers.

use std::future::Future;

use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use tokio::sync::watch;
use uuid::Uuid;

use crate::error::CrmResult;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Unix time (seconds) after which the access token is rejected.
    #[serde(default)]
    pub expires_at: Option<i64>,
    pub user: User,
}

impl Session {
    pub fn user_id(&self) -> Uuid {
        self.user.id
    }

    /// True when the access token expires within `margin` of now. Sessions
    /// without an expiry never do.
    pub fn expires_within(&self, margin: Duration) -> bool {
        self.expires_at
            .is_some_and(|at| at <= (OffsetDateTime::now_utc() + margin).unix_timestamp())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignUpOutcome {
    /// The account exists but must be confirmed through the emailed link.
    ConfirmationRequired { email: String },
    /// The backend auto-confirmed the account and opened a session.
    SignedIn(Session),
}

pub trait AuthProvider {
    fn sign_up(&self, email: &str, password: &str) -> impl Future<Output = CrmResult<SignUpOutcome>> + Send;
    fn sign_in_with_password(&self, email: &str, password: &str) -> impl Future<Output = CrmResult<Session>> + Send;
    fn sign_out(&self) -> impl Future<Output = CrmResult<()>> + Send;
    fn get_session(&self) -> impl Future<Output = CrmResult<Option<Session>>> + Send;
    fn get_user(&self) -> impl Future<Output = CrmResult<Option<User>>> + Send;
    /// Receiver that observes every session change.
    fn subscribe(&self) -> watch::Receiver<Option<Session>>;
}

#[derive(Debug)]
pub struct SessionCell {
    tx: watch::Sender<Option<Session>>,
}

impl Default for SessionCell {
    fn default() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx }
    }
}

impl SessionCell {
    pub fn current(&self) -> Option<Session> {
        self.tx.borrow().clone()
    }

    pub fn set(&self, session: Option<Session>) {
        match &session {
            Some(s) => tracing::info!(user = %s.user.email, "session started"),
            None => tracing::info!("session ended"),
        }
        self.tx.send_replace(session);
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.tx.subscribe()
    }
}
