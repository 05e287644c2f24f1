//! SQLite-backed store with the same surface as the hosted backend.
//!
//! Used offline and as the simulated backend in tests. Accounts are kept in a
//! `users` table; passwords are salted SHA-256. New accounts must be confirmed
//! (see [`LocalStore::confirm_email`]) unless the store was opened with
//! confirmation disabled.

mod rows;
mod state;
mod workspace;

use std::{path::Path, sync::Arc};

use sha2::{Digest, Sha256};
use time::OffsetDateTime;
use tokio::sync::watch;
use uuid::Uuid;

use crate::{
    core::{
        auth::{AuthProvider, Session, SessionCell, SignUpOutcome, User},
        db::{DataSource, model::timestamp_to_nanos},
    },
    error::{CrmError, CrmResult},
};

use rows::{UserRow, parse_id};
use state::StoreState;

pub use workspace::LocalWorkspace;

const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone)]
pub struct LocalStore {
    state: Arc<StoreState>,
    session: Arc<SessionCell>,
    require_confirmation: bool,
}

impl LocalStore {
    pub async fn open<P: AsRef<Path>>(db_file: P) -> CrmResult<Self> {
        Ok(Self {
            state: Arc::new(StoreState::new(db_file).await?),
            session: Arc::new(SessionCell::default()),
            require_confirmation: true,
        })
    }

    /// Accounts created by [`AuthProvider::sign_up`] are usable right away.
    pub fn without_email_confirmation(mut self) -> Self {
        self.require_confirmation = false;
        self
    }

    /// Marks an account as confirmed, as following the emailed link would.
    pub async fn confirm_email(&self, email: &str) -> CrmResult<()> {
        let mut conn = self.state.conn().await?;
        let result = sqlx::query("UPDATE users SET confirmed = 1 WHERE email = ?")
            .bind(email.trim())
            .execute(&mut **conn)
            .await?;
        if result.rows_affected() == 0 {
            return Err(CrmError::not_found("user"));
        }
        tracing::info!(email, "account confirmed");
        Ok(())
    }

    /// Explicitly close the store, flushing the WAL into the database file.
    pub async fn close(&self) -> CrmResult<()> {
        self.state.close().await
    }

    async fn find_user(&self, email: &str) -> CrmResult<Option<UserRow>> {
        let mut conn = self.state.conn().await?;
        Ok(sqlx::query_as::<_, UserRow>(
            "SELECT id, email, password_hash, password_salt, confirmed FROM users WHERE email = ?",
        )
        .bind(email)
        .fetch_optional(&mut **conn)
        .await?)
    }

    fn open_session(&self, row: &UserRow) -> CrmResult<Session> {
        let session = Session {
            access_token: Uuid::new_v4().to_string(),
            refresh_token: None,
            expires_at: None,
            user: User {
                id: parse_id(&row.id)?,
                email: row.email.clone(),
            },
        };
        self.session.set(Some(session.clone()));
        Ok(session)
    }
}

fn hash_password(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(b":");
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn check_credentials(email: &str, password: &str) -> CrmResult<()> {
    if email.is_empty() || !email.contains('@') {
        return Err(CrmError::Auth("Unable to validate email address: invalid format".into()));
    }
    if password.len() < MIN_PASSWORD_LEN {
        return Err(CrmError::Auth(format!(
            "Password should be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

impl AuthProvider for LocalStore {
    async fn sign_up(&self, email: &str, password: &str) -> CrmResult<SignUpOutcome> {
        let email = email.trim();
        check_credentials(email, password)?;
        if self.find_user(email).await?.is_some() {
            return Err(CrmError::Auth("User already registered".into()));
        }

        let id = Uuid::new_v4().to_string();
        let salt = Uuid::new_v4().simple().to_string();
        let confirmed = !self.require_confirmation;
        {
            let mut conn = self.state.conn().await?;
            sqlx::query(
                "INSERT INTO users (id, email, password_hash, password_salt, confirmed, created_at)
                VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(&id)
            .bind(email)
            .bind(hash_password(&salt, password))
            .bind(&salt)
            .bind(i64::from(confirmed))
            .bind(timestamp_to_nanos(OffsetDateTime::now_utc()))
            .execute(&mut **conn)
            .await?;
        }
        tracing::info!(email, confirmed, "account registered");

        if confirmed {
            let row = self
                .find_user(email)
                .await?
                .ok_or(CrmError::not_found("user"))?;
            Ok(SignUpOutcome::SignedIn(self.open_session(&row)?))
        } else {
            Ok(SignUpOutcome::ConfirmationRequired {
                email: email.to_string(),
            })
        }
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> CrmResult<Session> {
        let invalid = || CrmError::Auth("Invalid login credentials".into());
        let row = self.find_user(email.trim()).await?.ok_or_else(invalid)?;
        if hash_password(&row.password_salt, password) != row.password_hash {
            tracing::warn!(email, "rejected sign-in");
            return Err(invalid());
        }
        if row.confirmed == 0 {
            return Err(CrmError::Auth("Email not confirmed".into()));
        }
        self.open_session(&row)
    }

    async fn sign_out(&self) -> CrmResult<()> {
        self.session.set(None);
        Ok(())
    }

    async fn get_session(&self) -> CrmResult<Option<Session>> {
        Ok(self.session.current())
    }

    async fn get_user(&self) -> CrmResult<Option<User>> {
        Ok(self.session.current().map(|s| s.user))
    }

    fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.session.subscribe()
    }
}

impl DataSource for LocalStore {
    type Workspace = LocalWorkspace;

    fn workspace(&self, session: &Session) -> Self::Workspace {
        LocalWorkspace::new(self.state.clone(), session.user_id())
    }
}
