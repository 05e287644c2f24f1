//! Error type shared by the data adapters and the view controllers.
//!
//! The variants follow how a failure is surfaced to the user:
//! - `Auth` is shown inline on the login form
//! - `NotFound` means the row does not exist under the owner filter
//! - `Validation` is a client-side rejection raised before any write
//! - `Remote`, `Http`, `Database` are backend failures, shown in place of a
//!   list on reads and as a notification on writes

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CrmError {
    #[error("{0}")]
    Auth(String),

    #[error("You must be signed in to do that")]
    NotSignedIn,

    #[error("{entity} not found")]
    NotFound { entity: &'static str },

    #[error("{0}")]
    Validation(String),

    #[error("Remote error ({status}): {message}")]
    Remote { status: u16, message: String },

    #[error("Network error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Malformed data: {0}")]
    Malformed(String),
}

impl CrmError {
    pub fn not_found(entity: &'static str) -> Self {
        CrmError::NotFound { entity }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        CrmError::Validation(message.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, CrmError::NotFound { .. })
    }
}

impl From<uuid::Error> for CrmError {
    fn from(e: uuid::Error) -> Self {
        CrmError::Malformed(format!("invalid id: {e}"))
    }
}

impl From<serde_json::Error> for CrmError {
    fn from(e: serde_json::Error) -> Self {
        CrmError::Malformed(e.to_string())
    }
}

pub type CrmResult<T> = std::result::Result<T, CrmError>;
