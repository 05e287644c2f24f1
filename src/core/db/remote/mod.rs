//! HTTP adapter for the hosted backend.
//!
//! Auth goes through `/auth/v1/*`, rows through the `/rest/v1/{table}` table
//! API. Every request carries the project's anon key; once signed in, the
//! session's access token is sent as the bearer. Access tokens are short
//! lived: table calls refresh the session shortly before it expires, and once
//! more if the backend still answers 401.

mod query;
mod workspace;

use std::sync::Arc;

use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use tokio::sync::{Mutex, watch};
use uuid::Uuid;

use crate::{
    core::{
        auth::{AuthProvider, Session, SessionCell, SignUpOutcome, User},
        db::DataSource,
    },
    error::{CrmError, CrmResult},
};

pub use workspace::RemoteWorkspace;

pub(crate) use query::{Direction, TableQuery, error_message, parse_content_range};

/// How long before `expires_at` a session is refreshed.
const EXPIRY_MARGIN: Duration = Duration::seconds(30);

#[derive(Debug)]
pub(crate) struct Endpoint {
    client: reqwest::Client,
    base_url: String,
    anon_key: String,
}

impl Endpoint {
    /// Request with the anon key and a bearer (the anon key when signed out).
    pub(crate) fn request(&self, method: Method, path: &str, token: Option<&str>) -> RequestBuilder {
        let bearer = token.unwrap_or(&self.anon_key);
        self.client
            .request(method, format!("{}{path}", self.base_url))
            .header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {bearer}"))
    }
}

/// Turns a non-2xx response into [`CrmError::Remote`].
pub(crate) async fn check_status(resp: Response) -> CrmResult<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    let message = error_message(&body);
    tracing::warn!(status = status.as_u16(), %message, "backend request failed");
    Err(CrmError::Remote {
        status: status.as_u16(),
        message,
    })
}

/// Auth endpoints report failures as [`CrmError::Auth`] so the login form can
/// show the reason.
async fn check_auth_status(resp: Response) -> CrmResult<Response> {
    check_status(resp).await.map_err(|e| match e {
        CrmError::Remote { message, .. } => CrmError::Auth(message),
        other => other,
    })
}

#[derive(Debug, Serialize)]
struct Credentials<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
struct RefreshGrant<'a> {
    refresh_token: &'a str,
}

/// Token endpoint body. Older servers send only `expires_in`.
#[derive(Debug, Deserialize)]
struct TokenGrant {
    #[serde(flatten)]
    session: Session,
    #[serde(default)]
    expires_in: Option<i64>,
}

impl TokenGrant {
    fn into_session(self) -> Session {
        let mut session = self.session;
        if session.expires_at.is_none() {
            session.expires_at = self
                .expires_in
                .map(|secs| OffsetDateTime::now_utc().unix_timestamp() + secs);
        }
        session
    }
}

/// Endpoint plus the live session, shared by the backend and every workspace
/// it hands out.
#[derive(Debug)]
pub(crate) struct Gateway {
    endpoint: Endpoint,
    session: SessionCell,
    refreshing: Mutex<()>,
}

impl Gateway {
    pub(crate) fn request(&self, method: Method, path: &str, token: Option<&str>) -> RequestBuilder {
        self.endpoint.request(method, path, token)
    }

    /// The current session, provided it still belongs to `user_id`.
    fn session_of(&self, user_id: Uuid) -> CrmResult<Session> {
        self.session
            .current()
            .filter(|s| s.user_id() == user_id)
            .ok_or(CrmError::NotSignedIn)
    }

    /// Sends the request built by `build` with `user_id`'s access token and
    /// checks its status. An expiring token is refreshed first; a 401 is
    /// retried once with a refreshed token.
    pub(crate) async fn send_as<F>(&self, user_id: Uuid, build: F) -> CrmResult<Response>
    where
        F: Fn(&str) -> RequestBuilder,
    {
        let mut session = self.session_of(user_id)?;
        if session.refresh_token.is_some() && session.expires_within(EXPIRY_MARGIN) {
            session = self.refresh(&session).await?;
        }
        let resp = build(&session.access_token).send().await?;
        if resp.status() != StatusCode::UNAUTHORIZED || session.refresh_token.is_none() {
            return check_status(resp).await;
        }
        tracing::debug!("access token rejected, refreshing session");
        let session = self.refresh(&session).await?;
        check_status(build(&session.access_token).send().await?).await
    }

    /// Exchanges `stale`'s refresh token for a new session and publishes it.
    /// Concurrent callers holding the same stale session share one exchange.
    /// A rejected refresh token ends the session.
    async fn refresh(&self, stale: &Session) -> CrmResult<Session> {
        let _guard = self.refreshing.lock().await;
        let rotated = self
            .session
            .current()
            .filter(|s| s.user_id() == stale.user_id() && s.access_token != stale.access_token);
        if let Some(current) = rotated {
            return Ok(current);
        }
        let Some(refresh_token) = stale.refresh_token.as_deref() else {
            return Err(CrmError::NotSignedIn);
        };

        let resp = self
            .endpoint
            .request(Method::POST, "/auth/v1/token", None)
            .query(&[("grant_type", "refresh_token")])
            .json(&RefreshGrant { refresh_token })
            .send()
            .await?;
        match check_status(resp).await {
            Ok(resp) => {
                let session = resp.json::<TokenGrant>().await?.into_session();
                tracing::debug!(user = %session.user.email, "session refreshed");
                self.session.set(Some(session.clone()));
                Ok(session)
            }
            Err(CrmError::Remote { status, message }) if (400..500).contains(&status) => {
                tracing::warn!(status, %message, "refresh token rejected");
                self.session.set(None);
                Err(CrmError::Auth(message))
            }
            Err(e) => Err(e),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RestBackend {
    gateway: Arc<Gateway>,
}

impl RestBackend {
    pub fn new(url: &str, anon_key: &str) -> CrmResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("crmdesk/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            gateway: Arc::new(Gateway {
                endpoint: Endpoint {
                    client,
                    base_url: url.trim_end_matches('/').to_string(),
                    anon_key: anon_key.to_string(),
                },
                session: SessionCell::default(),
                refreshing: Mutex::new(()),
            }),
        })
    }

    fn bearer(&self) -> Option<String> {
        self.gateway.session.current().map(|s| s.access_token)
    }

    /// Trades the current refresh token for a new session, publishing it to
    /// subscribers. Table calls do this on their own when the token expires.
    pub async fn refresh_session(&self) -> CrmResult<Session> {
        let current = self.gateway.session.current().ok_or(CrmError::NotSignedIn)?;
        self.gateway.refresh(&current).await
    }
}

impl AuthProvider for RestBackend {
    async fn sign_up(&self, email: &str, password: &str) -> CrmResult<SignUpOutcome> {
        let resp = self
            .gateway
            .request(Method::POST, "/auth/v1/signup", None)
            .json(&Credentials {
                email: email.trim(),
                password,
            })
            .send()
            .await?;
        let body: serde_json::Value = check_auth_status(resp).await?.json().await?;

        if body.get("access_token").is_some_and(|t| !t.is_null()) {
            let session = serde_json::from_value::<TokenGrant>(body)?.into_session();
            self.gateway.session.set(Some(session.clone()));
            return Ok(SignUpOutcome::SignedIn(session));
        }
        tracing::info!(email, "registration awaits email confirmation");
        Ok(SignUpOutcome::ConfirmationRequired {
            email: email.trim().to_string(),
        })
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> CrmResult<Session> {
        let resp = self
            .gateway
            .request(Method::POST, "/auth/v1/token", None)
            .query(&[("grant_type", "password")])
            .json(&Credentials {
                email: email.trim(),
                password,
            })
            .send()
            .await?;
        let session = check_auth_status(resp)
            .await?
            .json::<TokenGrant>()
            .await?
            .into_session();
        self.gateway.session.set(Some(session.clone()));
        Ok(session)
    }

    /// Ends the session remotely, then locally. A token the backend no
    /// longer accepts (401, 403, 404) has nothing left to end remotely, so
    /// the local session is dropped anyway.
    async fn sign_out(&self) -> CrmResult<()> {
        let Some(token) = self.bearer() else {
            return Ok(());
        };
        let resp = self
            .gateway
            .request(Method::POST, "/auth/v1/logout", Some(token.as_str()))
            .send()
            .await?;
        match check_status(resp).await {
            Ok(_) => {}
            Err(CrmError::Remote {
                status: status @ (401 | 403 | 404),
                message,
            }) => tracing::info!(status, %message, "logout rejected, ending the local session"),
            Err(e) => return Err(e),
        }
        self.gateway.session.set(None);
        Ok(())
    }

    async fn get_session(&self) -> CrmResult<Option<Session>> {
        Ok(self.gateway.session.current())
    }

    async fn get_user(&self) -> CrmResult<Option<User>> {
        let Some(token) = self.bearer() else {
            return Ok(None);
        };
        let resp = self
            .gateway
            .request(Method::GET, "/auth/v1/user", Some(token.as_str()))
            .send()
            .await?;
        Ok(Some(check_auth_status(resp).await?.json().await?))
    }

    fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.gateway.session.subscribe()
    }
}

impl DataSource for RestBackend {
    type Workspace = RemoteWorkspace;

    fn workspace(&self, session: &Session) -> Self::Workspace {
        RemoteWorkspace::new(self.gateway.clone(), session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_grant_derives_expiry_from_expires_in() {
        let body = serde_json::json!({
            "access_token": "token",
            "refresh_token": "refresh",
            "expires_in": 3600,
            "user": { "id": Uuid::new_v4(), "email": "ann@example.com" }
        });
        let grant: TokenGrant = serde_json::from_value(body).unwrap();
        let session = grant.into_session();

        assert!(session.expires_at.is_some());
        assert!(!session.expires_within(EXPIRY_MARGIN));
        assert!(session.expires_within(Duration::hours(2)));
    }

    #[test]
    fn token_grant_keeps_server_expiry() {
        let body = serde_json::json!({
            "access_token": "token",
            "expires_in": 3600,
            "expires_at": 1_700_000_000,
            "user": { "id": Uuid::new_v4() }
        });
        let session = serde_json::from_value::<TokenGrant>(body).unwrap().into_session();

        assert_eq!(session.expires_at, Some(1_700_000_000));
        assert!(session.expires_within(EXPIRY_MARGIN));
    }
}
