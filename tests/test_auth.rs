//! Integration tests for registration, login and the session gate.
//!
//! Tests cover:
//! - Registration with and without email confirmation
//! - Credential checks and their inline messages
//! - Session changes published to subscribers
//! - The gate entering and leaving the application on session events

mod common;

use common::*;
use crmdesk::crm::{
    gate::{self, AuthAction, AuthReply, CONFIRMATION_SENT, Gate, GateState, InlineMessage},
    shell,
};

async fn confirming_store() -> (LocalStore, tempfile::TempDir) {
    let dir = tempfile::TempDir::new().expect("Failed to create temp directory");
    let store = LocalStore::open(dir.path().join("auth.db"))
        .await
        .expect("Failed to open test store");
    (store, dir)
}

#[tokio::test]
async fn test_registration_requires_confirmation() -> anyhow::Result<()> {
    let (store, _temp_dir) = confirming_store().await;

    // 1. Sign-up does not open a session
    let outcome = store.sign_up(" new@example.com ", TEST_PASSWORD).await?;
    assert_eq!(
        outcome,
        SignUpOutcome::ConfirmationRequired {
            email: "new@example.com".into()
        }
    );
    assert!(store.get_session().await?.is_none());

    // 2. Login is refused until confirmed
    let err = store
        .sign_in_with_password("new@example.com", TEST_PASSWORD)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Email not confirmed");

    // 3. Confirm and log in
    store.confirm_email("new@example.com").await?;
    let session = store.sign_in_with_password("new@example.com", TEST_PASSWORD).await?;
    assert_eq!(session.user.email, "new@example.com");
    assert_eq!(store.get_session().await?, Some(session.clone()));
    assert_eq!(store.get_user().await?.map(|u| u.id), Some(session.user_id()));

    Ok(())
}

#[tokio::test]
async fn test_confirming_unknown_email_fails() -> anyhow::Result<()> {
    let (store, _temp_dir) = confirming_store().await;
    assert!(store.confirm_email("ghost@example.com").await.unwrap_err().is_not_found());
    Ok(())
}

#[tokio::test]
async fn test_credential_checks() -> anyhow::Result<()> {
    let (store, _temp_dir) = create_test_store().await;

    let err = store.sign_up("not-an-email", TEST_PASSWORD).await.unwrap_err();
    assert!(matches!(err, CrmError::Auth(_)));

    let err = store.sign_up("short@example.com", "12345").await.unwrap_err();
    assert_eq!(err.to_string(), "Password should be at least 6 characters");

    sign_up(&store, "taken@example.com").await;
    let err = store.sign_up("taken@example.com", TEST_PASSWORD).await.unwrap_err();
    assert_eq!(err.to_string(), "User already registered");

    let err = store
        .sign_in_with_password("taken@example.com", "wrong-password")
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Invalid login credentials");

    let err = store
        .sign_in_with_password("nobody@example.com", TEST_PASSWORD)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Invalid login credentials");

    Ok(())
}

#[tokio::test]
async fn test_session_changes_are_published() -> anyhow::Result<()> {
    let (store, _temp_dir) = create_test_store().await;
    let mut sessions = store.subscribe();
    assert!(sessions.borrow_and_update().is_none());

    // 1. Auto-confirmed sign-up opens a session
    let ws = sign_up(&store, "owner@example.com").await;
    sessions.changed().await?;
    let current = sessions.borrow_and_update().clone();
    assert_eq!(current.map(|s| s.user_id()), Some(ws.user_id()));

    // 2. Logout ends it
    assert!(shell::logout(&store).await.is_none());
    sessions.changed().await?;
    assert!(sessions.borrow_and_update().is_none());
    assert!(store.get_user().await?.is_none());

    Ok(())
}

#[tokio::test]
async fn test_authenticate_replies() -> anyhow::Result<()> {
    let (store, _temp_dir) = confirming_store().await;
    let credentials = gate::Credentials {
        email: "new@example.com".into(),
        password: TEST_PASSWORD.into(),
    };

    let reply = gate::authenticate(&store, AuthAction::SignUp, credentials.clone()).await;
    assert_eq!(reply, AuthReply::ConfirmationSent);

    let reply = gate::authenticate(&store, AuthAction::SignIn, credentials.clone()).await;
    assert_eq!(reply, AuthReply::Failed(AuthAction::SignIn, "Email not confirmed".into()));

    store.confirm_email("new@example.com").await?;
    let reply = gate::authenticate(&store, AuthAction::SignIn, credentials).await;
    assert_eq!(reply, AuthReply::Accepted);

    Ok(())
}

#[tokio::test]
async fn test_gate_follows_session_events() -> anyhow::Result<()> {
    let (store, _temp_dir) = confirming_store().await;
    let mut gate = Gate::default();
    assert_eq!(gate.state(), &GateState::Starting);

    // 1. No stored session: login form
    assert!(!gate.bootstrap(store.get_session().await));
    assert!(matches!(gate.state(), GateState::SignedOut(_)));

    // 2. Registration answers inline, the form stays
    let form = gate.form_mut().unwrap();
    form.email = "new@example.com".into();
    form.password = TEST_PASSWORD.into();
    let credentials = gate.submit(AuthAction::SignUp).unwrap();
    assert!(gate.submit(AuthAction::SignUp).is_none(), "a busy form ignores resubmits");
    gate.on_reply(gate::authenticate(&store, AuthAction::SignUp, credentials).await);
    let form = gate.form_mut().unwrap();
    assert_eq!(form.message, Some(InlineMessage::Info(CONFIRMATION_SENT.into())));
    assert!(!form.busy);

    // 3. Login succeeds; the gate only moves on the session event
    store.confirm_email("new@example.com").await?;
    let credentials = gate.submit(AuthAction::SignIn).unwrap();
    gate.on_reply(gate::authenticate(&store, AuthAction::SignIn, credentials).await);
    assert!(matches!(gate.state(), GateState::SignedOut(_)));
    let session = store.subscribe().borrow().clone();
    assert!(gate.on_session(session));
    assert!(gate.session().is_some());

    // 4. Logout brings back an empty form
    store.sign_out().await?;
    let session = store.subscribe().borrow().clone();
    assert!(!gate.on_session(session));
    let form = gate.form_mut().unwrap();
    assert!(form.email.is_empty());
    assert!(form.message.is_none());

    Ok(())
}

#[tokio::test]
async fn test_gate_rejects_empty_fields() {
    let mut gate = Gate::default();
    gate.on_session(None);

    assert!(gate.submit(AuthAction::SignIn).is_none());
    let form = gate.form_mut().unwrap();
    assert_eq!(
        form.message,
        Some(InlineMessage::Error("Please enter both email and password.".into()))
    );
    assert!(!form.busy);
}
