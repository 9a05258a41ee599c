use chrono::{Duration as ChronoDuration, NaiveDate, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};
use medicai_session::{
    Credential, RegistrationRequest, Session, SessionError, SessionManager, SessionStatus,
    TokenClock,
};
use serde_json::json;
use std::sync::atomic::Ordering;

use crate::common::{DOCTOR_EMAIL, DOCTOR_PASSWORD, MockApiServer, test_client, test_config};

#[tokio::test]
async fn test_login_over_http() {
    // Given a running backend
    let server = MockApiServer::start().await;
    let (session, _gateway, store) = test_client(&server);

    // When logging in with valid credentials
    let user = session.login(DOCTOR_EMAIL, DOCTOR_PASSWORD).await.unwrap();

    // Then the profile came from /auth/me and the credential is stored
    assert_eq!(user.email, DOCTOR_EMAIL);
    assert_eq!(user.full_name(), "Gregory House");
    assert_eq!(session.status(), SessionStatus::Authenticated);
    assert!(store.load().await.unwrap().is_some());
    assert_eq!(server.state.token_calls.load(Ordering::SeqCst), 1);
    assert_eq!(server.state.me_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_login_with_wrong_password() {
    let server = MockApiServer::start().await;
    let (session, _gateway, store) = test_client(&server);

    let result = session.login(DOCTOR_EMAIL, "not-the-password").await;

    assert!(matches!(result, Err(SessionError::InvalidCredentials)));
    assert_eq!(session.session(), anonymous());
    assert_eq!(store.load().await.unwrap(), None);
    assert_eq!(server.state.me_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_login_with_backend_down() {
    // Given a server that has gone away
    let server = MockApiServer::start().await;
    let (session, _gateway, _store) = test_client(&server);
    drop(server);

    // When logging in
    let result = session.login(DOCTOR_EMAIL, DOCTOR_PASSWORD).await;

    // Then the failure is classified as a network problem
    assert!(matches!(result, Err(SessionError::NetworkUnreachable(_))));
    assert_eq!(session.status(), SessionStatus::Anonymous);
}

#[tokio::test]
async fn test_validate_on_startup_restores_session() {
    // Given a credential persisted by an earlier client sharing the store
    let server = MockApiServer::start().await;
    let (first, _gateway, store) = test_client(&server);
    first.login(DOCTOR_EMAIL, DOCTOR_PASSWORD).await.unwrap();

    // When a new session manager starts on the same store
    let restarted = SessionManager::from_config(&test_config(&server), store.clone()).unwrap();
    let session = restarted.validate_on_startup().await;

    // Then it is authenticated without logging in again
    assert_eq!(session.status, SessionStatus::Authenticated);
    assert_eq!(session.user.map(|u| u.email), Some(DOCTOR_EMAIL.to_string()));
    assert_eq!(server.state.token_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_validate_on_startup_with_revoked_token() {
    // Given a stored token the backend no longer accepts
    let server = MockApiServer::start().await;
    let (first, _gateway, store) = test_client(&server);
    first.login(DOCTOR_EMAIL, DOCTOR_PASSWORD).await.unwrap();
    server.state.expire_access_tokens();

    // When validating on startup
    let restarted = SessionManager::from_config(&test_config(&server), store.clone()).unwrap();
    let session = restarted.validate_on_startup().await;

    // Then the stored credential is discarded
    assert_eq!(session, anonymous());
    assert_eq!(store.load().await.unwrap(), None);
}

#[tokio::test]
async fn test_validate_on_startup_with_locally_expired_token() {
    // Given a stored token whose exp is an hour in the past
    let server = MockApiServer::start().await;
    let (session, _gateway, store) = test_client(&server);
    let expired = encode(
        &Header::default(),
        &json!({ "sub": "1", "exp": (Utc::now() - ChronoDuration::hours(1)).timestamp() }),
        &EncodingKey::from_secret(b"any-secret"),
    )
    .unwrap();
    store.save(&Credential::new(expired, None)).await.unwrap();

    // When validating on startup
    let validated = session.validate_on_startup().await;

    // Then no request reached /auth/me and the store is empty
    assert_eq!(validated, anonymous());
    assert_eq!(store.load().await.unwrap(), None);
    assert_eq!(server.state.me_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_login_logout_validate_is_anonymous() {
    let server = MockApiServer::start().await;
    let (session, _gateway, store) = test_client(&server);

    session.login(DOCTOR_EMAIL, DOCTOR_PASSWORD).await.unwrap();
    session.logout().await.unwrap();
    let restarted = SessionManager::from_config(&test_config(&server), store.clone()).unwrap();
    let validated = restarted.validate_on_startup().await;

    assert_eq!(validated, anonymous());
    assert_eq!(session.session(), anonymous());
}

#[tokio::test]
async fn test_refresh_over_http_replaces_credential() {
    let server = MockApiServer::start().await;
    let (session, _gateway, store) = test_client(&server);
    session.login(DOCTOR_EMAIL, DOCTOR_PASSWORD).await.unwrap();
    let before = store.load().await.unwrap().unwrap();

    let refreshed = session.refresh().await.unwrap();

    assert_ne!(refreshed, before);
    assert_eq!(store.load().await.unwrap(), Some(refreshed.clone()));
    let clock = TokenClock::default();
    assert!(clock.expiry_of(refreshed.access_token()).is_ok());
    assert_eq!(session.status(), SessionStatus::Authenticated);
}

#[tokio::test]
async fn test_refresh_rejected_closes_session() {
    let server = MockApiServer::start().await;
    let (session, _gateway, store) = test_client(&server);
    session.login(DOCTOR_EMAIL, DOCTOR_PASSWORD).await.unwrap();
    server.state.refresh_ok.store(false, Ordering::SeqCst);

    let result = session.refresh().await;

    assert!(matches!(result, Err(SessionError::RefreshFailed(_))));
    assert_eq!(session.session(), anonymous());
    assert_eq!(store.load().await.unwrap(), None);
}

#[tokio::test]
async fn test_register_maps_field_errors() {
    // Given a registration with a too-short license number
    let server = MockApiServer::start().await;
    let (session, _gateway, _store) = test_client(&server);
    let request = registration("cameron@example.org", "ML1");

    // When registering
    let result = session.register(&request).await;

    // Then the error names the medical_license_number field
    match result {
        Err(SessionError::Validation(errors)) => {
            assert_eq!(
                errors.field("medical_license_number"),
                Some("String should have at least 5 characters")
            );
        }
        other => panic!("expected validation error, got {other:?}"),
    }
    assert_eq!(session.status(), SessionStatus::Anonymous);
}

#[tokio::test]
async fn test_register_duplicate_email_is_single_message() {
    let server = MockApiServer::start().await;
    let (session, _gateway, _store) = test_client(&server);

    let result = session.register(&registration(DOCTOR_EMAIL, "ML-12345")).await;

    match result {
        Err(SessionError::Validation(errors)) => {
            assert_eq!(errors.to_string(), "Email already registered");
            assert_eq!(errors.field("email"), None);
        }
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_register_success_does_not_log_in() {
    let server = MockApiServer::start().await;
    let (session, _gateway, store) = test_client(&server);

    let user = session
        .register(&registration("cameron@example.org", "ML-99999"))
        .await
        .unwrap();

    assert_eq!(user.email, "cameron@example.org");
    assert_eq!(user.extra["medical_license_number"], "ML-99999");
    assert_eq!(session.status(), SessionStatus::Anonymous);
    assert_eq!(store.load().await.unwrap(), None::<Credential>);
}

fn registration(email: &str, license: &str) -> RegistrationRequest {
    RegistrationRequest::resident(
        email,
        "Secret123",
        "Allison",
        "Cameron",
        license,
        NaiveDate::from_ymd_opt(1990, 5, 17).unwrap(),
        "+15551234567",
        "Immunology",
    )
}

fn anonymous() -> Session {
    Session {
        user: None,
        status: SessionStatus::Anonymous,
    }
}
