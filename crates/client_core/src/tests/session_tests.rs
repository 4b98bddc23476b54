use super::*;
use crate::{
    config::normalize_server_url,
    mock_server::{spawn_board_server, VALID_TOKEN},
};

async fn auth_client() -> AuthClient {
    let (server_url, _server) = spawn_board_server().await.expect("spawn server");
    AuthClient::new(
        Client::new(),
        normalize_server_url(&server_url).expect("url"),
    )
}

#[test]
fn static_token_reports_configured_credential() {
    assert_eq!(StaticToken::new("abc").bearer_token().as_deref(), Some("abc"));
    assert_eq!(StaticToken::anonymous().bearer_token(), None);
}

#[test]
fn session_tokens_follow_sign_in_and_logout() {
    let session = SessionTokens::new();
    assert!(!session.is_authenticated());

    session.establish(&SignInResponse {
        access: "access-1".into(),
        refresh: "refresh-1".into(),
        user: None,
    });
    assert_eq!(session.bearer_token().as_deref(), Some("access-1"));
    assert_eq!(session.refresh_token().as_deref(), Some("refresh-1"));

    session.clear();
    assert!(!session.is_authenticated());
    assert_eq!(session.refresh_token(), None);
}

#[tokio::test]
async fn sign_up_then_sign_in_issues_tokens() {
    let auth = auth_client().await;
    let credentials = Credentials::new("alice", "hunter2");

    let created = auth.sign_up(&credentials).await.expect("sign up");
    assert_eq!(created.detail.as_deref(), Some("User created."));

    let session = SessionTokens::new();
    auth.sign_in_into(&credentials, &session)
        .await
        .expect("sign in");
    assert_eq!(session.bearer_token().as_deref(), Some(VALID_TOKEN));
}

#[tokio::test]
async fn duplicate_sign_up_is_a_validation_error() {
    let auth = auth_client().await;
    let credentials = Credentials::new("alice", "hunter2");
    auth.sign_up(&credentials).await.expect("first sign up");

    let err = auth
        .sign_up(&credentials)
        .await
        .expect_err("second sign up should fail");
    assert_eq!(
        err,
        BoardError::Validation(Some("Username already exists.".into()))
    );
}

#[tokio::test]
async fn wrong_password_is_unauthorized_and_leaves_session_empty() {
    let auth = auth_client().await;
    auth.sign_up(&Credentials::new("alice", "hunter2"))
        .await
        .expect("sign up");

    let session = SessionTokens::new();
    let err = auth
        .sign_in_into(&Credentials::new("alice", "wrong"), &session)
        .await
        .expect_err("should fail");
    assert_eq!(
        err,
        BoardError::Unauthorized(Some("Invalid credentials.".into()))
    );
    assert!(!session.is_authenticated());
}
