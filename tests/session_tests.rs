//! Session sources feeding the Authorization header

use chrono::{Duration, Utc};
use reply_desk::config::Config;
use reply_desk::notify::RecordingNotifier;
use reply_desk::session::{ChainedSession, FileSessionStore, Session, ACCESS_TOKEN_ENV};
use reply_desk::{FolderTab, ReplyDesk, ReplyDeskError};
use serde_json::json;
use serial_test::serial;
use std::sync::Arc;
use tempfile::TempDir;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn backend_accepting(token: &str) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/emails"))
        .and(header("authorization", format!("Bearer {}", token).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "emails": [] })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/emails"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "error": "No token provided" })))
        .mount(&server)
        .await;
    server
}

fn desk(server: &MockServer, token_file: &std::path::Path) -> ReplyDesk {
    let mut config = Config::default();
    config.api.base_url = server.uri();
    config.session.token_file = token_file.to_path_buf();
    ReplyDesk::new(config, Arc::new(RecordingNotifier::new())).unwrap()
}

#[tokio::test]
#[serial]
async fn test_token_file_is_used_when_env_is_unset() {
    std::env::remove_var(ACCESS_TOKEN_ENV);
    let dir = TempDir::new().unwrap();
    let token_file = dir.path().join("session.json");
    FileSessionStore::new(&token_file)
        .save(&Session::new("file-token"))
        .await
        .unwrap();

    let server = backend_accepting("file-token").await;
    desk(&server, &token_file)
        .mailbox()
        .list_folder(FolderTab::Inbox)
        .await
        .unwrap();
}

#[tokio::test]
#[serial]
async fn test_env_token_takes_precedence_over_file() {
    let dir = TempDir::new().unwrap();
    let token_file = dir.path().join("session.json");
    FileSessionStore::new(&token_file)
        .save(&Session::new("file-token"))
        .await
        .unwrap();
    std::env::set_var(ACCESS_TOKEN_ENV, "env-token");

    let server = backend_accepting("env-token").await;
    let result = desk(&server, &token_file)
        .mailbox()
        .list_folder(FolderTab::Inbox)
        .await;
    std::env::remove_var(ACCESS_TOKEN_ENV);
    result.unwrap();
}

#[tokio::test]
#[serial]
async fn test_expired_session_is_sent_without_token() {
    std::env::remove_var(ACCESS_TOKEN_ENV);
    let dir = TempDir::new().unwrap();
    let token_file = dir.path().join("session.json");
    let mut session = Session::new("old-token");
    session.expires_at = Some(Utc::now() - Duration::hours(1));
    FileSessionStore::new(&token_file).save(&session).await.unwrap();

    let server = backend_accepting("old-token").await;
    let err = desk(&server, &token_file)
        .mailbox()
        .list_folder(FolderTab::Inbox)
        .await
        .unwrap_err();
    assert!(matches!(err, ReplyDeskError::AuthError(_)));
}

#[tokio::test]
#[serial]
async fn test_chained_session_reports_absent_without_sources() {
    use reply_desk::SessionProvider;

    std::env::remove_var(ACCESS_TOKEN_ENV);
    let dir = TempDir::new().unwrap();
    let chained = ChainedSession::new(dir.path().join("missing.json"));
    assert!(chained.current_session().await.unwrap().is_none());
}
