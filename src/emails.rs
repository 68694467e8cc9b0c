//! Client for the `/api/emails` routes

use async_trait::async_trait;
use reqwest::Method;
use std::sync::Arc;
use urlencoding::encode;

use crate::config::ApiConfig;
use crate::error::Result;
use crate::http::ApiClient;
use crate::models::{DeleteResponse, Email, EmailPage, ListEmailsParams, SearchResults, SyncEmailsResponse};
use crate::session::SessionProvider;

pub const EMAILS_PREFIX: &str = "/api/emails";

/// Stored-email operations exposed by the backend
#[async_trait]
pub trait EmailsApi: Send + Sync {
    async fn list_emails(&self, params: &ListEmailsParams) -> Result<EmailPage>;

    async fn get_email(&self, email_id: &str) -> Result<Email>;

    /// Ask the backend to ingest new messages
    async fn sync_emails(&self) -> Result<SyncEmailsResponse>;

    async fn mark_as_read(&self, email_id: &str) -> Result<Email>;

    async fn archive_email(&self, email_id: &str) -> Result<Email>;

    async fn delete_email(&self, email_id: &str) -> Result<DeleteResponse>;

    async fn search_emails(&self, query: &str) -> Result<Vec<Email>>;
}

pub struct HttpEmailsApi {
    api: ApiClient,
}

impl HttpEmailsApi {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    pub fn from_config(config: &ApiConfig, session: Arc<dyn SessionProvider>) -> Result<Self> {
        Ok(Self::new(ApiClient::from_config(config, EMAILS_PREFIX, session)?))
    }
}

#[async_trait]
impl EmailsApi for HttpEmailsApi {
    async fn list_emails(&self, params: &ListEmailsParams) -> Result<EmailPage> {
        self.api.get_json("", params).await
    }

    async fn get_email(&self, email_id: &str) -> Result<Email> {
        self.api.call_json(Method::GET, &encode(email_id)).await
    }

    async fn sync_emails(&self) -> Result<SyncEmailsResponse> {
        self.api.call_json(Method::POST, "sync").await
    }

    async fn mark_as_read(&self, email_id: &str) -> Result<Email> {
        self.api
            .call_json(Method::PATCH, &format!("{}/read", encode(email_id)))
            .await
    }

    async fn archive_email(&self, email_id: &str) -> Result<Email> {
        self.api
            .call_json(Method::POST, &format!("{}/archive", encode(email_id)))
            .await
    }

    async fn delete_email(&self, email_id: &str) -> Result<DeleteResponse> {
        self.api.call_json(Method::DELETE, &encode(email_id)).await
    }

    async fn search_emails(&self, query: &str) -> Result<Vec<Email>> {
        let results: SearchResults = self.api.get_json("search", &[("query", query)]).await?;
        Ok(results.emails)
    }
}
