//! Client for the `/api/gmail` routes (raw mailbox access through the backend)

use async_trait::async_trait;
use reqwest::Method;
use serde::Serialize;
use std::sync::Arc;
use urlencoding::encode;

use crate::config::ApiConfig;
use crate::error::Result;
use crate::http::ApiClient;
use crate::models::{CreatedGmailDraft, Envelope, GmailMessage, GmailMessageList, OutgoingEmail};
use crate::session::SessionProvider;

pub const GMAIL_PREFIX: &str = "/api/gmail";
pub const DEFAULT_GMAIL_QUERY: &str = "is:unread in:inbox";
pub const DEFAULT_GMAIL_MAX_RESULTS: u32 = 20;

#[async_trait]
pub trait GmailApi: Send + Sync {
    /// List messages; `None` falls back to unread inbox, 20 results
    async fn list_emails(
        &self,
        query: Option<String>,
        max_results: Option<u32>,
    ) -> Result<Vec<GmailMessage>>;

    async fn get_email(&self, id: &str) -> Result<GmailMessage>;

    /// Create a Gmail draft, returning its Gmail draft id
    async fn create_draft(&self, email: &OutgoingEmail) -> Result<String>;

    async fn send_email(&self, email: &OutgoingEmail) -> Result<()>;

    /// Ask the backend to subscribe to Gmail push notifications
    async fn watch_emails(&self) -> Result<()>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ListQuery<'a> {
    query: &'a str,
    max_results: u32,
}

pub struct HttpGmailApi {
    api: ApiClient,
}

impl HttpGmailApi {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    pub fn from_config(config: &ApiConfig, session: Arc<dyn SessionProvider>) -> Result<Self> {
        Ok(Self::new(ApiClient::from_config(config, GMAIL_PREFIX, session)?))
    }
}

#[async_trait]
impl GmailApi for HttpGmailApi {
    async fn list_emails(
        &self,
        query: Option<String>,
        max_results: Option<u32>,
    ) -> Result<Vec<GmailMessage>> {
        let params = ListQuery {
            query: query.as_deref().unwrap_or(DEFAULT_GMAIL_QUERY),
            max_results: max_results.unwrap_or(DEFAULT_GMAIL_MAX_RESULTS),
        };
        let list: GmailMessageList = self.api.get_json("emails", &params).await?;
        Ok(list.data)
    }

    async fn get_email(&self, id: &str) -> Result<GmailMessage> {
        let envelope: Envelope<GmailMessage> = self
            .api
            .call_json(Method::GET, &format!("emails/{}", encode(id)))
            .await?;
        Ok(envelope.data)
    }

    async fn create_draft(&self, email: &OutgoingEmail) -> Result<String> {
        let envelope: Envelope<CreatedGmailDraft> = self.api.post_json("drafts", email).await?;
        Ok(envelope.data.draft_id)
    }

    async fn send_email(&self, email: &OutgoingEmail) -> Result<()> {
        self.api
            .call_empty(self.api.request(Method::POST, "send").json(email))
            .await
    }

    async fn watch_emails(&self) -> Result<()> {
        self.api
            .call_empty(self.api.request(Method::POST, "watch"))
            .await
    }
}
