//! Client for the `/api/drafts` routes

use async_trait::async_trait;
use reqwest::Method;
use std::sync::Arc;
use urlencoding::encode;

use crate::config::ApiConfig;
use crate::error::{ReplyDeskError, Result};
use crate::http::{ApiClient, IDEMPOTENCY_KEY_HEADER};
use crate::models::{
    Draft, Envelope, GenerateDraftRequest, GenerateDraftResponse, GeneratedDrafts,
    UpdateDraftRequest,
};
use crate::session::SessionProvider;

pub const DRAFTS_PREFIX: &str = "/api/drafts";

/// AI draft operations exposed by the backend
#[async_trait]
pub trait DraftsApi: Send + Sync {
    /// Generate `variations` candidate replies, returned in generation order
    async fn generate_drafts(&self, email_id: &str, variations: u32) -> Result<GeneratedDrafts>;

    async fn get_drafts(&self, email_id: &str) -> Result<Vec<Draft>>;

    async fn update_draft(&self, draft_id: &str, content: &str) -> Result<Draft>;

    async fn delete_draft(&self, draft_id: &str) -> Result<()>;

    /// Send the draft. `idempotency_key` is unique per user-initiated attempt.
    async fn send_draft(&self, draft_id: &str, idempotency_key: &str) -> Result<()>;
}

pub struct HttpDraftsApi {
    api: ApiClient,
}

impl HttpDraftsApi {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    pub fn from_config(config: &ApiConfig, session: Arc<dyn SessionProvider>) -> Result<Self> {
        Ok(Self::new(ApiClient::from_config(config, DRAFTS_PREFIX, session)?))
    }
}

#[async_trait]
impl DraftsApi for HttpDraftsApi {
    async fn generate_drafts(&self, email_id: &str, variations: u32) -> Result<GeneratedDrafts> {
        if variations == 0 {
            return Err(ReplyDeskError::ValidationError(
                "variations must be at least 1".to_string(),
            ));
        }

        let request = GenerateDraftRequest {
            email_id: email_id.to_string(),
            variations,
        };
        let response: GenerateDraftResponse = self.api.post_json("generate", &request).await?;
        Ok(response.into())
    }

    async fn get_drafts(&self, email_id: &str) -> Result<Vec<Draft>> {
        let envelope: Envelope<Vec<Draft>> =
            self.api.call_json(Method::GET, &encode(email_id)).await?;
        Ok(envelope.data)
    }

    async fn update_draft(&self, draft_id: &str, content: &str) -> Result<Draft> {
        let request = UpdateDraftRequest {
            content: content.to_string(),
        };
        let envelope: Envelope<Draft> = self.api.put_json(&encode(draft_id), &request).await?;
        Ok(envelope.data)
    }

    async fn delete_draft(&self, draft_id: &str) -> Result<()> {
        self.api
            .call_empty(self.api.request(Method::DELETE, &encode(draft_id)))
            .await
    }

    async fn send_draft(&self, draft_id: &str, idempotency_key: &str) -> Result<()> {
        let request = self
            .api
            .request(Method::POST, &format!("{}/send", encode(draft_id)))
            .header(IDEMPOTENCY_KEY_HEADER, idempotency_key);
        self.api.call_empty(request).await
    }
}
