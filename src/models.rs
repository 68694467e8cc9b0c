use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::error::{ReplyDeskError, Result};

/// A stored message as returned by `/api/emails`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Email {
    pub id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub gmail_id: Option<String>,
    pub thread_id: String,
    pub from: String,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub cc: Option<String>,
    #[serde(default)]
    pub bcc: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub html_body: Option<String>,
    #[serde(default)]
    pub snippet: String,
    #[serde(default, deserialize_with = "deserializers::null_as_default")]
    pub labels: BTreeSet<String>,
    #[serde(default, deserialize_with = "deserializers::null_as_default")]
    pub attachments: Vec<Attachment>,
    #[serde(default)]
    pub is_read: bool,
    #[serde(default)]
    pub is_important: bool,
    pub received_at: DateTime<Utc>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Email {
    pub fn subject_or_placeholder(&self) -> &str {
        self.subject
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or("(no subject)")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub filename: String,
    pub mime_type: String,
    pub size: u64,
    pub attachment_id: String,
}

/// Lifecycle status of a draft. `Sent` and `Discarded` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DraftStatus {
    Draft,
    Sent,
    Discarded,
}

/// Actions that move a draft through its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftAction {
    Edit,
    Send,
    Discard,
}

impl DraftAction {
    fn verb(self) -> &'static str {
        match self {
            DraftAction::Edit => "edit",
            DraftAction::Send => "send",
            DraftAction::Discard => "discard",
        }
    }
}

impl DraftStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, DraftStatus::Draft)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DraftStatus::Draft => "draft",
            DraftStatus::Sent => "sent",
            DraftStatus::Discarded => "discarded",
        }
    }

    /// Apply an action, returning the resulting status.
    ///
    /// Terminal states accept no action at all and yield `Conflict`.
    pub fn transition(self, action: DraftAction) -> Result<DraftStatus> {
        match (self, action) {
            (DraftStatus::Draft, DraftAction::Edit) => Ok(DraftStatus::Draft),
            (DraftStatus::Draft, DraftAction::Send) => Ok(DraftStatus::Sent),
            (DraftStatus::Draft, DraftAction::Discard) => Ok(DraftStatus::Discarded),
            (terminal, action) => Err(ReplyDeskError::Conflict(format!(
                "cannot {} a draft that is already {}",
                action.verb(),
                terminal.as_str()
            ))),
        }
    }
}

impl std::fmt::Display for DraftStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Generation details reported by the backend for a draft
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftMetadata {
    pub model: String,
    #[serde(default)]
    pub intent: Option<String>,
    #[serde(default)]
    pub tone: Option<String>,
    /// Milliseconds spent generating
    #[serde(default)]
    pub processing_time: Option<u64>,
}

/// A candidate reply for one email
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Draft {
    pub id: String,
    pub email_id: String,
    pub user_id: String,
    pub content: String,
    pub confidence_score: f64,
    pub status: DraftStatus,
    #[serde(default)]
    pub metadata: Option<DraftMetadata>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub sent_at: Option<DateTime<Utc>>,
}

impl Draft {
    pub fn is_editable(&self) -> bool {
        !self.status.is_terminal()
    }

    /// Fail with `Conflict` unless `action` is allowed from the current status
    pub fn ensure_can(&self, action: DraftAction) -> Result<()> {
        self.status.transition(action).map(|_| ())
    }

    pub fn confidence_band(&self) -> ConfidenceBand {
        ConfidenceBand::from_score(self.confidence_score)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfidenceBand {
    High,
    Medium,
    Low,
}

impl ConfidenceBand {
    pub fn from_score(score: f64) -> Self {
        if score >= 0.8 {
            ConfidenceBand::High
        } else if score >= 0.6 {
            ConfidenceBand::Medium
        } else {
            ConfidenceBand::Low
        }
    }
}

/// Backend reply that carries either a single item or a list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> OneOrMany<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::Many(items) => items,
            OneOrMany::One(item) => vec![item],
        }
    }
}

/// Analysis of the source email returned alongside generated drafts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftAnalysis {
    pub intent: String,
    pub tone: String,
    #[serde(default)]
    pub key_points: Vec<String>,
    pub strategy: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateDraftRequest {
    pub email_id: String,
    pub variations: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerateDraftResponse {
    #[serde(default)]
    pub success: bool,
    pub data: OneOrMany<Draft>,
    #[serde(default)]
    pub analysis: Option<DraftAnalysis>,
}

/// Drafts in generation order plus the optional analysis
#[derive(Debug, Clone)]
pub struct GeneratedDrafts {
    pub drafts: Vec<Draft>,
    pub analysis: Option<DraftAnalysis>,
}

impl From<GenerateDraftResponse> for GeneratedDrafts {
    fn from(response: GenerateDraftResponse) -> Self {
        Self {
            drafts: response.data.into_vec(),
            analysis: response.analysis,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UpdateDraftRequest {
    pub content: String,
}

/// `{ success, data }` wrapper used by the drafts and gmail routes
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
    #[serde(default)]
    pub success: bool,
    pub data: T,
}

/// Query parameters for `GET /api/emails`
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListEmailsParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_results: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailPage {
    #[serde(default)]
    pub emails: Vec<Email>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchResults {
    #[serde(default)]
    pub emails: Vec<Email>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncEmailsResponse {
    #[serde(default)]
    pub success: bool,
    pub synced_count: u64,
    #[serde(default)]
    pub emails: Vec<Email>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeleteResponse {
    #[serde(default)]
    pub success: bool,
}

/// Folder tabs of the inbox view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FolderTab {
    #[default]
    Inbox,
    Drafts,
    Sent,
}

impl FolderTab {
    /// Gmail search query backing this tab
    pub fn query(self) -> &'static str {
        match self {
            FolderTab::Inbox => "is:unread in:inbox",
            FolderTab::Drafts => "in:drafts",
            FolderTab::Sent => "in:sent",
        }
    }
}

impl std::str::FromStr for FolderTab {
    type Err = ReplyDeskError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "inbox" => Ok(FolderTab::Inbox),
            "drafts" => Ok(FolderTab::Drafts),
            "sent" => Ok(FolderTab::Sent),
            other => Err(ReplyDeskError::ValidationError(format!(
                "unknown folder '{}', expected inbox, drafts or sent",
                other
            ))),
        }
    }
}

/// Message shape served by the `/api/gmail` routes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GmailMessage {
    pub id: String,
    pub gmail_id: String,
    pub thread_id: String,
    pub subject: String,
    pub from_email: String,
    pub to_email: String,
    #[serde(default)]
    pub body_plain: Option<String>,
    #[serde(default)]
    pub body_html: Option<String>,
    pub received_at: DateTime<Utc>,
    #[serde(default)]
    pub is_processed: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GmailMessageList {
    #[serde(default)]
    pub success: bool,
    pub data: Vec<GmailMessage>,
    #[serde(default)]
    pub count: usize,
}

/// An email composed on the client, used for Gmail drafts and direct sends
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub thread_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedGmailDraft {
    pub draft_id: String,
}

pub mod deserializers {
    use serde::{Deserialize, Deserializer};

    /// Treat an explicit JSON `null` like a missing field
    pub fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: Default + Deserialize<'de>,
    {
        Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
    }
}
