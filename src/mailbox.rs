//! Email queries and mutations over the emails and gmail clients
//!
//! Listings are cached per filter under the `emails` namespace. Every
//! mutation that can change what a listing shows invalidates the whole
//! namespace, so each open view refetches on its next read.

use std::sync::Arc;
use tracing::{debug, info};

use crate::cache::{QueryCache, QueryKey, EMAILS_NAMESPACE};
use crate::emails::EmailsApi;
use crate::error::Result;
use crate::gmail::GmailApi;
use crate::models::{Email, EmailPage, FolderTab, GmailMessage, ListEmailsParams, OutgoingEmail};
use crate::notify::{report_failure, Notifier};

pub struct Mailbox {
    emails: Arc<dyn EmailsApi>,
    gmail: Arc<dyn GmailApi>,
    cache: Arc<QueryCache>,
    notifier: Arc<dyn Notifier>,
    max_results: u32,
}

impl Mailbox {
    pub fn new(
        emails: Arc<dyn EmailsApi>,
        gmail: Arc<dyn GmailApi>,
        cache: Arc<QueryCache>,
        notifier: Arc<dyn Notifier>,
        max_results: u32,
    ) -> Self {
        Self {
            emails,
            gmail,
            cache,
            notifier,
            max_results,
        }
    }

    pub fn max_results(&self) -> u32 {
        self.max_results
    }

    /// Emails matching a Gmail-style query
    pub async fn list(&self, query: &str, max_results: Option<u32>) -> Result<EmailPage> {
        let max_results = max_results.unwrap_or(self.max_results);
        let params = ListEmailsParams {
            query: Some(query.to_string()),
            max_results: Some(max_results),
            page_token: None,
        };

        let emails = Arc::clone(&self.emails);
        let result = self
            .cache
            .fetch(QueryKey::email_list(query, max_results), || async move {
                emails.list_emails(&params).await
            })
            .await;
        report_failure(self.notifier.as_ref(), "Failed to load emails", result)
    }

    pub async fn list_folder(&self, tab: FolderTab) -> Result<EmailPage> {
        self.list(tab.query(), None).await
    }

    /// Drop the cached listing for `query` and load it again
    pub async fn refresh(&self, query: &str, max_results: Option<u32>) -> Result<EmailPage> {
        let max = max_results.unwrap_or(self.max_results);
        self.cache.invalidate(&QueryKey::email_list(query, max));
        self.list(query, Some(max)).await
    }

    /// Last listing stored for `query`, even if stale
    pub fn cached_list(&self, query: &str, max_results: Option<u32>) -> Option<EmailPage> {
        let max = max_results.unwrap_or(self.max_results);
        self.cache.peek(&QueryKey::email_list(query, max))
    }

    pub async fn email(&self, id: &str) -> Result<Email> {
        let emails = Arc::clone(&self.emails);
        let result = self
            .cache
            .fetch(QueryKey::email(id), || async move { emails.get_email(id).await })
            .await;
        report_failure(self.notifier.as_ref(), "Failed to fetch email", result)
    }

    /// Trigger backend ingestion. Returns how many emails were imported.
    pub async fn sync(&self) -> Result<u64> {
        let result = self.emails.sync_emails().await;
        let response = report_failure(self.notifier.as_ref(), "Failed to sync emails", result)?;

        let count = response.synced_count;
        self.notifier
            .success(&format!("Synced {} new emails", count));
        info!("Sync imported {} emails", count);
        // listings are refreshed even when nothing new arrived
        self.cache.invalidate(&QueryKey::namespace(EMAILS_NAMESPACE));
        Ok(count)
    }

    pub async fn mark_read(&self, id: &str) -> Result<Email> {
        let result = self.emails.mark_as_read(id).await;
        let email = report_failure(self.notifier.as_ref(), "Failed to mark email as read", result)?;
        self.invalidate_email(id);
        Ok(email)
    }

    pub async fn archive(&self, id: &str) -> Result<Email> {
        let result = self.emails.archive_email(id).await;
        let email = report_failure(self.notifier.as_ref(), "Failed to archive email", result)?;
        self.notifier.success("Email archived");
        self.invalidate_email(id);
        Ok(email)
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        let result = self.emails.delete_email(id).await;
        report_failure(self.notifier.as_ref(), "Failed to delete email", result)?;
        self.notifier.success("Email deleted");
        self.invalidate_email(id);
        Ok(())
    }

    /// Search is never cached
    pub async fn search(&self, query: &str) -> Result<Vec<Email>> {
        debug!("Searching emails for '{}'", query);
        let result = self.emails.search_emails(query).await;
        report_failure(self.notifier.as_ref(), "Failed to search emails", result)
    }

    pub async fn gmail_list(
        &self,
        query: Option<&str>,
        max_results: Option<u32>,
    ) -> Result<Vec<GmailMessage>> {
        let query = query.unwrap_or(crate::gmail::DEFAULT_GMAIL_QUERY).to_string();
        let max_results = max_results.unwrap_or(crate::gmail::DEFAULT_GMAIL_MAX_RESULTS);

        let gmail = Arc::clone(&self.gmail);
        let key = QueryKey::gmail_list(&query, max_results);
        let result = self
            .cache
            .fetch(key, || async move {
                gmail.list_emails(Some(query), Some(max_results)).await
            })
            .await;
        report_failure(self.notifier.as_ref(), "Failed to fetch emails", result)
    }

    pub async fn gmail_email(&self, id: &str) -> Result<GmailMessage> {
        let gmail = Arc::clone(&self.gmail);
        let result = self
            .cache
            .fetch(QueryKey::gmail_email(id), || async move { gmail.get_email(id).await })
            .await;
        report_failure(self.notifier.as_ref(), "Failed to fetch email", result)
    }

    /// Create a draft directly in Gmail, returning the Gmail draft id
    pub async fn create_gmail_draft(&self, email: &OutgoingEmail) -> Result<String> {
        let result = self.gmail.create_draft(email).await;
        let draft_id = report_failure(self.notifier.as_ref(), "Failed to create draft", result)?;
        self.notifier.success("Draft created successfully");
        self.cache.invalidate(&QueryKey::namespace(EMAILS_NAMESPACE));
        Ok(draft_id)
    }

    pub async fn send_gmail(&self, email: &OutgoingEmail) -> Result<()> {
        let result = self.gmail.send_email(email).await;
        report_failure(self.notifier.as_ref(), "Failed to send email", result)?;
        self.notifier.success("Email sent successfully");
        self.cache.invalidate(&QueryKey::namespace(EMAILS_NAMESPACE));
        Ok(())
    }

    pub async fn watch(&self) -> Result<()> {
        let result = self.gmail.watch_emails().await;
        report_failure(self.notifier.as_ref(), "Failed to enable Gmail sync", result)?;
        self.notifier.success("Gmail sync enabled");
        Ok(())
    }

    fn invalidate_email(&self, id: &str) {
        self.cache.invalidate(&QueryKey::namespace(EMAILS_NAMESPACE));
        self.cache.invalidate(&QueryKey::email(id));
    }
}
