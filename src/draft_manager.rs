//! Draft queries and mutations with their cache and notification side effects
use crate::cache::{QueryCache, QueryKey, EMAILS_NAMESPACE};
use crate::drafts::DraftsApi;
use crate::error::{ReplyDeskError, Result};
use crate::models::{Draft, DraftAction, GeneratedDrafts};
use crate::notify::{report_failure, Notifier};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info};
use uuid::Uuid;

/// Result of a save request
#[derive(Debug, Clone, PartialEq)]
pub enum SaveOutcome {
    /// Content matched what is stored; nothing was sent
    Unchanged,
    Saved(Draft),
}

/// Owns every draft operation: generate, list, update, delete, send
pub struct DraftManager {
    api: Arc<dyn DraftsApi>,
    cache: Arc<QueryCache>,
    notifier: Arc<dyn Notifier>,
    sends_in_flight: Arc<Mutex<HashSet<String>>>,
    /// Idempotency key per draft, kept across retries until a send settles
    send_keys: Mutex<HashMap<String, String>>,
}

/// Removes a draft id from the in-flight set when dropped
struct InFlightSend {
    draft_id: String,
    set: Arc<Mutex<HashSet<String>>>,
}

impl Drop for InFlightSend {
    fn drop(&mut self) {
        self.set
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.draft_id);
    }
}

impl DraftManager {
    pub fn new(
        api: Arc<dyn DraftsApi>,
        cache: Arc<QueryCache>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            api,
            cache,
            notifier,
            sends_in_flight: Arc::new(Mutex::new(HashSet::new())),
            send_keys: Mutex::new(HashMap::new()),
        }
    }

    /// Request `variations` new drafts for an email.
    ///
    /// Drafts come back in generation order, not ranked by confidence.
    pub async fn generate(&self, email_id: &str, variations: u32) -> Result<GeneratedDrafts> {
        let result = if variations == 0 {
            Err(ReplyDeskError::ValidationError(
                "variations must be at least 1".to_string(),
            ))
        } else {
            self.api.generate_drafts(email_id, variations).await
        };
        let generated = report_failure(self.notifier.as_ref(), "Failed to generate draft", result)?;

        if generated.drafts.len() == 1 {
            self.notifier.success("Draft generated successfully");
        } else {
            self.notifier.success(&format!(
                "Generated {} draft variations",
                generated.drafts.len()
            ));
        }
        info!(
            "Generated {} drafts for email {}",
            generated.drafts.len(),
            email_id
        );
        self.cache.invalidate(&QueryKey::drafts(email_id));
        Ok(generated)
    }

    /// Drafts stored for an email. An empty id disables the query.
    pub async fn drafts(&self, email_id: &str) -> Result<Vec<Draft>> {
        if email_id.is_empty() {
            return Ok(Vec::new());
        }

        let api = Arc::clone(&self.api);
        let result = self
            .cache
            .fetch(QueryKey::drafts(email_id), || async move {
                api.get_drafts(email_id).await
            })
            .await;
        report_failure(self.notifier.as_ref(), "Failed to fetch drafts", result)
    }

    /// Persist new content for a draft still in `draft` status
    pub async fn update(&self, draft: &Draft, content: &str) -> Result<SaveOutcome> {
        let result = match draft.ensure_can(DraftAction::Edit) {
            Ok(()) if draft.content == content => {
                debug!("Draft {} unchanged, skipping save", draft.id);
                return Ok(SaveOutcome::Unchanged);
            }
            Ok(()) => self.api.update_draft(&draft.id, content).await,
            Err(e) => Err(e),
        };
        let updated = report_failure(self.notifier.as_ref(), "Failed to update draft", result)?;

        self.notifier.success("Draft updated");
        self.cache.invalidate(&QueryKey::drafts(&draft.email_id));
        Ok(SaveOutcome::Saved(updated))
    }

    pub async fn delete(&self, draft: &Draft) -> Result<()> {
        let result = match draft.ensure_can(DraftAction::Discard) {
            Ok(()) => self.api.delete_draft(&draft.id).await,
            Err(e) => Err(e),
        };
        report_failure(self.notifier.as_ref(), "Failed to delete draft", result)?;

        self.notifier.success("Draft deleted");
        self.cache.invalidate(&QueryKey::drafts(&draft.email_id));
        Ok(())
    }

    /// Send a draft. Terminal drafts and drafts already being sent are
    /// refused with `Conflict` before any request is made.
    ///
    /// A retry after a transient failure reuses the previous idempotency
    /// key, since the first request may already have reached the backend.
    pub async fn send(&self, draft: &Draft) -> Result<()> {
        let result = match self.begin_send(draft) {
            Ok(guard) => {
                let idempotency_key = self.send_key(&draft.id);
                debug!("Sending draft {} with key {}", draft.id, idempotency_key);
                let result = self.api.send_draft(&draft.id, &idempotency_key).await;
                match result {
                    Err(ref e) if e.is_transient() => {
                        debug!("Keeping key {} for a retry of draft {}", idempotency_key, draft.id)
                    }
                    _ => self.settle_send_key(&draft.id),
                }
                drop(guard);
                result
            }
            Err(e) => Err(e),
        };
        report_failure(self.notifier.as_ref(), "Failed to send email", result)?;

        self.notifier.success("Email sent successfully");
        info!("Sent draft {} for email {}", draft.id, draft.email_id);
        self.cache.invalidate(&QueryKey::drafts(&draft.email_id));
        self.cache.invalidate(&QueryKey::namespace(EMAILS_NAMESPACE));
        Ok(())
    }

    fn begin_send(&self, draft: &Draft) -> Result<InFlightSend> {
        draft.ensure_can(DraftAction::Send)?;

        let mut in_flight = self
            .sends_in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if !in_flight.insert(draft.id.clone()) {
            return Err(ReplyDeskError::Conflict(format!(
                "draft {} is already being sent",
                draft.id
            )));
        }
        Ok(InFlightSend {
            draft_id: draft.id.clone(),
            set: Arc::clone(&self.sends_in_flight),
        })
    }

    fn send_key(&self, draft_id: &str) -> String {
        self.send_keys
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(draft_id.to_string())
            .or_insert_with(|| Uuid::new_v4().to_string())
            .clone()
    }

    fn settle_send_key(&self, draft_id: &str) {
        self.send_keys
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(draft_id);
    }

    /// Whether a send for this draft is outstanding
    pub fn is_sending(&self, draft_id: &str) -> bool {
        self.sends_in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(draft_id)
    }

    pub fn cache(&self) -> &Arc<QueryCache> {
        &self.cache
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DraftStatus;
    use crate::notify::{NotificationLevel, RecordingNotifier};
    use async_trait::async_trait;
    use chrono::Utc;

    mockall::mock! {
        pub Drafts {}

        #[async_trait]
        impl DraftsApi for Drafts {
            async fn generate_drafts(&self, email_id: &str, variations: u32) -> Result<GeneratedDrafts>;
            async fn get_drafts(&self, email_id: &str) -> Result<Vec<Draft>>;
            async fn update_draft(&self, draft_id: &str, content: &str) -> Result<Draft>;
            async fn delete_draft(&self, draft_id: &str) -> Result<()>;
            async fn send_draft(&self, draft_id: &str, idempotency_key: &str) -> Result<()>;
        }
    }

    fn draft(id: &str, content: &str, status: DraftStatus) -> Draft {
        Draft {
            id: id.to_string(),
            email_id: "e1".to_string(),
            user_id: "u1".to_string(),
            content: content.to_string(),
            confidence_score: 0.85,
            status,
            metadata: None,
            created_at: Utc::now(),
            sent_at: None,
        }
    }

    fn manager(mock: MockDrafts) -> (DraftManager, Arc<RecordingNotifier>, Arc<QueryCache>) {
        let notifier = Arc::new(RecordingNotifier::new());
        let cache = Arc::new(QueryCache::default());
        let manager = DraftManager::new(Arc::new(mock), Arc::clone(&cache), notifier.clone());
        (manager, notifier, cache)
    }

    #[tokio::test]
    async fn test_generate_notifies_and_invalidates() {
        let mut mock = MockDrafts::new();
        mock.expect_generate_drafts()
            .withf(|email_id, variations| email_id == "e1" && *variations == 3)
            .times(1)
            .returning(|_, _| {
                Ok(GeneratedDrafts {
                    drafts: vec![
                        draft("d1", "a", DraftStatus::Draft),
                        draft("d2", "b", DraftStatus::Draft),
                        draft("d3", "c", DraftStatus::Draft),
                    ],
                    analysis: None,
                })
            });

        let (manager, notifier, cache) = manager(mock);
        cache.set(QueryKey::drafts("e1"), &Vec::<Draft>::new()).unwrap();

        let generated = manager.generate("e1", 3).await.unwrap();
        assert_eq!(generated.drafts.len(), 3);
        assert!(!cache.is_fresh(&QueryKey::drafts("e1")));
        assert_eq!(
            notifier.messages(NotificationLevel::Success),
            vec!["Generated 3 draft variations".to_string()]
        );
    }

    #[tokio::test]
    async fn test_generate_zero_variations_fails_without_request() {
        let mut mock = MockDrafts::new();
        mock.expect_generate_drafts().times(0);

        let (manager, notifier, _) = manager(mock);
        let err = manager.generate("e1", 0).await.unwrap_err();
        assert!(matches!(err, ReplyDeskError::ValidationError(_)));
        assert_eq!(
            notifier.messages(NotificationLevel::Error),
            vec!["Failed to generate draft".to_string()]
        );
    }

    #[tokio::test]
    async fn test_drafts_query_cached_and_disabled_for_empty_id() {
        let mut mock = MockDrafts::new();
        mock.expect_get_drafts()
            .times(1)
            .returning(|_| Ok(vec![draft("d1", "hi", DraftStatus::Draft)]));

        let (manager, _, _) = manager(mock);
        assert!(manager.drafts("").await.unwrap().is_empty());
        assert_eq!(manager.drafts("e1").await.unwrap().len(), 1);
        assert_eq!(manager.drafts("e1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_update_identical_content_is_noop() {
        let mut mock = MockDrafts::new();
        mock.expect_update_draft().times(0);

        let (manager, notifier, _) = manager(mock);
        let outcome = manager
            .update(&draft("d1", "same", DraftStatus::Draft), "same")
            .await
            .unwrap();
        assert_eq!(outcome, SaveOutcome::Unchanged);
        assert!(notifier.notifications().is_empty());
    }

    #[tokio::test]
    async fn test_update_terminal_draft_is_conflict() {
        let mut mock = MockDrafts::new();
        mock.expect_update_draft().times(0);

        let (manager, notifier, _) = manager(mock);
        let err = manager
            .update(&draft("d1", "old", DraftStatus::Sent), "new")
            .await
            .unwrap_err();
        assert!(matches!(err, ReplyDeskError::Conflict(_)));
        assert_eq!(
            notifier.messages(NotificationLevel::Error),
            vec!["Failed to update draft".to_string()]
        );
    }

    #[tokio::test]
    async fn test_identical_save_on_sent_draft_is_still_conflict() {
        let mut mock = MockDrafts::new();
        mock.expect_update_draft().times(0);

        let (manager, _, _) = manager(mock);
        for status in [DraftStatus::Sent, DraftStatus::Discarded] {
            let err = manager
                .update(&draft("d1", "same", status), "same")
                .await
                .unwrap_err();
            assert!(matches!(err, ReplyDeskError::Conflict(_)));
        }
    }

    #[tokio::test]
    async fn test_update_invalidates_owning_email_only() {
        let mut mock = MockDrafts::new();
        mock.expect_update_draft()
            .times(1)
            .returning(|id, content| Ok(draft(id, content, DraftStatus::Draft)));

        let (manager, _, cache) = manager(mock);
        cache.set(QueryKey::drafts("e1"), &1u32).unwrap();
        cache.set(QueryKey::drafts("e2"), &2u32).unwrap();

        let outcome = manager
            .update(&draft("d1", "old", DraftStatus::Draft), "new")
            .await
            .unwrap();
        assert!(matches!(outcome, SaveOutcome::Saved(ref d) if d.content == "new"));
        assert!(!cache.is_fresh(&QueryKey::drafts("e1")));
        assert!(cache.is_fresh(&QueryKey::drafts("e2")));
    }

    #[tokio::test]
    async fn test_send_terminal_draft_leaves_cache_alone() {
        let mut mock = MockDrafts::new();
        mock.expect_send_draft().times(0);

        let (manager, _, cache) = manager(mock);
        cache.set(QueryKey::drafts("e1"), &1u32).unwrap();
        cache.set(QueryKey::email_list("in:sent", 20), &2u32).unwrap();

        for status in [DraftStatus::Sent, DraftStatus::Discarded] {
            let err = manager.send(&draft("d1", "x", status)).await.unwrap_err();
            assert!(matches!(err, ReplyDeskError::Conflict(_)));
        }
        assert!(cache.is_fresh(&QueryKey::drafts("e1")));
        assert!(cache.is_fresh(&QueryKey::email_list("in:sent", 20)));
    }

    #[tokio::test]
    async fn test_send_invalidates_drafts_and_emails() {
        let mut mock = MockDrafts::new();
        mock.expect_send_draft()
            .withf(|id, key| id == "d1" && Uuid::parse_str(key).is_ok())
            .times(1)
            .returning(|_, _| Ok(()));

        let (manager, notifier, cache) = manager(mock);
        cache.set(QueryKey::drafts("e1"), &1u32).unwrap();
        cache.set(QueryKey::email_list("is:unread in:inbox", 20), &2u32).unwrap();

        manager.send(&draft("d1", "x", DraftStatus::Draft)).await.unwrap();
        assert!(!cache.is_fresh(&QueryKey::drafts("e1")));
        assert!(!cache.is_fresh(&QueryKey::email_list("is:unread in:inbox", 20)));
        assert!(!manager.is_sending("d1"));
        assert_eq!(
            notifier.messages(NotificationLevel::Success),
            vec!["Email sent successfully".to_string()]
        );
    }

    #[tokio::test]
    async fn test_failed_send_releases_in_flight_guard() {
        let mut mock = MockDrafts::new();
        mock.expect_send_draft()
            .times(2)
            .returning(|_, _| Err(ReplyDeskError::NetworkError("offline".to_string())));

        let (manager, _, _) = manager(mock);
        let d = draft("d1", "x", DraftStatus::Draft);
        assert!(manager.send(&d).await.is_err());
        assert!(!manager.is_sending("d1"));
        // a manual retry is allowed once the first attempt has finished
        assert!(matches!(
            manager.send(&d).await,
            Err(ReplyDeskError::NetworkError(_))
        ));
    }

    #[tokio::test]
    async fn test_retry_after_timeout_reuses_idempotency_key() {
        let keys = Arc::new(Mutex::new(Vec::<String>::new()));
        let recorded = Arc::clone(&keys);
        let mut seq = mockall::Sequence::new();
        let mut mock = MockDrafts::new();
        mock.expect_send_draft()
            .times(1)
            .in_sequence(&mut seq)
            .returning({
                let keys = Arc::clone(&keys);
                move |_, key| {
                    keys.lock().unwrap().push(key.to_string());
                    Err(ReplyDeskError::Timeout(30))
                }
            });
        mock.expect_send_draft()
            .times(1)
            .in_sequence(&mut seq)
            .returning(move |_, key| {
                recorded.lock().unwrap().push(key.to_string());
                Ok(())
            });

        let (manager, _, _) = manager(mock);
        let d = draft("d1", "x", DraftStatus::Draft);
        assert!(matches!(manager.send(&d).await, Err(ReplyDeskError::Timeout(_))));
        manager.send(&d).await.unwrap();

        let keys = keys.lock().unwrap();
        assert_eq!(keys.len(), 2);
        assert_eq!(keys[0], keys[1]);
        assert!(manager.send_keys.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_permanent_send_failure_drops_idempotency_key() {
        let keys = Arc::new(Mutex::new(Vec::<String>::new()));
        let recorded = Arc::clone(&keys);
        let mut mock = MockDrafts::new();
        mock.expect_send_draft().times(2).returning(move |_, key| {
            recorded.lock().unwrap().push(key.to_string());
            Err(ReplyDeskError::ValidationError("recipient missing".to_string()))
        });

        let (manager, _, _) = manager(mock);
        let d = draft("d1", "x", DraftStatus::Draft);
        assert!(manager.send(&d).await.is_err());
        assert!(manager.send(&d).await.is_err());

        let keys = keys.lock().unwrap();
        assert_ne!(keys[0], keys[1]);
    }

    #[test]
    fn test_duplicate_send_is_refused_while_in_flight() {
        let (manager, _, _) = manager(MockDrafts::new());
        let d = draft("d1", "x", DraftStatus::Draft);

        let guard = manager.begin_send(&d).unwrap();
        assert!(manager.is_sending("d1"));
        assert!(matches!(
            manager.begin_send(&d),
            Err(ReplyDeskError::Conflict(_))
        ));
        drop(guard);
        assert!(!manager.is_sending("d1"));
    }
}
