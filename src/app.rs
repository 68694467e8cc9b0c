//! Wiring of config, session, clients, cache and services

use std::sync::Arc;
use tracing::debug;

use crate::cache::QueryCache;
use crate::config::Config;
use crate::draft_manager::DraftManager;
use crate::drafts::{HttpDraftsApi, DRAFTS_PREFIX};
use crate::editor::DraftEditor;
use crate::emails::{HttpEmailsApi, EMAILS_PREFIX};
use crate::error::Result;
use crate::gmail::{HttpGmailApi, GMAIL_PREFIX};
use crate::http::ApiClient;
use crate::mailbox::Mailbox;
use crate::notify::Notifier;
use crate::session::{ChainedSession, SessionProvider};

/// Everything a front-end needs, sharing one cache and one connection pool
pub struct ReplyDesk {
    config: Config,
    cache: Arc<QueryCache>,
    mailbox: Mailbox,
    drafts: DraftManager,
}

impl ReplyDesk {
    /// Build with the default session chain (env var, then token file)
    pub fn new(config: Config, notifier: Arc<dyn Notifier>) -> Result<Self> {
        let session = Arc::new(ChainedSession::new(config.session.token_file.clone()));
        Self::with_session(config, session, notifier)
    }

    pub fn with_session(
        config: Config,
        session: Arc<dyn SessionProvider>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self> {
        let root = ApiClient::from_config(&config.api, "", session)?;
        debug!("Backend at {}", root.base_url());

        let cache = Arc::new(QueryCache::from_config(&config.cache));
        let mailbox = Mailbox::new(
            Arc::new(HttpEmailsApi::new(root.scoped(EMAILS_PREFIX))),
            Arc::new(HttpGmailApi::new(root.scoped(GMAIL_PREFIX))),
            Arc::clone(&cache),
            Arc::clone(&notifier),
            config.api.max_results,
        );
        let drafts = DraftManager::new(
            Arc::new(HttpDraftsApi::new(root.scoped(DRAFTS_PREFIX))),
            Arc::clone(&cache),
            notifier,
        );

        Ok(Self {
            config,
            cache,
            mailbox,
            drafts,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn cache(&self) -> &Arc<QueryCache> {
        &self.cache
    }

    pub fn mailbox(&self) -> &Mailbox {
        &self.mailbox
    }

    pub fn drafts(&self) -> &DraftManager {
        &self.drafts
    }

    /// A fresh editor for `email_id` using the configured reselect policy
    pub fn editor(&self, email_id: &str) -> DraftEditor {
        DraftEditor::new(email_id, self.config.editor.reselect_policy)
    }
}
