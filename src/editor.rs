//! Local selection and edit state for one email's drafts
//!
//! The editor holds the server's draft list, one selected draft id and a
//! text buffer. The buffer is decoupled from the stored content until it is
//! saved. Network work is split into `begin_*` / `finish_*` pairs so a
//! caller can run the request elsewhere; once the editor is closed any
//! result that arrives is dropped instead of applied.

use chrono::Utc;
use tracing::{debug, warn};

use crate::config::ReselectPolicy;
use crate::draft_manager::{DraftManager, SaveOutcome};
use crate::error::{ReplyDeskError, Result};
use crate::models::{Draft, DraftAction, DraftStatus, GeneratedDrafts};

#[derive(Debug, Clone)]
pub struct DraftEditor {
    email_id: String,
    drafts: Vec<Draft>,
    selected_id: Option<String>,
    buffer: String,
    policy: ReselectPolicy,
    saving: bool,
    sending: bool,
    closed: bool,
}

impl DraftEditor {
    pub fn new(email_id: impl Into<String>, policy: ReselectPolicy) -> Self {
        Self {
            email_id: email_id.into(),
            drafts: Vec::new(),
            selected_id: None,
            buffer: String::new(),
            policy,
            saving: false,
            sending: false,
            closed: false,
        }
    }

    pub fn email_id(&self) -> &str {
        &self.email_id
    }

    pub fn drafts(&self) -> &[Draft] {
        &self.drafts
    }

    pub fn editable_drafts(&self) -> impl Iterator<Item = &Draft> {
        self.drafts.iter().filter(|d| d.is_editable())
    }

    pub fn selected(&self) -> Option<&Draft> {
        let id = self.selected_id.as_deref()?;
        self.drafts.iter().find(|d| d.id == id)
    }

    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    pub fn is_dirty(&self) -> bool {
        self.selected()
            .map(|d| d.content != self.buffer)
            .unwrap_or(false)
    }

    pub fn is_saving(&self) -> bool {
        self.saving
    }

    pub fn is_sending(&self) -> bool {
        self.sending
    }

    pub fn can_save(&self) -> bool {
        !self.closed
            && !self.saving
            && self.is_dirty()
            && self.selected().map(Draft::is_editable).unwrap_or(false)
    }

    pub fn can_send(&self) -> bool {
        !self.closed
            && !self.saving
            && !self.sending
            && self.selected().map(Draft::is_editable).unwrap_or(false)
    }

    /// Replace the draft list with a fresh server copy.
    ///
    /// Unsaved edits survive; a clean buffer follows the new stored content.
    /// If the selected draft is gone the selection is cleared.
    pub fn load(&mut self, drafts: Vec<Draft>) {
        if self.closed {
            debug!("Editor for {} closed, ignoring draft list", self.email_id);
            return;
        }
        let was_dirty = self.is_dirty();
        self.drafts = drafts;

        match self.selected().map(|d| d.content.clone()) {
            Some(content) if !was_dirty => self.buffer = content,
            Some(_) => {}
            None => {
                if self.selected_id.take().is_some() {
                    debug!("Selected draft no longer listed for {}", self.email_id);
                }
                self.buffer.clear();
            }
        }
    }

    /// Merge freshly generated drafts and select the first of them.
    ///
    /// Selecting the new draft is a reselect, so under the `keep` policy a
    /// dirty buffer refuses the whole batch and nothing is merged.
    pub fn accept_generated(&mut self, generated: Vec<Draft>) -> Result<()> {
        if self.closed {
            debug!("Editor for {} closed, ignoring generated drafts", self.email_id);
            return Ok(());
        }
        self.check_reselect()?;
        let first = generated.first().map(|d| d.id.clone());
        for draft in generated {
            match self.drafts.iter_mut().find(|d| d.id == draft.id) {
                Some(existing) => *existing = draft,
                None => self.drafts.push(draft),
            }
        }
        match first {
            Some(id) => self.select(&id),
            None => Ok(()),
        }
    }

    /// Select a draft, replacing the buffer with its stored content
    pub fn select(&mut self, draft_id: &str) -> Result<()> {
        let content = self
            .drafts
            .iter()
            .find(|d| d.id == draft_id)
            .map(|d| d.content.clone())
            .ok_or_else(|| ReplyDeskError::NotFound(format!("draft {}", draft_id)))?;

        self.check_reselect()?;
        if self.is_dirty() {
            warn!(
                "Discarding unsaved edits on draft {}",
                self.selected_id.as_deref().unwrap_or_default()
            );
        }

        self.selected_id = Some(draft_id.to_string());
        self.buffer = content;
        Ok(())
    }

    /// Whether moving the selection is allowed with the current buffer
    pub fn check_reselect(&self) -> Result<()> {
        match self.policy {
            ReselectPolicy::Keep if self.is_dirty() => Err(ReplyDeskError::UnsavedEdits(
                self.selected_id.clone().unwrap_or_default(),
            )),
            _ => Ok(()),
        }
    }

    pub fn edit(&mut self, content: impl Into<String>) -> Result<()> {
        let draft = self
            .selected()
            .ok_or_else(|| ReplyDeskError::ValidationError("no draft selected".to_string()))?;
        draft.ensure_can(DraftAction::Edit)?;
        self.buffer = content.into();
        Ok(())
    }

    /// Throw away local edits
    pub fn revert(&mut self) {
        if let Some(content) = self.selected().map(|d| d.content.clone()) {
            self.buffer = content;
        }
    }

    /// Mark a save as started and hand back what to persist
    pub fn begin_save(&mut self) -> Result<(Draft, String)> {
        self.ensure_open()?;
        if self.saving {
            return Err(ReplyDeskError::Conflict("a save is already in progress".to_string()));
        }
        let draft = self
            .selected()
            .cloned()
            .ok_or_else(|| ReplyDeskError::ValidationError("no draft selected".to_string()))?;
        self.saving = true;
        Ok((draft, self.buffer.clone()))
    }

    pub fn finish_save(&mut self, result: Result<SaveOutcome>) -> Result<SaveOutcome> {
        self.saving = false;
        if self.closed {
            debug!("Editor for {} closed, dropping save result", self.email_id);
            return result;
        }
        if let Ok(SaveOutcome::Saved(ref saved)) = result {
            if let Some(existing) = self.drafts.iter_mut().find(|d| d.id == saved.id) {
                *existing = saved.clone();
            }
        }
        result
    }

    pub fn begin_send(&mut self) -> Result<Draft> {
        self.ensure_open()?;
        if self.sending {
            return Err(ReplyDeskError::Conflict("a send is already in progress".to_string()));
        }
        let draft = self
            .selected()
            .cloned()
            .ok_or_else(|| ReplyDeskError::ValidationError("no draft selected".to_string()))?;
        draft.ensure_can(DraftAction::Send)?;
        self.sending = true;
        Ok(draft)
    }

    pub fn finish_send(&mut self, draft_id: &str, result: Result<()>) -> Result<()> {
        self.sending = false;
        if self.closed {
            debug!("Editor for {} closed, dropping send result", self.email_id);
            return result;
        }
        if result.is_ok() {
            if let Some(draft) = self.drafts.iter_mut().find(|d| d.id == draft_id) {
                draft.status = DraftStatus::Sent;
                draft.sent_at = Some(Utc::now());
            }
        }
        result
    }

    /// Detach the editor. Later results are ignored.
    pub fn close(&mut self) {
        self.closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(ReplyDeskError::ValidationError("editor is closed".to_string()));
        }
        Ok(())
    }

    pub async fn refresh(&mut self, manager: &DraftManager) -> Result<()> {
        let drafts = manager.drafts(&self.email_id).await?;
        self.load(drafts);
        Ok(())
    }

    pub async fn generate(
        &mut self,
        manager: &DraftManager,
        variations: u32,
    ) -> Result<GeneratedDrafts> {
        self.ensure_open()?;
        self.check_reselect()?;
        let generated = manager.generate(&self.email_id, variations).await?;
        self.accept_generated(generated.drafts.clone())?;
        Ok(generated)
    }

    /// Persist the buffer. A clean buffer is a no-op.
    pub async fn save(&mut self, manager: &DraftManager) -> Result<SaveOutcome> {
        if !self.is_dirty() {
            return Ok(SaveOutcome::Unchanged);
        }
        let (draft, content) = self.begin_save()?;
        let result = manager.update(&draft, &content).await;
        self.finish_save(result)
    }

    /// Send the selected draft, saving pending edits first
    pub async fn send(&mut self, manager: &DraftManager) -> Result<()> {
        if self.is_dirty() {
            self.save(manager).await?;
        }
        let draft = self.begin_send()?;
        let result = manager.send(&draft).await;
        self.finish_send(&draft.id, result)
    }
}
