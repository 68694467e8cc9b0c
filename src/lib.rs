//! Reply Desk
//!
//! Client library for an AI-assisted email reply backend: list and read
//! email, request reply drafts, edit them locally and send them.
//!
//! # Overview
//!
//! - **HTTP clients**: typed wrappers over the `/api/emails`, `/api/drafts`
//!   and `/api/gmail` routes, each attaching the session's bearer token
//! - **Query cache**: an injectable response cache with namespaced
//!   invalidation and a freshness window
//! - **Services**: [`Mailbox`] and [`DraftManager`] bind client calls to
//!   cache keys, invalidate on mutation and report outcomes to a [`Notifier`]
//! - **Draft editor**: selection and edit buffer over one email's drafts
//!
//! # Example Usage
//!
//! ```no_run
//! use reply_desk::{config::Config, notify::TracingNotifier, ReplyDesk};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("reply-desk.toml".as_ref()).await?;
//!     let desk = ReplyDesk::new(config, Arc::new(TracingNotifier))?;
//!
//!     let mut editor = desk.editor("email-id");
//!     editor.generate(desk.drafts(), 2).await?;
//!     editor.edit("Thanks, will review.")?;
//!     editor.save(desk.drafts()).await?;
//!     editor.send(desk.drafts()).await?;
//!     Ok(())
//! }
//! ```
//!
//! # Module Organization
//!
//! - [`app`] - Wiring of config, session, clients and services
//! - [`cache`] - Query cache and cache keys
//! - [`cli`] - Command-line interface
//! - [`config`] - Configuration management
//! - [`draft_manager`] - Draft queries and mutations
//! - [`drafts`], [`emails`], [`gmail`] - Backend REST clients
//! - [`editor`] - Local draft selection and edit state
//! - [`error`] - Error types and result aliases
//! - [`http`] - Shared HTTP plumbing
//! - [`mailbox`] - Email queries and mutations
//! - [`models`] - Core data structures
//! - [`notify`] - User notifications
//! - [`session`] - Access token sources
//! - [`views`] - Terminal rendering

pub mod app;
pub mod cache;
pub mod cli;
pub mod config;
pub mod draft_manager;
pub mod drafts;
pub mod editor;
pub mod emails;
pub mod error;
pub mod gmail;
pub mod http;
pub mod mailbox;
pub mod models;
pub mod notify;
pub mod session;
pub mod views;

// Re-export commonly used types for convenience
pub use error::{ReplyDeskError, Result};

pub use app::ReplyDesk;
pub use cache::{QueryCache, QueryKey};
pub use config::{Config, ReselectPolicy};
pub use draft_manager::{DraftManager, SaveOutcome};
pub use editor::DraftEditor;
pub use mailbox::Mailbox;
pub use models::{Draft, DraftStatus, Email, FolderTab};
pub use notify::{Notification, NotificationLevel, Notifier};
pub use session::{Session, SessionProvider};

// Client traits
pub use drafts::{DraftsApi, HttpDraftsApi};
pub use emails::{EmailsApi, HttpEmailsApi};
pub use gmail::{GmailApi, HttpGmailApi};
