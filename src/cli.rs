//! Command-line interface

use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use inquire::InquireError;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};
use tracing_subscriber::fmt::MakeWriter;

use crate::app::ReplyDesk;
use crate::config::Config;
use crate::draft_manager::SaveOutcome;
use crate::editor::DraftEditor;
use crate::error::{ReplyDeskError, Result};
use crate::models::{Draft, FolderTab, OutgoingEmail};
use crate::notify::{Notification, NotificationLevel, Notifier};
use crate::session::{session_from_token, FileSessionStore, SessionProvider};
use crate::views;

#[derive(Parser, Debug)]
#[command(name = "reply-desk")]
#[command(version = "0.1.0")]
#[command(about = "Read email and send AI-drafted replies from the terminal", long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "reply-desk.toml")]
    pub config: PathBuf,

    /// Backend base URL, overrides the config file
    #[arg(long)]
    pub api_url: Option<String>,

    /// Access token for this invocation only
    #[arg(long)]
    pub token: Option<String>,

    /// Verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Emit logs as JSON
    #[arg(long)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Browse and manage stored emails
    #[command(subcommand)]
    Emails(EmailCommands),

    /// Generate, edit and send reply drafts
    #[command(subcommand)]
    Drafts(DraftCommands),

    /// Raw Gmail access through the backend
    #[command(subcommand)]
    Gmail(GmailCommands),

    /// Manage the stored access token
    #[command(subcommand)]
    Session(SessionCommands),

    /// Generate example configuration file
    InitConfig {
        /// Path to create config file
        #[arg(short, long, default_value = "reply-desk.toml")]
        output: PathBuf,

        /// Overwrite existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum EmailCommands {
    /// List a folder
    List {
        /// inbox, drafts or sent
        #[arg(short, long, default_value = "inbox")]
        folder: FolderTab,

        /// Custom Gmail query, replaces the folder query
        #[arg(short, long)]
        query: Option<String>,

        #[arg(short, long)]
        max_results: Option<u32>,

        /// Ignore the cached listing
        #[arg(long)]
        refresh: bool,
    },

    /// Show one email with its drafts
    Show {
        id: String,

        /// Mark the email as read after showing it
        #[arg(long)]
        mark_read: bool,
    },

    /// Import new messages on the backend
    Sync,

    /// Mark an email as read
    Read { id: String },

    Archive { id: String },

    Delete {
        id: String,

        /// Skip confirmation
        #[arg(long)]
        force: bool,
    },

    Search { query: String },
}

#[derive(Subcommand, Debug)]
pub enum DraftCommands {
    /// Generate reply drafts for an email
    Generate {
        email_id: String,

        /// Number of variations (defaults to editor.default_variations)
        #[arg(short = 'n', long)]
        variations: Option<u32>,
    },

    /// List drafts for an email
    List { email_id: String },

    /// Replace a draft's content
    Update {
        #[command(flatten)]
        target: DraftTarget,

        #[arg(long)]
        content: String,
    },

    Send {
        #[command(flatten)]
        target: DraftTarget,
    },

    Delete {
        #[command(flatten)]
        target: DraftTarget,
    },

    /// Interactive editor for an email's drafts
    Edit { email_id: String },
}

#[derive(Args, Debug)]
pub struct DraftTarget {
    pub email_id: String,
    pub draft_id: String,
}

#[derive(Args, Debug)]
pub struct ComposeArgs {
    #[arg(long)]
    pub to: String,

    #[arg(long)]
    pub subject: String,

    #[arg(long)]
    pub body: String,

    /// Reply within this thread
    #[arg(long)]
    pub thread_id: Option<String>,
}

impl From<ComposeArgs> for OutgoingEmail {
    fn from(args: ComposeArgs) -> Self {
        Self {
            to: args.to,
            subject: args.subject,
            body: args.body,
            thread_id: args.thread_id,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum GmailCommands {
    List {
        #[arg(short, long)]
        query: Option<String>,

        #[arg(short, long)]
        max_results: Option<u32>,
    },

    Show { id: String },

    /// Create a draft in Gmail
    CreateDraft(ComposeArgs),

    /// Send a composed email
    Send(ComposeArgs),

    /// Enable push sync
    Watch,
}

#[derive(Subcommand, Debug)]
pub enum SessionCommands {
    /// Store an access token issued by the backend
    Save {
        token: String,

        /// Hours until the token expires
        #[arg(long)]
        expires_in_hours: Option<i64>,
    },

    /// Remove the stored token
    Clear,

    /// Show whether a usable token is stored
    Status,
}

/// Spinners plus notification output that does not tear progress lines
#[derive(Clone)]
pub struct ProgressReporter {
    multi: MultiProgress,
    spinner_style: ProgressStyle,
}

impl ProgressReporter {
    pub fn new(multi: MultiProgress) -> Self {
        let spinner_style = ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed:>6}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ");

        Self {
            multi,
            spinner_style,
        }
    }

    pub fn add_spinner(&self, msg: &str) -> ProgressBar {
        let pb = self.multi.add(ProgressBar::new_spinner());
        pb.set_style(self.spinner_style.clone());
        pb.set_message(msg.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    }

    /// Run `work` behind a spinner that is cleared when it finishes
    pub async fn spin<T, F>(&self, msg: &str, work: F) -> T
    where
        F: std::future::Future<Output = T>,
    {
        let pb = self.add_spinner(msg);
        let output = work.await;
        pb.finish_and_clear();
        output
    }

    pub fn print(&self, text: &str) {
        self.multi.suspend(|| print!("{}", text));
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new(MultiProgress::new())
    }
}

impl Notifier for ProgressReporter {
    fn notify(&self, notification: Notification) {
        self.multi.suspend(|| match notification.level {
            NotificationLevel::Success => println!("  ✓ {}", notification.message),
            NotificationLevel::Error => eprintln!("  ✗ {}", notification.message),
        });
    }
}

/// One formatted log event, printed above the spinners once it is complete
pub struct LogLine {
    multi: MultiProgress,
    bytes: Vec<u8>,
}

impl std::io::Write for LogLine {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.bytes.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl Drop for LogLine {
    fn drop(&mut self) {
        let text = String::from_utf8_lossy(&self.bytes);
        let text = text.trim_end();
        if !text.is_empty() {
            // println is lost on a hidden draw target; suspend is not
            self.multi.suspend(|| eprintln!("{}", text));
        }
    }
}

impl<'a> MakeWriter<'a> for ProgressReporter {
    type Writer = LogLine;

    fn make_writer(&'a self) -> Self::Writer {
        LogLine {
            multi: self.multi.clone(),
            bytes: Vec::new(),
        }
    }
}

pub async fn run_emails(command: EmailCommands, desk: &ReplyDesk, ui: &ProgressReporter) -> Result<()> {
    let mailbox = desk.mailbox();
    match command {
        EmailCommands::List {
            folder,
            query,
            max_results,
            refresh,
        } => {
            let query = query.unwrap_or_else(|| folder.query().to_string());
            let page = ui
                .spin("Loading emails...", async {
                    if refresh {
                        mailbox.refresh(&query, max_results).await
                    } else {
                        mailbox.list(&query, max_results).await
                    }
                })
                .await?;
            ui.print(&views::render_inbox(folder, Some(&page), Utc::now()));
        }
        EmailCommands::Show { id, mark_read } => {
            let (email, drafts) = ui
                .spin("Fetching email...", async {
                    futures::try_join!(mailbox.email(&id), desk.drafts().drafts(&id))
                })
                .await?;
            ui.print(&views::render_email(&email));
            ui.print("\nDrafts\n");
            ui.print(&views::render_drafts(&drafts, None));
            if mark_read && !email.is_read {
                mailbox.mark_read(&id).await?;
            }
        }
        EmailCommands::Sync => {
            let count = ui.spin("Syncing emails...", mailbox.sync()).await?;
            info!("Sync finished with {} new emails", count);
        }
        EmailCommands::Read { id } => {
            mailbox.mark_read(&id).await?;
            ui.print(&format!("  ✓ Marked {} as read\n", id));
        }
        EmailCommands::Archive { id } => {
            mailbox.archive(&id).await?;
        }
        EmailCommands::Delete { id, force } => {
            if !force && !confirm(&format!("Delete email {}?", id))? {
                ui.print("Cancelled.\n");
                return Ok(());
            }
            mailbox.delete(&id).await?;
        }
        EmailCommands::Search { query } => {
            let emails = ui.spin("Searching...", mailbox.search(&query)).await?;
            ui.print(&views::render_search_results(&query, &emails, Utc::now()));
        }
    }
    Ok(())
}

/// Find a draft by id in the email's current draft list
async fn find_draft(desk: &ReplyDesk, target: &DraftTarget) -> Result<Draft> {
    desk.drafts()
        .drafts(&target.email_id)
        .await?
        .into_iter()
        .find(|d| d.id == target.draft_id)
        .ok_or_else(|| {
            ReplyDeskError::NotFound(format!(
                "draft {} for email {}",
                target.draft_id, target.email_id
            ))
        })
}

pub async fn run_drafts(command: DraftCommands, desk: &ReplyDesk, ui: &ProgressReporter) -> Result<()> {
    let manager = desk.drafts();
    match command {
        DraftCommands::Generate {
            email_id,
            variations,
        } => {
            let variations = variations.unwrap_or(desk.config().editor.default_variations);
            let generated = ui
                .spin(
                    &format!("Generating {} draft(s)...", variations),
                    manager.generate(&email_id, variations),
                )
                .await?;
            if let Some(ref analysis) = generated.analysis {
                ui.print(&views::render_analysis(analysis));
            }
            ui.print(&views::render_drafts(&generated.drafts, None));
        }
        DraftCommands::List { email_id } => {
            let drafts = ui.spin("Fetching drafts...", manager.drafts(&email_id)).await?;
            ui.print(&views::render_drafts(&drafts, None));
        }
        DraftCommands::Update { target, content } => {
            let draft = find_draft(desk, &target).await?;
            if manager.update(&draft, &content).await? == SaveOutcome::Unchanged {
                ui.print("Content unchanged, nothing to save.\n");
            }
        }
        DraftCommands::Send { target } => {
            let draft = find_draft(desk, &target).await?;
            ui.spin("Sending...", manager.send(&draft)).await?;
        }
        DraftCommands::Delete { target } => {
            let draft = find_draft(desk, &target).await?;
            manager.delete(&draft).await?;
        }
        DraftCommands::Edit { email_id } => {
            let mut editor = desk.editor(&email_id);
            let result = edit_loop(&mut editor, desk, ui).await;
            editor.close();
            result?;
        }
    }
    Ok(())
}

pub async fn run_gmail(command: GmailCommands, desk: &ReplyDesk, ui: &ProgressReporter) -> Result<()> {
    let mailbox = desk.mailbox();
    match command {
        GmailCommands::List { query, max_results } => {
            let messages = ui
                .spin(
                    "Loading Gmail messages...",
                    mailbox.gmail_list(query.as_deref(), max_results),
                )
                .await?;
            ui.print(&views::render_gmail_list(&messages, Utc::now()));
        }
        GmailCommands::Show { id } => {
            let message = mailbox.gmail_email(&id).await?;
            ui.print(&format!(
                "Subject: {}\nFrom:    {}\nTo:      {}\n\n{}\n",
                message.subject,
                message.from_email,
                message.to_email,
                message.body_plain.as_deref().unwrap_or_default()
            ));
        }
        GmailCommands::CreateDraft(args) => {
            let draft_id = mailbox.create_gmail_draft(&args.into()).await?;
            ui.print(&format!("Gmail draft id: {}\n", draft_id));
        }
        GmailCommands::Send(args) => {
            ui.spin("Sending...", mailbox.send_gmail(&args.into())).await?;
        }
        GmailCommands::Watch => {
            mailbox.watch().await?;
        }
    }
    Ok(())
}

pub async fn run_session(command: SessionCommands, config: &Config) -> Result<()> {
    let store = FileSessionStore::new(config.session.token_file.clone());
    match command {
        SessionCommands::Save {
            token,
            expires_in_hours,
        } => {
            let mut session = session_from_token(&token)?;
            session.expires_at =
                expires_in_hours.map(|hours| Utc::now() + chrono::Duration::hours(hours));
            store.save(&session).await?;
            println!("Session saved to {:?}", store.path());
        }
        SessionCommands::Clear => {
            store.clear().await?;
            println!("Session cleared");
        }
        SessionCommands::Status => match store.current_session().await? {
            Some(session) => match session.expires_at {
                Some(at) => println!("Signed in, token expires {}", at.format("%Y-%m-%d %H:%M UTC")),
                None => println!("Signed in"),
            },
            None => println!("Signed out"),
        },
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EditAction {
    Generate,
    Select,
    Edit,
    Save,
    Send,
    Revert,
    Refresh,
    Quit,
}

impl fmt::Display for EditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            EditAction::Generate => "Generate drafts",
            EditAction::Select => "Select draft",
            EditAction::Edit => "Edit selected draft",
            EditAction::Save => "Save changes",
            EditAction::Send => "Send selected draft",
            EditAction::Revert => "Revert changes",
            EditAction::Refresh => "Refresh",
            EditAction::Quit => "Quit",
        };
        f.write_str(label)
    }
}

fn available_actions(editor: &DraftEditor) -> Vec<EditAction> {
    let mut actions = vec![EditAction::Generate];
    if !editor.drafts().is_empty() {
        actions.push(EditAction::Select);
    }
    if editor.selected().map(Draft::is_editable).unwrap_or(false) {
        actions.push(EditAction::Edit);
    }
    if editor.can_save() {
        actions.push(EditAction::Save);
        actions.push(EditAction::Revert);
    }
    if editor.can_send() {
        actions.push(EditAction::Send);
    }
    actions.push(EditAction::Refresh);
    actions.push(EditAction::Quit);
    actions
}

/// `None` when the user cancelled the prompt
fn prompted<T>(result: std::result::Result<T, InquireError>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(InquireError::OperationCanceled) | Err(InquireError::OperationInterrupted) => Ok(None),
        Err(e) => Err(ReplyDeskError::IoError(std::io::Error::other(e.to_string()))),
    }
}

async fn edit_loop(editor: &mut DraftEditor, desk: &ReplyDesk, ui: &ProgressReporter) -> Result<()> {
    let manager = desk.drafts();
    let email = desk.mailbox().email(editor.email_id()).await?;
    ui.print(&views::render_email(&email));
    editor.refresh(manager).await?;

    loop {
        ui.print("\n");
        ui.print(&views::render_drafts(
            editor.drafts(),
            editor.selected().map(|d| d.id.as_str()),
        ));
        if editor.is_dirty() {
            ui.print("  (unsaved changes)\n");
        }

        let action = match prompted(inquire::Select::new("Action:", available_actions(editor)).prompt())? {
            Some(action) => action,
            None => EditAction::Quit,
        };
        debug!("Editor action: {}", action);

        // failures are already reported by the services; keep the session going
        let outcome = match action {
            EditAction::Generate => {
                let default = desk.config().editor.default_variations;
                match prompted(
                    inquire::CustomType::<u32>::new("Variations:")
                        .with_default(default)
                        .prompt(),
                )? {
                    Some(n) => ui
                        .spin("Generating...", editor.generate(manager, n))
                        .await
                        .map(|generated| {
                            if let Some(ref analysis) = generated.analysis {
                                ui.print(&views::render_analysis(analysis));
                            }
                        }),
                    None => Ok(()),
                }
            }
            EditAction::Select => {
                let labels: Vec<String> = editor
                    .drafts()
                    .iter()
                    .enumerate()
                    .map(|(i, d)| {
                        format!(
                            "{}. [{}] {}",
                            i + 1,
                            d.status,
                            views::truncate_string(&d.content.replace('\n', " "), 60)
                        )
                    })
                    .collect();
                match prompted(inquire::Select::new("Draft:", labels).raw_prompt())? {
                    Some(choice) => {
                        let id = editor.drafts()[choice.index].id.clone();
                        editor.select(&id)
                    }
                    None => Ok(()),
                }
            }
            EditAction::Edit => {
                match prompted(
                    inquire::Text::new("Content:")
                        .with_initial_value(editor.buffer())
                        .prompt(),
                )? {
                    Some(text) => editor.edit(text),
                    None => Ok(()),
                }
            }
            EditAction::Save => ui.spin("Saving...", editor.save(manager)).await.map(|_| ()),
            EditAction::Send => ui.spin("Sending...", editor.send(manager)).await,
            EditAction::Revert => {
                editor.revert();
                Ok(())
            }
            EditAction::Refresh => editor.refresh(manager).await,
            EditAction::Quit => {
                if editor.is_dirty()
                    && !prompted(
                        inquire::Confirm::new("Discard unsaved changes?")
                            .with_default(false)
                            .prompt(),
                    )?
                    .unwrap_or(false)
                {
                    continue;
                }
                return Ok(());
            }
        };

        match outcome {
            Err(ReplyDeskError::UnsavedEdits(id)) => {
                ui.print(&format!("Save or revert your changes to draft {} first.\n", id));
            }
            Err(e) => warn!("{}", e),
            Ok(()) => {}
        }
    }
}

/// Prompt user for confirmation
fn confirm(prompt: &str) -> Result<bool> {
    Ok(prompted(inquire::Confirm::new(prompt).with_default(false).prompt())?.unwrap_or(false))
}
