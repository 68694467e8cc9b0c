use anyhow::Result;
use clap::Parser;
use indicatif::MultiProgress;
use reply_desk::cli::{self, Cli, Commands, ProgressReporter};
use reply_desk::config::Config;
use reply_desk::error::ReplyDeskError;
use reply_desk::session::{session_from_token, StaticSession};
use reply_desk::ReplyDesk;
use std::process;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        eprintln!("\nFor help, run: reply-desk --help");
        process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("reply_desk=debug,info"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("reply_desk=info,warn"))
    };

    // logs share the spinners' terminal, so route them through the reporter
    let reporter = ProgressReporter::new(MultiProgress::new());

    if cli.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(reporter.clone())
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(reporter.clone())
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .init();
    }

    if let Commands::InitConfig { output, force } = &cli.command {
        if output.exists() && !force {
            return Err(ReplyDeskError::ConfigError(format!(
                "Configuration file already exists at {:?}. Use --force to overwrite.",
                output
            ))
            .into());
        }

        Config::create_example(output).await?;

        println!("Created example configuration file at: {:?}", output);
        println!("\nKey settings to review:");
        println!("  - api.base_url: Address of the reply backend");
        println!("  - editor.reselect_policy: 'discard' or 'keep' unsaved edits on reselect");
        println!("  - session.token_file: Where the access token is stored");
        return Ok(());
    }

    let mut config = Config::load(&cli.config).await?;
    if let Some(url) = cli.api_url {
        config.api.base_url = url;
        config.validate()?;
    }

    let command = match cli.command {
        Commands::Session(command) => return Ok(cli::run_session(command, &config).await?),
        other => other,
    };

    let notifier = Arc::new(reporter.clone());
    let desk = match cli.token {
        Some(token) => ReplyDesk::with_session(
            config,
            Arc::new(StaticSession::new(session_from_token(&token)?)),
            notifier,
        )?,
        None => ReplyDesk::new(config, notifier)?,
    };

    match command {
        Commands::Emails(command) => cli::run_emails(command, &desk, &reporter).await?,
        Commands::Drafts(command) => cli::run_drafts(command, &desk, &reporter).await?,
        Commands::Gmail(command) => cli::run_gmail(command, &desk, &reporter).await?,
        Commands::Session(_) | Commands::InitConfig { .. } => {}
    }

    Ok(())
}
