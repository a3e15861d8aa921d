mod chat;
mod commands;
mod render;
mod settings;
mod store;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::settings::{Overrides, Settings};
use crate::store::SessionStore;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Agent backend URL (can also be set via ADK_HOST or config.toml)
    #[arg(long, global = true)]
    host: Option<String>,

    /// Agent application name (can also be set via ADK_APP_NAME)
    #[arg(long, global = true)]
    app_name: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Manage the stored session
    Session {
        #[command(subcommand)]
        action: SessionAction,
    },

    /// Chat with the agent; sends MESSAGE and exits when one is given
    Chat {
        /// File to send with the first message (repeatable)
        #[arg(short, long = "attach", value_name = "FILE")]
        attach: Vec<PathBuf>,

        message: Option<String>,
    },

    /// Write the agent's answers as Markdown
    Export {
        /// Defaults to stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Remove the stored transcript of the current session
    Clear,
}

#[derive(Subcommand)]
enum SessionAction {
    /// Create a new session, ending the current one
    New,
    /// Show the current session
    Show,
    /// End the current session
    End,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let store = SessionStore::open_default()?;

    // Commands that only touch local state work without a configured backend
    match &cli.command {
        Command::Session {
            action: SessionAction::Show,
        } => return commands::show_session(&store),
        Command::Export { output } => return commands::export(&store, output.as_deref()),
        Command::Clear => return commands::clear(&store),
        _ => {}
    }

    let settings = Settings::load(
        Some(&store.config_file()),
        Overrides {
            host: cli.host,
            app_name: cli.app_name,
        },
    )?;
    let config = settings.agent_config();

    match cli.command {
        Command::Session { action } => match action {
            SessionAction::New => commands::new_session(&config, &store).await.map(|_| ()),
            SessionAction::End => commands::end_session(&config, &store).await,
            SessionAction::Show => commands::show_session(&store),
        },
        Command::Chat { attach, message } => {
            commands::chat(&config, store, settings.theme, &attach, message).await
        }
        Command::Export { output } => commands::export(&store, output.as_deref()),
        Command::Clear => commands::clear(&store),
    }
}
