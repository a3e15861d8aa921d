use std::fs;
use std::path::{Path, PathBuf};

use adk_stream::attachment::Attachment;
use adk_stream::client::AgentClient;
use adk_stream::config::AgentConfig;
use adk_stream::session::{SessionClient, SessionDescriptor};
use adk_stream::transcript::export_markdown;
use anyhow::{Context, Result};
use chrono::{Local, TimeZone, Utc};
use console::style;
use serde_json::Map;

use crate::chat::ChatSession;
use crate::render::{Renderer, Theme};
use crate::store::SessionStore;

/// Create a session on the backend and make it the stored one, ending any previous session
pub async fn new_session(config: &AgentConfig, store: &SessionStore) -> Result<SessionDescriptor> {
    let client = SessionClient::new(config.clone())?;
    if let Some(previous) = store.load_session()? {
        client.terminate(&previous).await;
    }

    let session = client
        .create(Map::new())
        .await
        .context("Failed to create a session")?;
    store.save_session(&session)?;
    println!("Started session {}", style(&session.session_id).bold());
    Ok(session)
}

pub fn show_session(store: &SessionStore) -> Result<()> {
    match store.load_session()? {
        Some(session) => {
            println!("Session:  {}", session.session_id);
            println!("User:     {}", session.user_id);
            println!("App:      {}", session.app_name);
            if let Some(created) = Local.timestamp_millis_opt(session.created_at).single() {
                println!("Created:  {}", created.format("%Y-%m-%d %H:%M:%S"));
            }
            println!("Messages: {}", store.load_transcript(&session)?.len());
        }
        None => println!("No active session. Start one with `adk-chat session new`."),
    }
    Ok(())
}

pub async fn end_session(config: &AgentConfig, store: &SessionStore) -> Result<()> {
    match store.load_session()? {
        Some(session) => {
            SessionClient::new(config.clone())?.terminate(&session).await;
            store.forget_session()?;
            println!("Ended session {}", session.session_id);
        }
        None => println!("No active session."),
    }
    Ok(())
}

pub async fn chat(
    config: &AgentConfig,
    store: SessionStore,
    theme: Theme,
    attach: &[PathBuf],
    message: Option<String>,
) -> Result<()> {
    let attachments = attach
        .iter()
        .map(|path| Attachment::from_path(path))
        .collect::<Result<Vec<_>, _>>()?;

    let session = match store.load_session()? {
        Some(session) => session,
        None => new_session(config, &store).await?,
    };

    let client = AgentClient::new(config.clone())?;
    let mut chat = ChatSession::new(client, session, store, Renderer::new(theme))?;
    match message {
        Some(text) => chat.headless(&text, &attachments).await,
        None => {
            if !attachments.is_empty() {
                println!("Attachments are sent with the first message.");
            }
            chat.start_with(attachments).await
        }
    }
}

pub fn export(store: &SessionStore, output: Option<&Path>) -> Result<()> {
    let session = store
        .load_session()?
        .context("No active session to export")?;
    let messages = store.load_transcript(&session)?;
    let markdown = export_markdown(&session.app_name, &messages, Utc::now());

    match output {
        Some(path) => {
            fs::write(path, markdown)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Exported to {}", path.display());
        }
        None => print!("{}", markdown),
    }
    Ok(())
}

pub fn clear(store: &SessionStore) -> Result<()> {
    match store.load_session()? {
        Some(session) => {
            if store.clear_transcript(&session)? {
                println!("Cleared transcript for {}", session.session_id);
            } else {
                println!("Transcript for {} is already empty", session.session_id);
            }
        }
        None => println!("No active session."),
    }
    Ok(())
}
