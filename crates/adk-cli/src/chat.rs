use std::io;
use std::path::PathBuf;

use adk_stream::attachment::Attachment;
use adk_stream::client::{AgentClient, ExchangeEvent};
use adk_stream::errors::ChatError;
use adk_stream::models::content::Fragment;
use adk_stream::models::message::Message;
use adk_stream::protocol::{NewMessage, RunRequest};
use adk_stream::session::SessionDescriptor;
use anyhow::Result;
use cliclack::{input, spinner, ProgressBar};
use console::style;
use futures::StreamExt;

use crate::render::Renderer;
use crate::store::SessionStore;

#[derive(Debug, PartialEq)]
pub enum Input {
    Message(String),
    Attach(PathBuf),
    ToggleTheme,
    Help,
    Exit,
    /// Nothing to do; ask again
    Empty,
}

pub fn parse_input(text: &str) -> Input {
    let text = text.trim();
    if text.is_empty() {
        return Input::Empty;
    }
    if text.eq_ignore_ascii_case("/exit") || text.eq_ignore_ascii_case("/quit") {
        return Input::Exit;
    }
    if text.eq_ignore_ascii_case("/t") {
        return Input::ToggleTheme;
    }
    if text.eq_ignore_ascii_case("/?") {
        return Input::Help;
    }
    if let Some(path) = text.strip_prefix("/attach ") {
        return Input::Attach(PathBuf::from(path.trim()));
    }
    Input::Message(text.to_string())
}

/// Tracks how much of a streaming message is already on screen
#[derive(Debug, Default)]
pub struct ProgressPrinter {
    printed: usize,
}

impl ProgressPrinter {
    /// Fragments of `message` not yet returned by an earlier call
    pub fn unseen<'m>(&mut self, message: &'m Message) -> &'m [Fragment] {
        let fragments = message.fragments();
        let start = self.printed.min(fragments.len());
        self.printed = fragments.len();
        &fragments[start..]
    }
}

/// Keep whatever the agent managed to say, then the error itself
fn record_failure(messages: &mut Vec<Message>, error: &ChatError, partial: Option<Message>) {
    if let Some(partial) = partial.filter(|message| !message.fragments().is_empty()) {
        messages.push(partial);
    }
    messages.push(Message::agent_error(error));
}

/// What the transcript records for a user turn
fn user_summary(text: &str, attachments: &[Attachment]) -> String {
    if attachments.is_empty() {
        return text.to_string();
    }
    let names: Vec<&str> = attachments
        .iter()
        .map(|attachment| attachment.display_name.as_str())
        .collect();
    let attached = format!("[attached: {}]", names.join(", "));
    if text.trim().is_empty() {
        attached
    } else {
        format!("{}\n{}", text, attached)
    }
}

pub struct ChatSession {
    client: AgentClient,
    session: SessionDescriptor,
    store: SessionStore,
    messages: Vec<Message>,
    renderer: Renderer,
}

impl ChatSession {
    pub fn new(
        client: AgentClient,
        session: SessionDescriptor,
        store: SessionStore,
        renderer: Renderer,
    ) -> Result<Self> {
        let messages = store.load_transcript(&session)?;
        Ok(ChatSession {
            client,
            session,
            store,
            messages,
            renderer,
        })
    }

    /// Interactive loop. `attachments` go out with the first message.
    pub async fn start_with(&mut self, mut attachments: Vec<Attachment>) -> Result<()> {
        println!(
            "Chatting with {} in {} {}",
            style(&self.session.app_name).bold(),
            self.session.session_id,
            style("- type \"/exit\" to end, \"/?\" for help").dim()
        );
        if !self.messages.is_empty() {
            println!("Resuming conversation with {} messages\n", self.messages.len());
            for message in &self.messages {
                self.renderer.render_message(message)?;
            }
        }

        loop {
            match self.read_input()? {
                Input::Exit => break,
                Input::Empty => continue,
                Input::Help => print_help(),
                Input::ToggleTheme => self.renderer.toggle_theme(),
                Input::Attach(path) => match Attachment::from_path(&path) {
                    Ok(attachment) => {
                        println!("Attached {}", attachment.display_name);
                        attachments.push(attachment);
                    }
                    Err(e) => self.renderer.render_error(&e),
                },
                Input::Message(text) => {
                    let pending = std::mem::take(&mut attachments);
                    self.exchange(&text, &pending).await?;
                    println!();
                }
            }
        }

        println!(
            "Closing chat. Transcript at {}",
            self.store.transcript_file(&self.session).display()
        );
        Ok(())
    }

    pub async fn headless(&mut self, text: &str, attachments: &[Attachment]) -> Result<()> {
        self.exchange(text, attachments).await
    }

    fn read_input(&self) -> Result<Input> {
        let result: io::Result<String> = input("You:").placeholder("").multiline().interact();
        match result {
            Ok(text) => Ok(parse_input(&text)),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => Ok(Input::Exit),
            Err(e) => Err(e.into()),
        }
    }

    async fn exchange(&mut self, text: &str, attachments: &[Attachment]) -> Result<()> {
        let new_message = match NewMessage::user(text, attachments) {
            Ok(message) => message,
            Err(e) => {
                self.renderer.render_error(&e);
                return Ok(());
            }
        };

        self.messages
            .push(Message::user_text(user_summary(text, attachments)));
        self.persist();

        let mut spin: Option<ProgressBar> = Some(spinner());
        if let Some(spin) = &spin {
            spin.start("awaiting reply");
        }
        let mut printer = ProgressPrinter::default();
        let (mut events, cancel) = self
            .client
            .run_cancellable(RunRequest::new(&self.session, new_message));

        loop {
            tokio::select! {
                event = events.next() => {
                    if let Some(spin) = spin.take() {
                        spin.stop("");
                    }
                    match event {
                        Some(ExchangeEvent::Progress(snapshot)) => {
                            self.render_unseen(&mut printer, &snapshot)?;
                        }
                        Some(ExchangeEvent::Completed(message)) => {
                            self.render_unseen(&mut printer, &message)?;
                            self.messages.push(message);
                            break;
                        }
                        Some(ExchangeEvent::Failed { error, partial }) => {
                            self.renderer.render_error(&error);
                            record_failure(&mut self.messages, &error, partial);
                            break;
                        }
                        None => break,
                    }
                }
                _ = tokio::signal::ctrl_c(), if !cancel.is_cancelled() => {
                    // The stream answers with a cancelled failure carrying the partial reply
                    cancel.cancel();
                }
            }
        }

        self.persist();
        Ok(())
    }

    fn render_unseen(&self, printer: &mut ProgressPrinter, message: &Message) -> Result<()> {
        for fragment in printer.unseen(message) {
            self.renderer.render_fragment(fragment)?;
        }
        Ok(())
    }

    fn persist(&self) {
        if let Err(e) = self.store.save_transcript(&self.session, &self.messages) {
            tracing::warn!("Failed to persist messages: {}", e);
        }
    }
}

fn print_help() {
    println!("Commands:");
    println!("/exit - Exit the chat");
    println!("/attach <path> - Attach a file to the next message");
    println!("/t - Toggle Light/Dark theme");
    println!("/? - Display this help message");
    println!("Ctrl+C - Stop the reply in progress (keeps what arrived so far)");
}
