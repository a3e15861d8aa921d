use std::fs::{self, File};
use std::io::{self, BufRead, Write};
use std::path::Path;

use anyhow::Result;
use chrono::{DateTime, Local, TimeZone, Utc};

use crate::models::message::Message;
use crate::models::role::Role;

/// Write the transcript as JSON lines, replacing whatever the file held
pub fn persist_messages(path: &Path, messages: &[Message]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = File::create(path)?;
    write_messages(file, messages)
}

pub fn write_messages<W: Write>(writer: W, messages: &[Message]) -> Result<()> {
    let mut writer = io::BufWriter::new(writer);

    for message in messages {
        serde_json::to_writer(&mut writer, message)?;
        writeln!(writer)?;
    }

    writer.flush()?;
    Ok(())
}

/// Load a transcript written by `persist_messages`. A missing file is an empty transcript.
pub fn load_messages(path: &Path) -> Result<Vec<Message>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    read_messages(File::open(path)?)
}

pub fn read_messages<R: io::Read>(reader: R) -> Result<Vec<Message>> {
    let reader = io::BufReader::new(reader);
    let mut messages = Vec::new();

    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        messages.push(serde_json::from_str::<Message>(&line)?);
    }

    Ok(messages)
}

/// Render the agent's final answers as a Markdown document.
///
/// Only agent messages with some non-blank text are included; user turns and tool-only
/// agent turns are left out.
pub fn export_markdown(app_name: &str, messages: &[Message], exported_at: DateTime<Utc>) -> String {
    let mut markdown = String::from("# Chat Export\n\n");
    markdown.push_str(&format!(
        "**Exported on:** {}\n\n",
        exported_at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S")
    ));
    markdown.push_str(&format!("**Session:** {}\n\n", app_name));
    markdown.push_str("---\n\n");

    let responses = messages
        .iter()
        .filter(|message| message.role() == Role::Agent)
        .map(|message| (message, message.text()))
        .filter(|(_, text)| !text.trim().is_empty());

    for (index, (message, text)) in responses.enumerate() {
        markdown.push_str(&format!("## Response {}\n\n", index + 1));
        if let Some(time) = Local.timestamp_millis_opt(message.created_at()).single() {
            markdown.push_str(&format!("**Time:** {}\n\n", time.format("%Y-%m-%d %H:%M:%S")));
        }
        markdown.push_str(&text);
        markdown.push_str("\n\n---\n\n");
    }

    markdown
}
