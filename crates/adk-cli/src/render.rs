use std::fmt::Display;
use std::io::{self, Write};

use adk_stream::models::content::{Fragment, FragmentBody};
use adk_stream::models::message::Message;
use adk_stream::models::role::Role;
use anyhow::{anyhow, Result};
use bat::WrappingMode;
use console::style;
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    #[default]
    Dark,
}

impl Theme {
    fn bat_theme(&self) -> &'static str {
        match self {
            Theme::Light => "GitHub",
            Theme::Dark => "zenburn",
        }
    }

    pub fn toggled(&self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }
}

pub struct Renderer {
    theme: Theme,
}

impl Renderer {
    pub fn new(theme: Theme) -> Self {
        Renderer { theme }
    }

    pub fn toggle_theme(&mut self) {
        self.theme = self.theme.toggled();
        println!("Switching to {:?} theme", self.theme);
    }

    pub fn render_fragment(&self, fragment: &Fragment) -> Result<()> {
        let theme = self.theme.bat_theme();
        match &fragment.body {
            FragmentBody::Text => print(&fragment.rendered_text, theme)?,
            FragmentBody::FunctionCall(call) => print_tool_request(
                &serde_json::to_string_pretty(&call.arguments)?,
                theme,
                &call.function_name,
            )?,
            FragmentBody::FunctionResult(result) => {
                let (content, language) = format_result(&result.result);
                print_tool_response(&content, theme, language)?
            }
        }
        io::stdout().flush()?;
        Ok(())
    }

    /// Replay a stored message, as when resuming a session
    pub fn render_message(&self, message: &Message) -> Result<()> {
        match message.role() {
            Role::User => println!("{} {}", style("you>").cyan().bold(), message.text()),
            Role::Agent => {
                for fragment in message.fragments() {
                    self.render_fragment(fragment)?;
                }
            }
        }
        println!();
        Ok(())
    }

    pub fn render_error(&self, error: &dyn Display) {
        eprintln!("{} {}", style("error:").red().bold(), error);
    }
}

/// Pretty JSON for structured results; plain strings are unquoted so multi-line tool
/// output reads naturally.
fn format_result(result: &Value) -> (String, &'static str) {
    let content = match result {
        Value::String(text) => text.clone(),
        other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    };
    let language = if content.starts_with('{') || content.starts_with('[') {
        "JSON"
    } else {
        "Markdown"
    };
    (content, language)
}

fn print_tool_request(content: &str, theme: &str, tool_name: &str) -> Result<()> {
    bat::PrettyPrinter::new()
        .input(
            bat::Input::from_bytes(content.as_bytes())
                .name(format!("Function call: {}", tool_name)),
        )
        .theme(theme)
        .language("JSON")
        .grid(true)
        .header(true)
        .wrapping_mode(WrappingMode::Character)
        .print()
        .map_err(|e| anyhow!("Failed to render function call: {}", e))?;
    Ok(())
}

fn print_tool_response(content: &str, theme: &str, language: &str) -> Result<()> {
    bat::PrettyPrinter::new()
        .input(bat::Input::from_bytes(content.as_bytes()).name("Function result:"))
        .theme(theme)
        .language(language)
        .grid(true)
        .header(true)
        .wrapping_mode(WrappingMode::Character)
        .print()
        .map_err(|e| anyhow!("Failed to render function result: {}", e))?;
    Ok(())
}

fn print(content: &str, theme: &str) -> Result<()> {
    bat::PrettyPrinter::new()
        .input(bat::Input::from_bytes(content.as_bytes()))
        .theme(theme)
        .language("Markdown")
        .wrapping_mode(WrappingMode::Character)
        .print()
        .map_err(|e| anyhow!("Failed to render text: {}", e))?;
    Ok(())
}
