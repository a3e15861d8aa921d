use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::attachment::Attachment;
use crate::errors::{ChatError, ChatResult};
use crate::models::role::Role;
use crate::session::SessionDescriptor;

/// Body posted to the streaming run endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRequest {
    pub app_name: String,
    pub user_id: String,
    pub session_id: String,
    pub new_message: NewMessage,
    pub streaming: bool,
    /// Passed through to the backend untouched
    pub state_delta: Map<String, Value>,
}

impl RunRequest {
    pub fn new(session: &SessionDescriptor, new_message: NewMessage) -> Self {
        RunRequest {
            app_name: session.app_name.clone(),
            user_id: session.user_id.clone(),
            session_id: session.session_id.clone(),
            new_message,
            streaming: true,
            state_delta: Map::new(),
        }
    }

    pub fn with_state_delta(mut self, state_delta: Map<String, Value>) -> Self {
        self.state_delta = state_delta;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewMessage {
    pub role: String,
    pub parts: Vec<Part>,
}

impl NewMessage {
    /// Build a user turn from typed text and already-encoded attachments.
    ///
    /// Blank text is left out; an attachment-only message is fine, but a message with
    /// neither is rejected before anything goes on the wire.
    pub fn user(text: &str, attachments: &[Attachment]) -> ChatResult<Self> {
        let mut parts = Vec::new();

        if !text.trim().is_empty() {
            parts.push(Part::Text {
                text: text.to_string(),
            });
        }

        for attachment in attachments {
            parts.push(Part::InlineData {
                inline_data: InlineData::from(attachment),
            });
        }

        if parts.is_empty() {
            return Err(ChatError::EmptyMessage);
        }

        Ok(NewMessage {
            role: Role::User.wire_name().to_string(),
            parts,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Part {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub display_name: String,
    /// Base64, without a data-URL prefix
    pub data: String,
    pub mime_type: String,
}

impl From<&Attachment> for InlineData {
    fn from(attachment: &Attachment) -> Self {
        InlineData {
            display_name: attachment.display_name.clone(),
            data: attachment.data.clone(),
            mime_type: attachment.mime_type.clone(),
        }
    }
}
