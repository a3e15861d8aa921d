use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FragmentKind {
    Text,
    FunctionCall,
    FunctionResult,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionCall {
    pub call_id: String,
    pub function_name: String,
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionResult {
    pub call_id: String,
    #[serde(default)]
    pub result: Value,
}

/// The shape-specific part of a fragment. The variant is the fragment's kind, so a text
/// fragment can never carry call attributes and a call can never carry a result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FragmentBody {
    Text,
    FunctionCall(FunctionCall),
    FunctionResult(FunctionResult),
}

/// One unit of agent output, as appended to a message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fragment {
    #[serde(flatten)]
    pub body: FragmentBody,
    pub rendered_text: String,
    /// Milliseconds since the unix epoch
    pub produced_at: i64,
}

impl Fragment {
    pub fn new<S: Into<String>>(body: FragmentBody, rendered_text: S) -> Self {
        Fragment {
            body,
            rendered_text: rendered_text.into(),
            produced_at: Utc::now().timestamp_millis(),
        }
    }

    pub fn text<S: Into<String>>(text: S) -> Self {
        Fragment::new(FragmentBody::Text, text)
    }

    pub fn with_produced_at(mut self, produced_at: i64) -> Self {
        self.produced_at = produced_at;
        self
    }

    pub fn kind(&self) -> FragmentKind {
        match self.body {
            FragmentBody::Text => FragmentKind::Text,
            FragmentBody::FunctionCall(_) => FragmentKind::FunctionCall,
            FragmentBody::FunctionResult(_) => FragmentKind::FunctionResult,
        }
    }

    /// Get the text if this is a text fragment
    pub fn as_text(&self) -> Option<&str> {
        match self.body {
            FragmentBody::Text => Some(&self.rendered_text),
            _ => None,
        }
    }

    pub fn as_function_call(&self) -> Option<&FunctionCall> {
        match &self.body {
            FragmentBody::FunctionCall(call) => Some(call),
            _ => None,
        }
    }

    pub fn as_function_result(&self) -> Option<&FunctionResult> {
        match &self.body {
            FragmentBody::FunctionResult(result) => Some(result),
            _ => None,
        }
    }

    /// The call id for call and result fragments
    pub fn call_id(&self) -> Option<&str> {
        match &self.body {
            FragmentBody::Text => None,
            FragmentBody::FunctionCall(call) => Some(&call.call_id),
            FragmentBody::FunctionResult(result) => Some(&result.call_id),
        }
    }
}
