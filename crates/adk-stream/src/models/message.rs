use std::collections::HashSet;
use std::fmt::Display;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::content::{Fragment, FunctionCall, FunctionResult};
use super::role::Role;

/// Termination reason recorded when an exchange is abandoned or fails mid-stream
pub const ABORTED_REASON: &str = "ABORTED";
/// Termination reason used when the stream ends without reporting one
pub const STOP_REASON: &str = "STOP";
/// Termination reason recorded on synthesized error messages
pub const ERROR_REASON: &str = "ERROR";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageState {
    Open,
    /// The reason may be empty when none was reported.
    Closed { termination_reason: String },
}

/// A message to or from the agent.
///
/// Fields are only reachable through accessors: fragments are append-only while the
/// message is open and the open -> closed transition happens once, both enforced by
/// `MessageAccumulator`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    id: String,
    role: Role,
    fragments: Vec<Fragment>,
    state: MessageState,
    /// Milliseconds since the unix epoch
    created_at: i64,
}

impl Message {
    pub(crate) fn open(role: Role) -> Self {
        Message {
            id: format!("msg_{}", Uuid::new_v4().simple()),
            role,
            fragments: Vec::new(),
            state: MessageState::Open,
            created_at: Utc::now().timestamp_millis(),
        }
    }

    /// A complete user turn holding a single text fragment
    pub fn user_text<S: Into<String>>(text: S) -> Self {
        Message::open(Role::User)
            .with_fragments(vec![Fragment::text(text)])
            .closed(String::new())
    }

    /// A complete agent turn describing a failed exchange
    pub fn agent_error<E: Display>(error: E) -> Self {
        Message::open(Role::Agent)
            .with_fragments(vec![Fragment::text(format!(
                "Sorry, I encountered an error: {}",
                error
            ))])
            .closed(ERROR_REASON.to_string())
    }

    pub(crate) fn with_fragments(mut self, fragments: Vec<Fragment>) -> Self {
        self.fragments.extend(fragments);
        self
    }

    pub(crate) fn closed(mut self, termination_reason: String) -> Self {
        self.state = MessageState::Closed { termination_reason };
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }

    pub fn state(&self) -> &MessageState {
        &self.state
    }

    pub fn created_at(&self) -> i64 {
        self.created_at
    }

    pub fn is_open(&self) -> bool {
        matches!(self.state, MessageState::Open)
    }

    /// `None` while the message is open
    pub fn termination_reason(&self) -> Option<&str> {
        match &self.state {
            MessageState::Open => None,
            MessageState::Closed { termination_reason } => Some(termination_reason),
        }
    }

    /// All text fragments joined by a single space
    pub fn text(&self) -> String {
        self.fragments
            .iter()
            .filter_map(Fragment::as_text)
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn function_calls(&self) -> Vec<&FunctionCall> {
        self.fragments
            .iter()
            .filter_map(Fragment::as_function_call)
            .collect()
    }

    pub fn function_results(&self) -> Vec<&FunctionResult> {
        self.fragments
            .iter()
            .filter_map(Fragment::as_function_result)
            .collect()
    }

    /// Call ids of function calls that have no matching result in this message yet, in
    /// the order the calls first appeared.
    pub fn pending_call_ids(&self) -> Vec<&str> {
        let answered: HashSet<&str> = self
            .function_results()
            .into_iter()
            .map(|result| result.call_id.as_str())
            .collect();

        let mut seen = HashSet::new();
        self.function_calls()
            .into_iter()
            .map(|call| call.call_id.as_str())
            .filter(|id| !answered.contains(id) && seen.insert(*id))
            .collect()
    }

    /// Whether an observer should still treat this message as in progress
    pub fn is_working(&self) -> bool {
        self.is_open() || !self.pending_call_ids().is_empty()
    }
}
