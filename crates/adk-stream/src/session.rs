use chrono::Utc;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::config::AgentConfig;
use crate::errors::{ChatError, ChatResult};

const ID_ALPHABET: [char; 36] = [
    '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', 'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i',
    'j', 'k', 'l', 'm', 'n', 'o', 'p', 'q', 'r', 's', 't', 'u', 'v', 'w', 'x', 'y', 'z',
];

/// Identifies one conversation on the agent backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDescriptor {
    pub session_id: String,
    pub user_id: String,
    pub app_name: String,
    /// Milliseconds since the unix epoch
    pub created_at: i64,
}

impl SessionDescriptor {
    pub fn is_valid(&self) -> bool {
        !self.session_id.is_empty() && !self.user_id.is_empty() && !self.app_name.is_empty()
    }
}

/// Client for the session control plane: creating and deleting sessions
pub struct SessionClient {
    client: Client,
    config: AgentConfig,
}

impl SessionClient {
    pub fn new(config: AgentConfig) -> ChatResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(ChatError::Request)?;

        Ok(Self { client, config })
    }

    /// Register a new session with freshly generated ids
    pub async fn create(&self, initial_state: Map<String, Value>) -> ChatResult<SessionDescriptor> {
        let now = Utc::now().timestamp_millis();
        let user_id = format!("user-{}", now);
        let session_id = format!("session-{}-{}", now, nanoid::nanoid!(9, &ID_ALPHABET));

        let url = self
            .config
            .session_url(&self.config.app_name, &user_id, &session_id);
        let response = self
            .client
            .post(&url)
            .json(&json!({ "initial_state": initial_state }))
            .send()
            .await
            .map_err(ChatError::Request)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ChatError::Status {
                status: status.as_u16(),
                body,
            });
        }

        tracing::info!(%session_id, %user_id, app = %self.config.app_name, "created session");
        Ok(SessionDescriptor {
            session_id,
            user_id,
            app_name: self.config.app_name.clone(),
            created_at: now,
        })
    }

    /// Tell the backend the session is over. Failures are only logged; the caller drops
    /// its local state either way.
    pub async fn terminate(&self, session: &SessionDescriptor) {
        let url = self.config.session_url(
            &session.app_name,
            &session.user_id,
            &session.session_id,
        );

        match self.client.delete(&url).send().await {
            Ok(response) if response.status().is_success() => {
                tracing::info!(session_id = %session.session_id, "terminated session");
            }
            Ok(response) => {
                tracing::warn!(
                    session_id = %session.session_id,
                    status = %response.status(),
                    "failed to delete session on backend"
                );
            }
            Err(error) => {
                tracing::warn!(
                    session_id = %session.session_id,
                    %error,
                    "failed to notify backend of session termination"
                );
            }
        }
    }
}
