use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{ChatError, ChatResult};

pub const DEFAULT_APP_NAME: &str = "startup_investor_agent";
pub const DEFAULT_TIMEOUT_SECS: u64 = 600;

/// Where the agent backend lives and which app on it we talk to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Base URL of the streaming run endpoint
    pub host: String,
    /// Base URL of the session control plane, usually the same server
    pub session_host: String,
    pub app_name: String,
    pub timeout_secs: u64,
}

impl AgentConfig {
    pub fn new<S: Into<String>>(host: S) -> Self {
        let host = host.into();
        Self {
            session_host: host.clone(),
            host,
            app_name: DEFAULT_APP_NAME.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    pub fn with_session_host<S: Into<String>>(mut self, session_host: S) -> Self {
        self.session_host = session_host.into();
        self
    }

    pub fn with_app_name<S: Into<String>>(mut self, app_name: S) -> Self {
        self.app_name = app_name.into();
        self
    }

    /// Load configuration from `ADK_*` environment variables
    pub fn from_env() -> ChatResult<Self> {
        let host = Self::get_env("ADK_HOST", true, None)?
            .ok_or_else(|| ChatError::Config("ADK_HOST must be set".to_string()))?;
        let session_host = Self::get_env("ADK_SESSION_HOST", false, Some(host.clone()))?
            .unwrap_or_else(|| host.clone());
        let app_name = Self::get_env("ADK_APP_NAME", false, Some(DEFAULT_APP_NAME.to_string()))?
            .unwrap_or_else(|| DEFAULT_APP_NAME.to_string());
        let timeout_secs = match Self::get_env("ADK_TIMEOUT_SECS", false, None)? {
            Some(value) => value.parse().map_err(|_| {
                ChatError::Config(format!("ADK_TIMEOUT_SECS must be a number, got '{}'", value))
            })?,
            None => DEFAULT_TIMEOUT_SECS,
        };

        Ok(Self {
            host,
            session_host,
            app_name,
            timeout_secs,
        })
    }

    fn get_env(key: &str, required: bool, default: Option<String>) -> ChatResult<Option<String>> {
        match env::var(key) {
            Ok(value) => Ok(Some(value)),
            Err(env::VarError::NotPresent) if !required => Ok(default),
            Err(env::VarError::NotPresent) => Err(ChatError::Config(format!(
                "Environment variable '{}' is required but not set.",
                key
            ))),
            Err(e) => Err(ChatError::Config(format!("{}: {}", key, e))),
        }
    }

    pub fn run_url(&self) -> String {
        format!("{}/run_sse", self.host.trim_end_matches('/'))
    }

    /// `app_name` is passed in so stored sessions keep the app they were created under
    pub fn session_url(&self, app_name: &str, user_id: &str, session_id: &str) -> String {
        format!(
            "{}/apps/{}/users/{}/sessions/{}",
            self.session_host.trim_end_matches('/'),
            app_name,
            user_id,
            session_id
        )
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        for key in ["ADK_HOST", "ADK_SESSION_HOST", "ADK_APP_NAME", "ADK_TIMEOUT_SECS"] {
            env::remove_var(key);
        }
    }

    #[test]
    fn test_urls_trim_trailing_slash() {
        let config = AgentConfig::new("http://localhost:8000/")
            .with_session_host("http://control:8080/")
            .with_app_name("demo");
        assert_eq!(config.run_url(), "http://localhost:8000/run_sse");
        assert_eq!(
            config.session_url(&config.app_name, "u1", "s1"),
            "http://control:8080/apps/demo/users/u1/sessions/s1"
        );
    }

    #[test]
    #[serial]
    fn test_from_env_defaults() -> ChatResult<()> {
        clear_env();
        env::set_var("ADK_HOST", "http://agent:8000");

        let config = AgentConfig::from_env()?;
        assert_eq!(config.host, "http://agent:8000");
        assert_eq!(config.session_host, "http://agent:8000");
        assert_eq!(config.app_name, DEFAULT_APP_NAME);
        assert_eq!(config.timeout(), Duration::from_secs(DEFAULT_TIMEOUT_SECS));

        clear_env();
        Ok(())
    }

    #[test]
    #[serial]
    fn test_from_env_overrides() -> ChatResult<()> {
        clear_env();
        env::set_var("ADK_HOST", "http://agent:8000");
        env::set_var("ADK_SESSION_HOST", "http://control:8080");
        env::set_var("ADK_APP_NAME", "research_agent");
        env::set_var("ADK_TIMEOUT_SECS", "30");

        let config = AgentConfig::from_env()?;
        assert_eq!(config.session_host, "http://control:8080");
        assert_eq!(config.app_name, "research_agent");
        assert_eq!(config.timeout_secs, 30);

        clear_env();
        Ok(())
    }

    #[test]
    #[serial]
    fn test_from_env_requires_host() {
        clear_env();
        assert!(matches!(AgentConfig::from_env(), Err(ChatError::Config(_))));
    }

    #[test]
    #[serial]
    fn test_from_env_rejects_bad_timeout() {
        clear_env();
        env::set_var("ADK_HOST", "http://agent:8000");
        env::set_var("ADK_TIMEOUT_SECS", "soon");
        assert!(matches!(AgentConfig::from_env(), Err(ChatError::Config(_))));
        clear_env();
    }
}
