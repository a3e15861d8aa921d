use std::path::Path;

use adk_stream::config::{AgentConfig, DEFAULT_APP_NAME, DEFAULT_TIMEOUT_SECS};
use anyhow::{anyhow, Result};
use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;

use crate::render::Theme;

/// Values given on the command line; these win over every other source
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub host: Option<String>,
    pub app_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub host: String,
    #[serde(default)]
    pub session_host: Option<String>,
    #[serde(default = "default_app_name")]
    pub app_name: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub theme: Theme,
}

impl Settings {
    /// Layer defaults, the optional config file, `ADK_*` environment variables and
    /// command line overrides, in that order.
    pub fn load(config_file: Option<&Path>, overrides: Overrides) -> Result<Self> {
        let mut builder = Config::builder().set_default("app_name", DEFAULT_APP_NAME)?;

        if let Some(path) = config_file {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(false));
        }

        let config = builder
            .add_source(
                Environment::with_prefix("ADK")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("host", overrides.host)?
            .set_override_option("app_name", overrides.app_name)?
            .build()?;

        match config.try_deserialize::<Self>() {
            Ok(settings) => Ok(settings),
            Err(err) => {
                tracing::debug!("Configuration error: {:?}", &err);

                let error_str = err.to_string();
                if error_str.starts_with("missing field") {
                    let field = error_str
                        .trim_start_matches("missing field `")
                        .trim_end_matches('`');
                    Err(missing(field))
                } else if let config::ConfigError::NotFound(field) = &err {
                    Err(missing(field))
                } else {
                    Err(err.into())
                }
            }
        }
    }

    pub fn agent_config(&self) -> AgentConfig {
        let mut config = AgentConfig::new(self.host.clone()).with_app_name(self.app_name.clone());
        if let Some(session_host) = &self.session_host {
            config = config.with_session_host(session_host.clone());
        }
        config.timeout_secs = self.timeout_secs;
        config
    }
}

fn missing(field: &str) -> anyhow::Error {
    anyhow!(
        "{} is not configured: set {} or pass --{}",
        field,
        to_env_var(field),
        field.replace('_', "-")
    )
}

fn to_env_var(field: &str) -> String {
    format!("ADK_{}", field.to_uppercase())
}

fn default_app_name() -> String {
    DEFAULT_APP_NAME.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}
