#[cfg(feature = "cli")]
pub mod cli;

use crate::utils::error::{ConnectorError, Result};
use serde::{Deserialize, Serialize};
use std::env;

pub fn required_env(name: &str) -> Result<String> {
    env::var(name).map_err(|_| ConnectorError::MissingEnvError {
        name: name.to_string(),
    })
}

pub fn optional_env(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

/// Shared AWS configuration from the default provider chain.
pub async fn load_aws_config() -> aws_config::SdkConfig {
    aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await
}

/// Deployment stage of the calling API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    #[default]
    Dev,
    Staging,
    Prod,
}

impl From<&str> for Stage {
    fn from(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "v1" | "prod" | "production" => Stage::Prod,
            "stage" | "staging" => Stage::Staging,
            _ => Stage::Dev,
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Dev => "dev",
            Stage::Staging => "staging",
            Stage::Prod => "prod",
        };
        f.write_str(name)
    }
}
