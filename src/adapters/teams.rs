//! Microsoft Teams incoming webhooks.
//!
//! Docs: <https://learn.microsoft.com/en-us/microsoftteams/platform/webhooks-and-connectors/how-to/connectors-using>

use crate::adapters::http::{ensure_success, transport_failure};
use crate::config::required_env;
use crate::domain::model::FailureAlert;
use crate::domain::ports::FailureNotifier;
use crate::utils::error::Result;
use crate::utils::validation::{validate_url, Validate};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

const SERVICE: &str = "Microsoft Teams";
const ACTIVITY_IMAGE: &str =
    "https://c8.alamy.com/comp/E59H30/falling-man-isolated-on-white-background-E59H30.jpg";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageCard {
    #[serde(rename = "@type")]
    pub card_type: String,
    pub summary: String,
    pub sections: Vec<Section>,
    #[serde(rename = "potentialAction")]
    pub potential_action: Vec<OpenUriAction>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    pub activity_title: String,
    pub activity_subtitle: String,
    pub activity_image: String,
    pub facts: Vec<Fact>,
    pub markdown: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fact {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenUriAction {
    #[serde(rename = "@type")]
    pub action_type: String,
    pub name: String,
    pub targets: Vec<UriTarget>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UriTarget {
    pub os: String,
    pub uri: String,
}

fn fact(name: &str, value: &str) -> Fact {
    Fact {
        name: name.to_string(),
        value: value.to_string(),
    }
}

/// Builds the failure card: one section of facts plus a "View Logs" link.
pub fn build_payload(alert: &FailureAlert) -> MessageCard {
    tracing::debug!("Building Teams card for {}", alert.function_name);

    MessageCard {
        card_type: "MessageCard".to_string(),
        summary: "Lambda Failure!!!".to_string(),
        sections: vec![Section {
            activity_title: alert.lambda_name.clone(),
            activity_subtitle: alert.function_name.clone(),
            activity_image: ACTIVITY_IMAGE.to_string(),
            facts: vec![
                fact("Location", &alert.location),
                fact("Status", &alert.status),
                fact("Description", &alert.description),
            ],
            markdown: true,
        }],
        potential_action: vec![OpenUriAction {
            action_type: "OpenUri".to_string(),
            name: "View Logs".to_string(),
            targets: vec![UriTarget {
                os: "default".to_string(),
                uri: alert.logs_link.clone(),
            }],
        }],
    }
}

#[derive(Debug, Clone)]
pub struct TeamsConfig {
    pub webhook_url: String,
}

impl TeamsConfig {
    pub fn new(webhook_url: impl Into<String>) -> Self {
        Self {
            webhook_url: webhook_url.into(),
        }
    }

    pub fn from_env() -> Result<Self> {
        Ok(Self::new(required_env("TEAMS_WEBHOOK_URL")?))
    }
}

impl Validate for TeamsConfig {
    fn validate(&self) -> Result<()> {
        validate_url("webhook_url", &self.webhook_url)
    }
}

pub struct TeamsWebhook {
    client: Client,
    config: TeamsConfig,
}

impl TeamsWebhook {
    pub fn new(config: TeamsConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            client: Client::new(),
            config,
        })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(TeamsConfig::from_env()?)
    }

    pub async fn send_webhook_message_to_channel(&self, card: &MessageCard) -> Result<()> {
        tracing::info!("Posting Teams card to webhook");

        let response = self
            .client
            .post(&self.config.webhook_url)
            .json(card)
            .send()
            .await
            .map_err(|e| transport_failure(SERVICE, e))?;

        ensure_success(SERVICE, response).await?;

        tracing::info!("Teams card delivered");
        Ok(())
    }
}

#[async_trait]
impl FailureNotifier for TeamsWebhook {
    async fn notify(&self, alert: &FailureAlert) -> Result<()> {
        let card = build_payload(alert);
        self.send_webhook_message_to_channel(&card).await
    }
}
