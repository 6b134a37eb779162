//! Campaign Monitor subscriber lists.
//!
//! Docs: <https://www.campaignmonitor.com/api/v3-3/subscribers/>

use crate::adapters::http::transport_failure;
use crate::config::{optional_env, required_env};
use crate::utils::error::{ConnectorError, Result};
use crate::utils::validation::{validate_email, validate_non_empty_string, validate_url, Validate};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

const SERVICE: &str = "Campaign Monitor";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CustomField {
    pub key: String,
    pub value: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Subscriber {
    pub email_address: String,
    pub name: String,
    #[serde(default)]
    pub custom_fields: Vec<CustomField>,
    #[serde(default = "default_true")]
    pub resubscribe: bool,
    #[serde(default = "default_true")]
    pub restart_subscription_based_autoresponders: bool,
    #[serde(default = "default_consent")]
    pub consent_to_track: String,
}

fn default_true() -> bool {
    true
}

fn default_consent() -> String {
    "Unchanged".to_string()
}

impl Subscriber {
    pub fn new(email_address: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            email_address: email_address.into(),
            name: name.into(),
            custom_fields: Vec::new(),
            resubscribe: true,
            restart_subscription_based_autoresponders: true,
            consent_to_track: default_consent(),
        }
    }

    pub fn with_field(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.custom_fields.push(CustomField {
            key: key.to_string(),
            value: value.into(),
        });
        self
    }
}

#[derive(Debug, Clone)]
pub struct CampaignMonitorConfig {
    pub api_key: String,
    pub password: String,
    pub list_api_id: String,
    pub api_base: String,
}

impl CampaignMonitorConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            api_key: required_env("api_key")?,
            password: required_env("password")?,
            list_api_id: required_env("list_api_id")?,
            api_base: optional_env(
                "campaign_monitor_api_base",
                "https://api.createsend.com/api/v3.3",
            ),
        })
    }

    pub fn subscriber_url(&self) -> String {
        format!(
            "{}/subscribers/{}.json",
            self.api_base.trim_end_matches('/'),
            self.list_api_id
        )
    }
}

impl Validate for CampaignMonitorConfig {
    fn validate(&self) -> Result<()> {
        validate_non_empty_string("api_key", &self.api_key)?;
        validate_non_empty_string("list_api_id", &self.list_api_id)?;
        validate_url("api_base", &self.api_base)
    }
}

pub struct CampaignMonitor {
    client: Client,
    config: CampaignMonitorConfig,
}

impl CampaignMonitor {
    pub fn new(config: CampaignMonitorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            client: Client::new(),
            config,
        })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(CampaignMonitorConfig::from_env()?)
    }

    /// Adds or resubscribes `subscriber`. Campaign Monitor answers 201 with
    /// the e-mail address on success; every other status is a failure.
    pub async fn add_subscriber_to_list(&self, subscriber: &Subscriber) -> Result<()> {
        validate_email("EmailAddress", &subscriber.email_address)?;
        tracing::info!("Adding subscriber to Campaign Monitor list");
        tracing::debug!("Subscriber payload: {:?}", subscriber);

        let response = self
            .client
            .post(self.config.subscriber_url())
            .basic_auth(&self.config.api_key, Some(&self.config.password))
            .json(subscriber)
            .send()
            .await
            .map_err(|e| transport_failure(SERVICE, e))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        tracing::info!("Campaign Monitor status_code: {}", status.as_u16());
        tracing::debug!("Campaign Monitor response: {}", body);

        if status != StatusCode::CREATED {
            tracing::error!("Campaign Monitor rejected subscriber: {}", body);
            return Err(ConnectorError::UnexpectedStatusError {
                service: SERVICE,
                status: status.as_u16(),
                body,
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscriber_serializes_pascal_case() {
        let subscriber = Subscriber::new("post@man.com", "Post Man").with_field("Zip", 99999);
        let json = serde_json::to_value(&subscriber).unwrap();

        assert_eq!(json["EmailAddress"], "post@man.com");
        assert_eq!(json["Name"], "Post Man");
        assert_eq!(json["CustomFields"][0]["Key"], "Zip");
        assert_eq!(json["CustomFields"][0]["Value"], 99999);
        assert_eq!(json["Resubscribe"], true);
        assert_eq!(json["RestartSubscriptionBasedAutoresponders"], true);
        assert_eq!(json["ConsentToTrack"], "Unchanged");
    }

    #[test]
    fn test_subscriber_defaults_when_deserialized() {
        let subscriber: Subscriber =
            serde_json::from_str(r#"{"EmailAddress":"a@b.co","Name":"A"}"#).unwrap();
        assert!(subscriber.resubscribe);
        assert!(subscriber.custom_fields.is_empty());
        assert_eq!(subscriber.consent_to_track, "Unchanged");
    }

    #[test]
    fn test_subscriber_url() {
        let config = CampaignMonitorConfig {
            api_key: "key".to_string(),
            password: "x".to_string(),
            list_api_id: "abc123".to_string(),
            api_base: "https://api.createsend.com/api/v3.3/".to_string(),
        };
        assert_eq!(
            config.subscriber_url(),
            "https://api.createsend.com/api/v3.3/subscribers/abc123.json"
        );
    }
}
