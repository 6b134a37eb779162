//! Read and post messages in a Discord channel as a bot.

use crate::adapters::http::{ensure_success, transport_failure};
use crate::config::{optional_env, required_env};
use crate::utils::error::{ConnectorError, Result};
use crate::utils::validation::{validate_non_empty_string, validate_url, Validate};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::Client;
use serde_json::Value;

const SERVICE: &str = "Discord";

#[derive(Debug, Clone)]
pub struct DiscordConfig {
    pub auth_token: String,
    pub channel_id: String,
    pub api_base: String,
}

impl DiscordConfig {
    pub fn new(auth_token: impl Into<String>, channel_id: impl Into<String>) -> Self {
        Self {
            auth_token: auth_token.into(),
            channel_id: channel_id.into(),
            api_base: "https://discord.com/api".to_string(),
        }
    }

    pub fn from_env() -> Result<Self> {
        let mut config = Self::new(
            required_env("DISCORD_AUTH_TOKEN")?,
            required_env("DISCORD_CHANNEL_ID")?,
        );
        config.api_base = optional_env("DISCORD_API_BASE", &config.api_base);
        Ok(config)
    }
}

impl Validate for DiscordConfig {
    fn validate(&self) -> Result<()> {
        validate_non_empty_string("auth_token", &self.auth_token)?;
        validate_non_empty_string("channel_id", &self.channel_id)?;
        validate_url("api_base", &self.api_base)
    }
}

pub struct DiscordChannel {
    client: Client,
    url: String,
    headers: HeaderMap,
}

impl DiscordChannel {
    pub fn new(config: DiscordConfig) -> Result<Self> {
        config.validate()?;

        let mut token = HeaderValue::from_str(&config.auth_token)
            .map_err(|_| ConnectorError::config("Discord auth token is not a valid header value"))?;
        token.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, token);

        Ok(Self {
            client: Client::new(),
            url: format!(
                "{}/channels/{}/messages",
                config.api_base.trim_end_matches('/'),
                config.channel_id
            ),
            headers,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Posts `payload` (e.g. `{"content": "..."}`) and returns the created
    /// message object.
    pub async fn post_message_to_channel(&self, payload: &Value) -> Result<Value> {
        tracing::info!("Posting message to Discord channel");

        let response = self
            .client
            .post(&self.url)
            .headers(self.headers.clone())
            .json(payload)
            .send()
            .await
            .map_err(|e| transport_failure(SERVICE, e))?;

        let message: Value = ensure_success(SERVICE, response).await?.json().await?;
        tracing::debug!("Discord response: {}", message);
        Ok(message)
    }

    pub async fn get_messages_from_channel(&self) -> Result<Value> {
        tracing::info!("Fetching messages from Discord channel");

        let response = self
            .client
            .get(&self.url)
            .headers(self.headers.clone())
            .send()
            .await
            .map_err(|e| transport_failure(SERVICE, e))?;

        let messages: Value = ensure_success(SERVICE, response).await?.json().await?;
        tracing::debug!("Discord response: {}", messages);
        Ok(messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_url() {
        let channel = DiscordChannel::new(DiscordConfig::new("Bot abc", "1234")).unwrap();
        assert_eq!(
            channel.url(),
            "https://discord.com/api/channels/1234/messages"
        );
    }

    #[test]
    fn test_rejects_empty_token() {
        assert!(DiscordChannel::new(DiscordConfig::new("", "1234")).is_err());
    }
}
