//! SendGrid v3 mail send.
//!
//! Docs: <https://www.twilio.com/docs/sendgrid/api-reference/mail-send/mail-send>

use crate::adapters::http::{ensure_success, transport_failure};
use crate::config::{optional_env, required_env};
use crate::domain::model::HandlerResponse;
use crate::utils::error::{ConnectorError, Result};
use crate::utils::validation::{validate_email, validate_non_empty_string, validate_url, Validate};
use reqwest::Client;
use serde::Serialize;

const SERVICE: &str = "SendGrid";

#[derive(Debug, Clone)]
pub struct SendGridConfig {
    pub api_key: String,
    pub api_base: String,
}

impl SendGridConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            api_key: required_env("SENDGRID_API_KEY")?,
            api_base: optional_env("SENDGRID_API_BASE", "https://api.sendgrid.com"),
        })
    }
}

impl Validate for SendGridConfig {
    fn validate(&self) -> Result<()> {
        validate_non_empty_string("SENDGRID_API_KEY", &self.api_key)?;
        validate_url("api_base", &self.api_base)
    }
}

#[derive(Debug, Serialize)]
struct Address<'a> {
    email: &'a str,
}

#[derive(Debug, Serialize)]
struct Personalization<'a> {
    to: Vec<Address<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    #[serde(rename = "type")]
    content_type: &'a str,
    value: &'a str,
}

#[derive(Debug, Serialize)]
struct Mail<'a> {
    personalizations: Vec<Personalization<'a>>,
    from: Address<'a>,
    subject: &'a str,
    content: Vec<Content<'a>>,
}

/// Splits a comma separated receiver list, dropping blanks.
fn parse_receivers(email_addresses: &str) -> Vec<String> {
    email_addresses
        .split(',')
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .map(str::to_string)
        .collect()
}

pub struct SendGrid {
    client: Client,
    config: SendGridConfig,
    from_email: String,
    to_emails: Vec<String>,
}

impl SendGrid {
    pub fn new(config: SendGridConfig, from_email: &str, to_emails: &str) -> Result<Self> {
        config.validate()?;
        validate_email("from_email", from_email)?;
        let to_emails = parse_receivers(to_emails);
        for email in &to_emails {
            validate_email("to_emails", email)?;
        }

        Ok(Self {
            client: Client::new(),
            config,
            from_email: from_email.trim().to_string(),
            to_emails,
        })
    }

    pub fn set_email_sender(&mut self, email_address: &str) -> HandlerResponse {
        if let Err(e) = validate_email("from_email", email_address) {
            tracing::error!("Unable to set sender email: {}", e);
            return HandlerResponse::failure("Unable to set sender email");
        }

        self.from_email = email_address.trim().to_string();
        tracing::info!("SendGrid sender set");
        HandlerResponse::success("success")
    }

    pub fn set_email_receivers(&mut self, email_addresses: &str) -> HandlerResponse {
        let receivers = parse_receivers(email_addresses);
        let valid = !receivers.is_empty()
            && receivers
                .iter()
                .all(|e| validate_email("to_emails", e).is_ok());

        if !valid {
            tracing::error!("Unable to set email receivers from '{}'", email_addresses);
            return HandlerResponse::failure("Unable to set email receivers");
        }

        self.to_emails = receivers;
        tracing::info!("SendGrid receivers set ({})", self.to_emails.len());
        HandlerResponse::success("success")
    }

    pub fn receivers(&self) -> &[String] {
        &self.to_emails
    }

    pub async fn send_email(&self, subject: &str, message_body: &str) -> HandlerResponse {
        tracing::info!("Sending email through SendGrid");

        match self.try_send(subject, message_body).await {
            Ok(()) => HandlerResponse::success("success"),
            Err(e) => {
                tracing::error!("SendGrid send_email failed: {}", e);
                HandlerResponse::failure("Unable to send email")
            }
        }
    }

    async fn try_send(&self, subject: &str, message_body: &str) -> Result<()> {
        if self.to_emails.is_empty() {
            return Err(ConnectorError::config("SendGrid has no receivers"));
        }

        let mail = Mail {
            personalizations: vec![Personalization {
                to: self
                    .to_emails
                    .iter()
                    .map(|email| Address { email: email.as_str() })
                    .collect(),
            }],
            from: Address {
                email: &self.from_email,
            },
            subject,
            content: vec![Content {
                content_type: "text/html",
                value: message_body,
            }],
        };

        let response = self
            .client
            .post(format!(
                "{}/v3/mail/send",
                self.config.api_base.trim_end_matches('/')
            ))
            .bearer_auth(&self.config.api_key)
            .json(&mail)
            .send()
            .await
            .map_err(|e| transport_failure(SERVICE, e))?;

        let response = ensure_success(SERVICE, response).await?;
        tracing::info!("SendGrid status_code: {}", response.status().as_u16());
        tracing::debug!("SendGrid headers: {:?}", response.headers());
        Ok(())
    }
}
