//! HTML e-mail through Amazon SES (v2 API), with the receiver and subject
//! picked per deployment stage.

use crate::config::{load_aws_config, required_env, Stage};
use crate::utils::error::{ConnectorError, Result};
use crate::utils::validation::{validate_aws_region, validate_email, validate_non_empty_string, Validate};
use aws_sdk_sesv2::config::Region;
use aws_sdk_sesv2::types::{Body, Content, Destination, EmailContent, Message};
use aws_sdk_sesv2::Client;

const SERVICE: &str = "SES";
pub const DEFAULT_REGION: &str = "us-east-1";
pub const DEFAULT_CHARSET: &str = "UTF-8";

#[derive(Debug, Clone)]
pub struct SesConfig {
    pub sender: String,
    pub from_name: String,
    pub receiver_dev: String,
    pub subject_test: String,
    pub receiver_staging: Option<String>,
    pub receiver_prod: Option<String>,
    pub subject_prod: Option<String>,
}

impl SesConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            sender: required_env("email_sender")?,
            from_name: required_env("email_from_name")?,
            receiver_dev: required_env("email_receiver_dev")?,
            subject_test: required_env("email_subject_test")?,
            receiver_staging: std::env::var("email_receiver_staging").ok(),
            receiver_prod: std::env::var("email_receiver_prod").ok(),
            subject_prod: std::env::var("email_subject_prod").ok(),
        })
    }
}

impl Validate for SesConfig {
    fn validate(&self) -> Result<()> {
        validate_email("email_sender", &self.sender)?;
        validate_non_empty_string("email_from_name", &self.from_name)?;
        validate_email("email_receiver_dev", &self.receiver_dev)?;
        validate_non_empty_string("email_subject_test", &self.subject_test)
    }
}

fn stage_value(value: &Option<String>, name: &str) -> Result<String> {
    value.clone().ok_or_else(|| ConnectorError::MissingEnvError {
        name: name.to_string(),
    })
}

pub struct SimpleEmailService {
    client: Client,
    config: SesConfig,
    charset: String,
    receiver: String,
    email_subject: String,
}

impl SimpleEmailService {
    pub fn new(client: Client, config: SesConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            client,
            charset: DEFAULT_CHARSET.to_string(),
            receiver: config.receiver_dev.clone(),
            email_subject: config.subject_test.clone(),
            config,
        })
    }

    pub async fn from_env() -> Result<Self> {
        let config = SesConfig::from_env()?;
        let sdk_config = load_aws_config().await;
        let ses_config = aws_sdk_sesv2::config::Builder::from(&sdk_config)
            .region(Region::new(DEFAULT_REGION))
            .build();
        Self::new(Client::from_conf(ses_config), config)
    }

    pub fn receiver(&self) -> &str {
        &self.receiver
    }

    pub fn email_subject(&self) -> &str {
        &self.email_subject
    }

    pub fn charset(&self) -> &str {
        &self.charset
    }

    pub fn set_region(&mut self, region_name: &str) -> Result<()> {
        validate_aws_region("region_name", region_name)?;
        let config = self
            .client
            .config()
            .to_builder()
            .region(Region::new(region_name.to_string()))
            .build();
        self.client = Client::from_conf(config);
        tracing::info!("SES using region {}", region_name);
        Ok(())
    }

    pub fn set_charset(&mut self, charset: &str) -> Result<()> {
        validate_non_empty_string("charset", charset)?;
        self.charset = charset.to_string();
        tracing::info!("SES using charset {}", self.charset);
        Ok(())
    }

    /// Picks receiver and subject for `stage`. Dev keeps the defaults;
    /// staging keeps the test subject.
    pub fn set_email_meta(&mut self, stage: Stage) -> Result<()> {
        match stage {
            Stage::Prod => {
                self.receiver = stage_value(&self.config.receiver_prod, "email_receiver_prod")?;
                self.email_subject = stage_value(&self.config.subject_prod, "email_subject_prod")?;
            }
            Stage::Staging => {
                self.receiver =
                    stage_value(&self.config.receiver_staging, "email_receiver_staging")?;
                self.email_subject = self.config.subject_test.clone();
            }
            Stage::Dev => {
                self.receiver = self.config.receiver_dev.clone();
                self.email_subject = self.config.subject_test.clone();
            }
        }

        tracing::info!(
            "SES meta for {}: receiver {}, subject {}",
            stage,
            self.receiver,
            self.email_subject
        );
        Ok(())
    }

    fn content(&self, data: &str) -> Result<Content> {
        Content::builder()
            .data(data)
            .charset(&self.charset)
            .build()
            .map_err(|e| ConnectorError::service(SERVICE, e.to_string()))
    }

    /// Sends `message_body` as HTML and returns the SES message id.
    pub async fn send_email(&self, message_body: &str) -> Result<String> {
        tracing::info!("SES send_email: start");

        let message = Message::builder()
            .subject(self.content(&self.email_subject)?)
            .body(Body::builder().html(self.content(message_body)?).build())
            .build();

        let output = self
            .client
            .send_email()
            .from_email_address(format!("{} <{}>", self.config.from_name, self.config.sender))
            .destination(Destination::builder().to_addresses(&self.receiver).build())
            .content(EmailContent::builder().simple(message).build())
            .send()
            .await
            .map_err(|e| {
                let err = ConnectorError::aws(SERVICE, "unable to send email", e);
                tracing::error!("{}", err);
                err
            })?;

        let message_id = output.message_id().unwrap_or_default().to_string();
        tracing::info!("SES send_email: success ({})", message_id);
        Ok(message_id)
    }
}
