//! Failure notifications posted to the RevHealth API, which relays them to
//! Microsoft Teams.

use crate::adapters::http::{ensure_success, transport_failure};
use crate::config::required_env;
use crate::domain::model::FailureAlert;
use crate::domain::ports::FailureNotifier;
use crate::utils::error::Result;
use crate::utils::validation::validate_url;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const SERVICE: &str = "RevHealth";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpContext {
    pub path: String,
    pub method: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestContext {
    pub domain_name: String,
    pub http: HttpContext,
}

/// The parts of an API Gateway HTTP API (payload v2) event we report on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiGatewayEvent {
    pub request_context: RequestContext,
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

/// Identity of the running function, from the Lambda runtime environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LambdaIdentity {
    pub function_name: String,
    pub log_stream: String,
}

impl LambdaIdentity {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            function_name: required_env("AWS_LAMBDA_FUNCTION_NAME")?,
            log_stream: required_env("AWS_LAMBDA_LOG_STREAM_NAME")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub lambda_name: String,
    pub function_name: String,
    pub description: String,
    pub api_domain_name: String,
    pub api_path: String,
    pub api_method: String,
    pub status: String,
    pub log_stream: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
}

pub struct RevHealthNotifications {
    client: Client,
    endpoint: String,
    event: ApiGatewayEvent,
    identity: LambdaIdentity,
}

impl RevHealthNotifications {
    pub fn new(endpoint: &str, event: ApiGatewayEvent, identity: LambdaIdentity) -> Result<Self> {
        validate_url("endpoint", endpoint)?;
        Ok(Self {
            client: Client::new(),
            endpoint: endpoint.to_string(),
            event,
            identity,
        })
    }

    pub fn from_env(endpoint: &str, event: ApiGatewayEvent) -> Result<Self> {
        Self::new(endpoint, event, LambdaIdentity::from_env()?)
    }

    /// Builds the notification body. Requests made from Postman are tagged
    /// as such; an explicit `origin` header wins over that tag.
    pub fn set_payload(&self, failed_function_name: &str, description: &str) -> NotificationPayload {
        let headers = &self.event.headers;
        let mut origin = None;
        if headers.contains_key("postman-token") {
            origin = Some("postman".to_string());
        }
        if let Some(value) = headers.get("origin") {
            origin = Some(value.clone());
        }

        NotificationPayload {
            lambda_name: self.identity.function_name.clone(),
            function_name: failed_function_name.to_string(),
            description: description.to_string(),
            api_domain_name: self.event.request_context.domain_name.clone(),
            api_path: self.event.request_context.http.path.clone(),
            api_method: self.event.request_context.http.method.clone(),
            status: "failed".to_string(),
            log_stream: self.identity.log_stream.clone(),
            origin,
        }
    }

    pub async fn send_notification(&self, failed_function_name: &str, description: &str) -> Result<()> {
        tracing::info!("Sending RevHealth notification for {}", failed_function_name);

        let payload = self.set_payload(failed_function_name, description);
        let response = self
            .client
            .post(&self.endpoint)
            .json(&payload)
            .send()
            .await
            .map_err(|e| transport_failure(SERVICE, e))?;

        ensure_success(SERVICE, response).await?;
        tracing::info!("RevHealth notification sent");
        Ok(())
    }
}

#[async_trait]
impl FailureNotifier for RevHealthNotifications {
    async fn notify(&self, alert: &FailureAlert) -> Result<()> {
        self.send_notification(&alert.function_name, &alert.description)
            .await
    }
}
