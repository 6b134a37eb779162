//! Marketo REST: lead creation and static list membership.
//!
//! Docs: <https://developers.marketo.com/rest-api/>

use crate::adapters::http::{ensure_success, transport_failure};
use crate::config::required_env;
use crate::utils::error::{ConnectorError, Result};
use crate::utils::validation::{validate_email, validate_non_empty_string, validate_url, Validate};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;

const SERVICE: &str = "Marketo";

#[derive(Debug, Clone)]
pub struct MarketoConfig {
    /// Typical format `000-AAA-000`.
    pub munchkin_id: String,
    pub client_id: String,
    pub client_secret: String,
    pub list_id: String,
    pub api_base: String,
}

impl MarketoConfig {
    pub fn from_env() -> Result<Self> {
        let munchkin_id = required_env("munchkin_id")?;
        let api_base = std::env::var("marketo_api_base")
            .unwrap_or_else(|_| format!("https://{}.mktorest.com", munchkin_id));

        Ok(Self {
            munchkin_id,
            client_id: required_env("client_id")?,
            client_secret: required_env("client_secret")?,
            list_id: required_env("list_id")?,
            api_base,
        })
    }
}

impl Validate for MarketoConfig {
    fn validate(&self) -> Result<()> {
        validate_non_empty_string("munchkin_id", &self.munchkin_id)?;
        validate_non_empty_string("client_id", &self.client_id)?;
        validate_non_empty_string("client_secret", &self.client_secret)?;
        validate_non_empty_string("list_id", &self.list_id)?;
        validate_url("api_base", &self.api_base)
    }
}

/// Lead fields as they arrive from the handler's event body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LeadInput<'a> {
    email: &'a str,
    first_name: &'a str,
    last_name: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateLeadsRequest<'a> {
    action: &'static str,
    lookup_field: &'static str,
    async_processing: bool,
    partition_name: &'static str,
    input: Vec<LeadInput<'a>>,
}

#[derive(Debug, Serialize)]
struct LeadId {
    id: i64,
}

#[derive(Debug, Serialize)]
struct ListMembershipRequest {
    input: Vec<LeadId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketoError {
    pub code: String,
    pub message: String,
}

/// One entry of a Marketo `result` array, e.g. `{"id": 43471, "status": "created"}`
/// or `{"status": "skipped", "reasons": [...]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeadResult {
    #[serde(default)]
    pub id: Option<i64>,
    pub status: String,
    #[serde(default)]
    pub reasons: Vec<MarketoError>,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    success: bool,
    #[serde(default)]
    result: Vec<LeadResult>,
    #[serde(default)]
    errors: Vec<MarketoError>,
}

impl Envelope {
    fn into_result(self, context: &str) -> Result<Vec<LeadResult>> {
        if self.success {
            return Ok(self.result);
        }

        let message = match self.errors.first() {
            Some(e) => format!("{}: {} (code {})", context, e.message, e.code),
            None => format!("{}: request was not successful", context),
        };
        tracing::error!("{}", message);
        Err(ConnectorError::service(SERVICE, message))
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

pub struct Marketo {
    client: Client,
    config: MarketoConfig,
    access_token: OnceCell<String>,
}

impl Marketo {
    pub fn new(config: MarketoConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            client: Client::new(),
            config,
            access_token: OnceCell::new(),
        })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(MarketoConfig::from_env()?)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_base.trim_end_matches('/'), path)
    }

    async fn token(&self) -> Result<&str> {
        let token = self
            .access_token
            .get_or_try_init(|| async {
                tracing::debug!("Requesting Marketo access token");
                let response = self
                    .client
                    .get(self.url("/identity/oauth/token"))
                    .query(&[
                        ("grant_type", "client_credentials"),
                        ("client_id", self.config.client_id.as_str()),
                        ("client_secret", self.config.client_secret.as_str()),
                    ])
                    .send()
                    .await
                    .map_err(|e| transport_failure(SERVICE, e))?;

                let token: TokenResponse = ensure_success(SERVICE, response).await?.json().await?;
                Ok::<_, ConnectorError>(token.access_token)
            })
            .await?;

        Ok(token.as_str())
    }

    /// Creates `lead` only if no lead with the same e-mail exists.
    pub async fn create_lead(&self, lead: &Lead) -> Result<Vec<LeadResult>> {
        tracing::info!("Creating Marketo lead");
        validate_email("email", &lead.email)?;

        let request = CreateLeadsRequest {
            action: "createOnly",
            lookup_field: "email",
            async_processing: false,
            partition_name: "Default",
            input: vec![LeadInput {
                email: &lead.email,
                first_name: &lead.first_name,
                last_name: &lead.last_name,
            }],
        };

        let token = self.token().await?;
        let response = self
            .client
            .post(self.url("/rest/v1/leads.json"))
            .bearer_auth(token)
            .json(&request)
            .send()
            .await
            .map_err(|e| transport_failure(SERVICE, e))?;

        let envelope: Envelope = ensure_success(SERVICE, response).await?.json().await?;
        let result = envelope.into_result("create_lead")?;

        tracing::info!("Marketo create_lead: {:?}", result);
        Ok(result)
    }

    pub async fn add_to_list(&self, lead_id: i64) -> Result<Vec<LeadResult>> {
        tracing::info!("Adding Marketo lead {} to list {}", lead_id, self.config.list_id);

        let token = self.token().await?;
        let response = self
            .client
            .post(self.url(&format!("/rest/v1/lists/{}/leads.json", self.config.list_id)))
            .bearer_auth(token)
            .json(&ListMembershipRequest {
                input: vec![LeadId { id: lead_id }],
            })
            .send()
            .await
            .map_err(|e| transport_failure(SERVICE, e))?;

        let envelope: Envelope = ensure_success(SERVICE, response).await?.json().await?;
        let result = envelope.into_result("add_to_list")?;

        tracing::info!("Marketo add_to_list: {:?}", result);
        Ok(result)
    }
}
