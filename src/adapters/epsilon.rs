//! Epsilon (Gigya accounts API) HCP registration.
//!
//! Registration is two calls: `accounts.initRegistration` hands out a
//! registration token, then `accounts.setAccountInfo` stores the profile and
//! consent data against it.

use crate::adapters::http::{ensure_success, transport_failure};
use crate::config::required_env;
use crate::utils::error::{ConnectorError, Result};
use crate::utils::validation::{validate_non_empty_string, validate_url, Validate};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

const SERVICE: &str = "Epsilon";

#[derive(Debug, Clone)]
pub struct EpsilonConfig {
    /// Data-center base URL, e.g. `https://accounts.us1.gigya.com`.
    pub api_region: String,
    pub api_key: String,
}

impl EpsilonConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            api_region: required_env("epsilon_api_region")?,
            api_key: required_env("epsilon_api_key")?,
        })
    }
}

impl Validate for EpsilonConfig {
    fn validate(&self) -> Result<()> {
        validate_url("api_region", &self.api_region)?;
        validate_non_empty_string("api_key", &self.api_key)
    }
}

/// Registration form data received by the handler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Registration {
    pub firstname: String,
    pub lastname: String,
    pub email: String,
    pub zip: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub title: String,
    pub credential_type: String,
    pub specialty: String,
    /// Consent date, applied to every dated consent field.
    pub date: String,
    pub rep_request: bool,
    #[serde(alias = "liason_request")]
    pub liaison_request: bool,
    pub request_sample: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Profile<'a> {
    first_name: &'a str,
    last_name: &'a str,
    email: &'a str,
    zip: &'a str,
    address: &'a str,
    city: &'a str,
    state: &'a str,
}

/// The `profile` parameter, as a JSON string.
pub fn build_profile_param(registration: &Registration) -> Result<String> {
    let profile = Profile {
        first_name: &registration.firstname,
        last_name: &registration.lastname,
        email: &registration.email,
        zip: &registration.zip,
        address: &registration.address,
        city: &registration.city,
        state: &registration.state,
    };
    Ok(serde_json::to_string(&profile)?)
}

/// The `data` parameter, as a JSON string.
pub fn build_data_param(registration: &Registration) -> Result<String> {
    let date = registration.date.as_str();
    let data = json!({
        "profile_registration_source": "Intouch",
        "profile_identity_type_hcp_hco": "Y",
        "profile_title": registration.title,
        "profile_hcp_hco_credential_type": registration.credential_type,
        "brand_adlarity_hcp_hco_enrollment_channel": "WEB",
        "brand_adlarity_hcp_hco_channel_pref_email": true,
        "brand_adlarity_hcp_hco_channel_pref_email_date": date,
        "global_opt_out_all_marketing_comms": false,
        "global_opt_out_all_marketing_comms_date": date,
        "profile_specialty": registration.specialty,
        "terms": true,
        "brand_adlarity_hcp_hco_channel_pref_rep_email": registration.email,
        "brand_adlarity_hcp_hco_channel_pref_rep_email_date": date,
        "brand_adlarity_hcp_hco_rep_request": registration.rep_request,
        "brand_adlarity_hcp_hco_rep_request_date": date,
        "brand_adlarity_hcp_hco_med_liaison_request": registration.liaison_request,
        "brand_adlarity_hcp_hco_med_liaison_request_date": date,
        "brand_adlarity_hcp_hco_rep_request_sample": registration.request_sample,
    });
    Ok(serde_json::to_string(&data)?)
}

/// Gigya answers HTTP 200 even for rejected calls; the verdict is `errorCode`.
fn check_error_code(endpoint: &str, body: &Value) -> Result<()> {
    match body.get("errorCode").and_then(Value::as_i64) {
        None | Some(0) => Ok(()),
        Some(code) => {
            let message = body
                .get("errorMessage")
                .and_then(Value::as_str)
                .unwrap_or("unknown error");
            tracing::error!("{} failed with errorCode {}: {}", endpoint, code, message);
            Err(ConnectorError::service(
                SERVICE,
                format!("{} failed with errorCode {}: {}", endpoint, code, message),
            ))
        }
    }
}

pub struct Epsilon {
    client: Client,
    config: EpsilonConfig,
    registration_token: Option<String>,
}

impl Epsilon {
    pub fn new(config: EpsilonConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            client: Client::new(),
            config,
            registration_token: None,
        })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(EpsilonConfig::from_env()?)
    }

    pub fn registration_token(&self) -> Option<&str> {
        self.registration_token.as_deref()
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/{}", self.config.api_region.trim_end_matches('/'), method)
    }

    async fn post_form(&self, endpoint: &str, params: &[(&str, &str)]) -> Result<Value> {
        let response = self
            .client
            .post(endpoint)
            .form(params)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Epsilon endpoint: {}", endpoint);
                transport_failure(SERVICE, e)
            })?;

        let body: Value = ensure_success(SERVICE, response).await?.json().await?;
        tracing::debug!("Epsilon response: {}", body);
        check_error_code(endpoint, &body)?;
        Ok(body)
    }

    /// Starts a registration by requesting a `regToken` from
    /// `accounts.initRegistration`.
    pub async fn set_registration_token(&mut self) -> Result<()> {
        tracing::info!("Requesting Epsilon registration token");

        let endpoint = self.endpoint("accounts.initRegistration");
        let body = self
            .post_form(
                &endpoint,
                &[("isLite", "true"), ("apiKey", self.config.api_key.as_str())],
            )
            .await?;

        let token = body
            .get("regToken")
            .and_then(Value::as_str)
            .ok_or_else(|| ConnectorError::service(SERVICE, "response has no regToken"))?;

        self.registration_token = Some(token.to_string());
        tracing::info!("Epsilon registration token set");
        Ok(())
    }

    pub async fn post_registration(&self, registration: &Registration) -> Result<()> {
        tracing::info!("Posting Epsilon registration");

        let token = self.registration_token.as_deref().ok_or_else(|| {
            ConnectorError::config("registration token not set; call set_registration_token first")
        })?;

        let profile = build_profile_param(registration)?;
        let data = build_data_param(registration)?;
        tracing::debug!("Epsilon profile: {}", profile);
        tracing::debug!("Epsilon data: {}", data);

        let endpoint = self.endpoint("accounts.setAccountInfo");
        self.post_form(
            &endpoint,
            &[
                ("regToken", token),
                ("profile", profile.as_str()),
                ("data", data.as_str()),
            ],
        )
        .await?;

        tracing::info!("Epsilon registration stored");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registration() -> Registration {
        Registration {
            firstname: "Jane".to_string(),
            lastname: "Doe".to_string(),
            email: "jane@clinic.com".to_string(),
            zip: "10001".to_string(),
            address: "1 Main St".to_string(),
            city: "New York".to_string(),
            state: "NY".to_string(),
            title: "Dr".to_string(),
            credential_type: "MD".to_string(),
            specialty: "Dermatology".to_string(),
            date: "2024-03-01".to_string(),
            rep_request: true,
            liaison_request: false,
            request_sample: true,
        }
    }

    #[test]
    fn test_build_profile_param() {
        let profile: Value =
            serde_json::from_str(&build_profile_param(&registration()).unwrap()).unwrap();
        assert_eq!(profile["firstName"], "Jane");
        assert_eq!(profile["lastName"], "Doe");
        assert_eq!(profile["zip"], "10001");
        assert_eq!(profile.as_object().unwrap().len(), 7);
    }

    #[test]
    fn test_build_data_param() {
        let data: Value =
            serde_json::from_str(&build_data_param(&registration()).unwrap()).unwrap();
        assert_eq!(data["profile_registration_source"], "Intouch");
        assert_eq!(data["profile_title"], "Dr");
        assert_eq!(data["global_opt_out_all_marketing_comms"], false);
        assert_eq!(data["brand_adlarity_hcp_hco_rep_request"], true);
        assert_eq!(data["brand_adlarity_hcp_hco_med_liaison_request"], false);
        assert_eq!(data["brand_adlarity_hcp_hco_rep_request_date"], "2024-03-01");
        assert_eq!(
            data["brand_adlarity_hcp_hco_channel_pref_rep_email"],
            "jane@clinic.com"
        );
    }

    #[test]
    fn test_registration_accepts_legacy_liaison_key() {
        let mut value = serde_json::to_value(registration()).unwrap();
        let object = value.as_object_mut().unwrap();
        object.remove("liaison_request");
        object.insert("liason_request".to_string(), Value::Bool(true));

        let parsed: Registration = serde_json::from_value(value).unwrap();
        assert!(parsed.liaison_request);
    }

    #[test]
    fn test_check_error_code() {
        assert!(check_error_code("x", &json!({"errorCode": 0})).is_ok());
        assert!(check_error_code("x", &json!({"regToken": "t"})).is_ok());
        assert!(check_error_code("x", &json!({"errorCode": 400006, "errorMessage": "Invalid parameter value"})).is_err());
    }
}
