use crate::utils::error::ConnectorError;
use serde::{Deserialize, Serialize};

/// The `{"statusCode": ..., "body": ...}` shape handlers hand back to API
/// Gateway. `body` is itself a JSON string holding `{"message": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandlerResponse {
    pub status_code: u16,
    pub body: String,
}

impl HandlerResponse {
    pub fn new(status_code: u16, message: &str) -> Self {
        Self {
            status_code,
            body: serde_json::json!({ "message": message }).to_string(),
        }
    }

    pub fn success(message: &str) -> Self {
        Self::new(200, message)
    }

    pub fn failure(message: &str) -> Self {
        Self::new(500, message)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }

    /// The `message` inside `body`, if the body has one.
    pub fn message(&self) -> Option<String> {
        serde_json::from_str::<serde_json::Value>(&self.body)
            .ok()?
            .get("message")?
            .as_str()
            .map(str::to_string)
    }
}

impl From<&ConnectorError> for HandlerResponse {
    fn from(err: &ConnectorError) -> Self {
        HandlerResponse::failure(&err.to_string())
    }
}

impl From<ConnectorError> for HandlerResponse {
    fn from(err: ConnectorError) -> Self {
        HandlerResponse::from(&err)
    }
}

/// A failed serverless function, as reported to an alerting channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureAlert {
    pub lambda_name: String,
    pub function_name: String,
    pub location: String,
    pub status: String,
    pub description: String,
    pub logs_link: String,
}
