use aws_smithy_types::error::display::DisplayErrorContext;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConnectorError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("XML error: {0}")]
    XmlError(#[from] quick_xml::Error),

    #[error("SFTP error: {0}")]
    SftpError(#[from] ssh2::Error),

    #[error("Background task failed: {0}")]
    TaskError(#[from] tokio::task::JoinError),

    #[error("Missing environment variable: {name}")]
    MissingEnvError { name: String },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid value for {field}: '{value}' ({reason})")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("{service} request failed: {message}")]
    ServiceError {
        service: &'static str,
        message: String,
    },

    #[error("{service} returned HTTP {status}: {body}")]
    UnexpectedStatusError {
        service: &'static str,
        status: u16,
        body: String,
    },
}

impl ConnectorError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    pub fn service(service: &'static str, message: impl Into<String>) -> Self {
        Self::ServiceError {
            service,
            message: message.into(),
        }
    }

    /// Wraps an AWS SDK error, keeping the full source chain in the message.
    pub fn aws<E>(service: &'static str, context: &str, err: E) -> Self
    where
        E: std::error::Error + 'static,
    {
        Self::ServiceError {
            service,
            message: format!(
                "{}: {}",
                context,
                DisplayErrorContext(&err)
            ),
        }
    }
}

pub type Result<T> = std::result::Result<T, ConnectorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = ConnectorError::MissingEnvError {
            name: "ftp_host".to_string(),
        };
        assert_eq!(err.to_string(), "Missing environment variable: ftp_host");

        let err = ConnectorError::UnexpectedStatusError {
            service: "Campaign Monitor",
            status: 400,
            body: "bad request".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Campaign Monitor returned HTTP 400: bad request"
        );

        let err = ConnectorError::service("DynamoDB", "Unable to PUT item.");
        assert_eq!(err.to_string(), "DynamoDB request failed: Unable to PUT item.");
    }

    #[test]
    fn test_aws_error_keeps_source_chain() {
        let source = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "connection refused");
        let err = ConnectorError::aws("SES", "unable to send email", source);

        assert!(matches!(err, ConnectorError::ServiceError { service: "SES", .. }));
        let message = err.to_string();
        assert!(message.starts_with("SES request failed: unable to send email: "));
        assert!(message.contains("connection refused"));
    }
}
