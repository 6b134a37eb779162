//! Upload local files to S3 with per-bucket static credentials.

use crate::utils::error::{ConnectorError, Result};
use crate::utils::validation::{
    validate_aws_region, validate_non_empty_string, validate_s3_bucket_name,
};
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use std::path::Path;

const SERVICE: &str = "S3";
pub const DEFAULT_REGION: &str = "us-east-1";

pub struct S3 {
    region: String,
    client: Option<Client>,
}

impl Default for S3 {
    fn default() -> Self {
        Self::new()
    }
}

impl S3 {
    pub fn new() -> Self {
        Self {
            region: DEFAULT_REGION.to_string(),
            client: None,
        }
    }

    /// Uses a pre-built client, e.g. one pointed at a custom endpoint.
    pub fn with_client(client: Client) -> Self {
        let region = client
            .config()
            .region()
            .map(|r| r.to_string())
            .unwrap_or_else(|| DEFAULT_REGION.to_string());
        Self {
            region,
            client: Some(client),
        }
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    /// Switches region; an existing client is rebuilt for the new region.
    pub fn set_region(&mut self, region_name: &str) -> Result<()> {
        validate_aws_region("region_name", region_name)?;
        self.region = region_name.to_string();

        if let Some(client) = self.client.take() {
            let config = client
                .config()
                .to_builder()
                .region(Region::new(self.region.clone()))
                .build();
            self.client = Some(Client::from_conf(config));
        }

        tracing::info!("S3 using region {}", self.region);
        Ok(())
    }

    pub fn set_s3_client(&mut self, access_key: &str, secret: &str) -> Result<()> {
        validate_non_empty_string("access_key", access_key)?;
        validate_non_empty_string("secret", secret)?;

        let config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(self.region.clone()))
            .credentials_provider(Credentials::new(access_key, secret, None, None, "static"))
            .build();
        self.client = Some(Client::from_conf(config));

        tracing::info!("S3 client ready");
        Ok(())
    }

    /// Streams `file_name` from disk into `bucket/object_name`.
    pub async fn upload_to_bucket(&self, file_name: &Path, bucket: &str, object_name: &str) -> Result<()> {
        tracing::info!("S3 upload of {} to {}/{}", file_name.display(), bucket, object_name);

        let client = self
            .client
            .as_ref()
            .ok_or_else(|| ConnectorError::config("S3 client not set; call set_s3_client first"))?;
        validate_s3_bucket_name("bucket", bucket)?;
        validate_non_empty_string("object_name", object_name)?;

        let body = ByteStream::from_path(file_name).await.map_err(|e| {
            tracing::error!("S3 upload failed reading {}: {}", file_name.display(), e);
            ConnectorError::service(SERVICE, format!("Unable to read {}: {}", file_name.display(), e))
        })?;

        client
            .put_object()
            .bucket(bucket)
            .key(object_name)
            .body(body)
            .send()
            .await
            .map_err(|e| {
                let err = ConnectorError::aws(SERVICE, "S3 upload failed", e);
                tracing::error!("{}", err);
                err
            })?;

        tracing::info!("S3 upload succeeded");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_upload_requires_client() {
        let s3 = S3::new();
        let err = s3
            .upload_to_bucket(Path::new("missing.pdf"), "bucket", "missing.pdf")
            .await
            .unwrap_err();
        assert!(matches!(err, ConnectorError::ConfigError { .. }));
    }

    #[test]
    fn test_set_region_rebuilds_client() {
        let mut s3 = S3::new();
        s3.set_s3_client("AKIDEXAMPLE", "secret").unwrap();
        s3.set_region("eu-west-1").unwrap();

        assert_eq!(s3.region(), "eu-west-1");
        let client = s3.client.as_ref().unwrap();
        assert_eq!(
            client.config().region().map(|r| r.to_string()).as_deref(),
            Some("eu-west-1")
        );
        assert!(s3.set_region("EU WEST").is_err());
    }
}
