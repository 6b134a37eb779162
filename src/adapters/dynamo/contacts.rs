//! Contact-form submissions, keyed by e-mail, kept in a production and a
//! staging table.

use super::attributes::{to_document, Document};
use super::SERVICE;
use crate::config::{load_aws_config, required_env};
use crate::utils::error::{ConnectorError, Result};
use crate::utils::validation::{validate_email, validate_non_empty_string, Validate};
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client;
use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";
const UPDATE_EXPRESSION: &str = "SET #contact_name = :n, phone = :p, message = :m, edit_date = :d";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactSubmission {
    pub name: String,
    pub phone: String,
    pub email: String,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct ContactTables {
    pub production: String,
    pub staging: String,
}

impl ContactTables {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            production: required_env("dynamodb_table")?,
            staging: required_env("dynamodb_table_staging")?,
        })
    }
}

impl Validate for ContactTables {
    fn validate(&self) -> Result<()> {
        validate_non_empty_string("dynamodb_table", &self.production)?;
        validate_non_empty_string("dynamodb_table_staging", &self.staging)
    }
}

fn timestamp(at: &NaiveDateTime) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

fn s(value: &str) -> AttributeValue {
    AttributeValue::S(value.to_string())
}

pub struct ContactStore {
    client: Client,
    tables: ContactTables,
}

impl ContactStore {
    pub fn new(client: Client, tables: ContactTables) -> Result<Self> {
        tables.validate()?;
        Ok(Self { client, tables })
    }

    pub async fn from_env() -> Result<Self> {
        let tables = ContactTables::from_env()?;
        Self::new(Client::new(&load_aws_config().await), tables)
    }

    pub fn active_table(&self, use_production: bool) -> &str {
        if use_production {
            &self.tables.production
        } else {
            &self.tables.staging
        }
    }

    /// Looks a contact up by e-mail. Lookup failures are errors; a missing
    /// contact is `Ok(None)`.
    pub async fn get(&self, email: &str, use_production: bool) -> Result<Option<Document>> {
        tracing::info!("Checking if the contact exists");

        let output = self
            .client
            .get_item()
            .table_name(self.active_table(use_production))
            .key("email", s(email))
            .send()
            .await
            .map_err(|e| {
                let err = ConnectorError::aws(SERVICE, "Unable to get contact", e);
                tracing::error!("{}", err);
                err
            })?;

        Ok(output.item().map(to_document))
    }

    /// Stores a new submission under a fresh UUID and returns that id.
    pub async fn put(&self, submission: &ContactSubmission, use_production: bool) -> Result<String> {
        self.put_at(submission, use_production, Local::now().naive_local())
            .await
    }

    async fn put_at(
        &self,
        submission: &ContactSubmission,
        use_production: bool,
        created_at: NaiveDateTime,
    ) -> Result<String> {
        validate_email("email", &submission.email)?;
        tracing::info!("Uploading contact submission to DynamoDB");

        let id = uuid::Uuid::new_v4().to_string();
        self.client
            .put_item()
            .table_name(self.active_table(use_production))
            .item("id", s(&id))
            .item("name", s(&submission.name))
            .item("phone", s(&submission.phone))
            .item("email", s(&submission.email))
            .item("message", s(&submission.message))
            .item("create_date", s(&timestamp(&created_at)))
            .item("edit_date", AttributeValue::Null(true))
            .send()
            .await
            .map_err(|e| {
                let err = ConnectorError::aws(SERVICE, "Unable to PUT item.", e);
                tracing::error!("{}", err);
                err
            })?;

        tracing::info!("Contact submission stored as {}", id);
        Ok(id)
    }

    /// Overwrites the contact's details and stamps `edit_date`. `email` is
    /// the table key and cannot be SET, so it only selects the item.
    pub async fn update(&self, submission: &ContactSubmission, use_production: bool) -> Result<()> {
        tracing::info!("Updating contact submission");
        let edited_at = timestamp(&Local::now().naive_local());

        self.client
            .update_item()
            .table_name(self.active_table(use_production))
            .key("email", s(&submission.email))
            .update_expression(UPDATE_EXPRESSION)
            // `name` is a DynamoDB reserved word
            .expression_attribute_names("#contact_name", "name")
            .expression_attribute_values(":n", s(&submission.name))
            .expression_attribute_values(":p", s(&submission.phone))
            .expression_attribute_values(":m", s(&submission.message))
            .expression_attribute_values(":d", s(&edited_at))
            .send()
            .await
            .map_err(|e| {
                let err = ConnectorError::aws(SERVICE, "Unable to update item.", e);
                tracing::error!("{}", err);
                err
            })?;

        tracing::info!("Contact submission updated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_timestamp_format() {
        let at = NaiveDate::from_ymd_opt(2023, 2, 7)
            .unwrap()
            .and_hms_micro_opt(13, 29, 14, 42)
            .unwrap();
        assert_eq!(timestamp(&at), "2023-02-07 13:29:14.000042");
    }

    #[test]
    fn test_update_leaves_key_attribute_alone() {
        assert!(!UPDATE_EXPRESSION.contains("email"));
        assert!(UPDATE_EXPRESSION.contains("#contact_name = :n"));
    }

    #[test]
    fn test_tables_validate() {
        let tables = ContactTables {
            production: "contacts".to_string(),
            staging: "".to_string(),
        };
        assert!(tables.validate().is_err());
    }
}
