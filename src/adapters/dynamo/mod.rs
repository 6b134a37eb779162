//! DynamoDB table access for handlers.
//!
//! Items cross this boundary as JSON [`Document`]s; [`attributes`] converts
//! them to and from DynamoDB attribute values.

pub mod attributes;
pub mod contacts;

pub use attributes::{Document, Item};

use crate::config::load_aws_config;
use crate::utils::error::{ConnectorError, Result};
use attributes::{to_attribute, to_document, to_item};
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client;
use serde_json::Value;
use std::collections::HashMap;

const SERVICE: &str = "DynamoDB";

/// A scan `FilterExpression` with its placeholder maps. Attribute names are
/// always aliased so reserved words such as `status` or `name` work.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanFilter {
    pub expression: String,
    pub names: HashMap<String, String>,
    pub values: HashMap<String, AttributeValue>,
}

impl ScanFilter {
    fn new(expression: &str, attribute: &str, value: AttributeValue) -> Self {
        Self {
            expression: expression.to_string(),
            names: HashMap::from([("#attr".to_string(), attribute.to_string())]),
            values: HashMap::from([(":value".to_string(), value)]),
        }
    }

    pub fn equals(attribute: &str, value: impl Into<Value>) -> Self {
        Self::new("#attr = :value", attribute, to_attribute(&value.into()))
    }

    pub fn not_equals(attribute: &str, value: impl Into<Value>) -> Self {
        Self::new("#attr <> :value", attribute, to_attribute(&value.into()))
    }

    pub fn begins_with(attribute: &str, prefix: &str) -> Self {
        Self::new(
            "begins_with(#attr, :value)",
            attribute,
            AttributeValue::S(prefix.to_string()),
        )
    }
}

/// One page of a [`Dynamo::search`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SearchPage {
    pub items: Vec<Document>,
    pub count: i32,
    /// Pass back as `start_key` to continue; `None` once the scan is done.
    pub last_evaluated_key: Option<Document>,
}

pub struct Dynamo {
    client: Client,
    table: Option<String>,
}

impl Dynamo {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            table: None,
        }
    }

    pub async fn from_env() -> Self {
        Self::new(Client::new(&load_aws_config().await))
    }

    pub fn set_table(&mut self, table_name: &str) {
        tracing::debug!("Using DynamoDB table {}", table_name);
        self.table = Some(table_name.to_string());
    }

    pub fn with_table(mut self, table_name: &str) -> Self {
        self.set_table(table_name);
        self
    }

    fn table(&self) -> Result<&str> {
        self.table
            .as_deref()
            .ok_or_else(|| ConnectorError::config("DynamoDB table not set; call set_table first"))
    }

    fn failure<E>(context: &str, err: E) -> ConnectorError
    where
        E: std::error::Error + 'static,
    {
        let err = ConnectorError::aws(SERVICE, context, err);
        tracing::error!("{}", err);
        err
    }

    /// Scans the whole table, following `LastEvaluatedKey` to the end.
    async fn scan_all(&self, filter: Option<ScanFilter>, failure: &str) -> Result<Vec<Document>> {
        let table = self.table()?;
        let (expression, names, values) = match filter {
            Some(f) => (Some(f.expression), Some(f.names), Some(f.values)),
            None => (None, None, None),
        };

        let mut documents = Vec::new();
        let mut start_key: Option<Item> = None;
        loop {
            let output = self
                .client
                .scan()
                .table_name(table)
                .set_filter_expression(expression.clone())
                .set_expression_attribute_names(names.clone())
                .set_expression_attribute_values(values.clone())
                .set_exclusive_start_key(start_key.take())
                .send()
                .await
                .map_err(|e| Self::failure(failure, e))?;

            documents.extend(output.items().iter().map(to_document));

            match output.last_evaluated_key() {
                Some(key) if !key.is_empty() => start_key = Some(key.clone()),
                _ => break,
            }
        }

        Ok(documents)
    }

    pub async fn get_all(&self) -> Result<Vec<Document>> {
        tracing::info!("DynamoDB get_all: start");
        let items = self.scan_all(None, "Unable to get items").await?;
        tracing::info!("DynamoDB get_all: {} items", items.len());
        Ok(items)
    }

    pub async fn filter_by_status(&self, status: &str) -> Result<Vec<Document>> {
        tracing::info!("DynamoDB filter_by_status: status {}", status);
        self.scan_all(
            Some(ScanFilter::equals("status", status)),
            "Unable to get approved items",
        )
        .await
    }

    pub async fn filter_exclude_status(&self, status: &str) -> Result<Vec<Document>> {
        tracing::info!("DynamoDB filter_exclude_status: status {}", status);
        self.scan_all(
            Some(ScanFilter::not_equals("status", status)),
            "Unable to get active items",
        )
        .await
    }

    pub async fn get_item(&self, key_name: &str, key_value: impl Into<Value>) -> Result<Option<Document>> {
        let key_value = key_value.into();
        tracing::info!("DynamoDB get_item: {} = {}", key_name, key_value);

        let output = self
            .client
            .get_item()
            .table_name(self.table()?)
            .key(key_name, to_attribute(&key_value))
            .send()
            .await
            .map_err(|e| {
                Self::failure(
                    &format!("Unable to Get item. {}: {}", key_name, key_value),
                    e,
                )
            })?;

        Ok(output.item().map(to_document))
    }

    pub async fn put_item(&self, document: &Document) -> Result<()> {
        tracing::info!("DynamoDB put_item: start");

        self.client
            .put_item()
            .table_name(self.table()?)
            .set_item(Some(to_item(document)))
            .send()
            .await
            .map_err(|e| Self::failure("Unable to PUT item.", e))?;

        tracing::info!("DynamoDB put_item: success");
        Ok(())
    }

    pub async fn delete_item(&self, key_name: &str, key_value: impl Into<Value>) -> Result<()> {
        let key_value = key_value.into();
        tracing::info!("DynamoDB delete_item: {} = {}", key_name, key_value);

        self.client
            .delete_item()
            .table_name(self.table()?)
            .key(key_name, to_attribute(&key_value))
            .send()
            .await
            .map_err(|e| Self::failure("Unable to DELETE item.", e))?;

        tracing::info!("DynamoDB delete_item: success");
        Ok(())
    }

    /// One page of items whose `key_name` starts with `prefix`.
    pub async fn search(
        &self,
        prefix: &str,
        key_name: &str,
        limit: Option<i32>,
        start_key: Option<&Document>,
    ) -> Result<SearchPage> {
        tracing::info!("DynamoDB search: {} begins with {}", key_name, prefix);
        let filter = ScanFilter::begins_with(key_name, prefix);

        let output = self
            .client
            .scan()
            .table_name(self.table()?)
            .filter_expression(filter.expression)
            .set_expression_attribute_names(Some(filter.names))
            .set_expression_attribute_values(Some(filter.values))
            .set_limit(limit)
            .set_exclusive_start_key(start_key.map(to_item))
            .send()
            .await
            .map_err(|e| Self::failure("Unable to search for items.", e))?;

        let page = SearchPage {
            items: output.items().iter().map(to_document).collect(),
            count: output.count(),
            last_evaluated_key: output
                .last_evaluated_key()
                .filter(|k| !k.is_empty())
                .map(to_document),
        };

        tracing::info!("DynamoDB search: {} items", page.items.len());
        Ok(page)
    }

    pub async fn search_duplicate(&self, key_name: &str, key_value: impl Into<Value>) -> Result<Vec<Document>> {
        tracing::info!("DynamoDB search_duplicate: {}", key_name);
        self.scan_all(
            Some(ScanFilter::equals(key_name, key_value)),
            "Unable to search for items.",
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_filters() {
        let eq = ScanFilter::equals("status", "approved");
        assert_eq!(eq.expression, "#attr = :value");
        assert_eq!(eq.names["#attr"], "status");
        assert_eq!(eq.values[":value"], AttributeValue::S("approved".to_string()));

        let ne = ScanFilter::not_equals("status", "archived");
        assert_eq!(ne.expression, "#attr <> :value");

        let prefix = ScanFilter::begins_with("uid", "ab");
        assert_eq!(prefix.expression, "begins_with(#attr, :value)");
        assert_eq!(prefix.names["#attr"], "uid");
    }
}
