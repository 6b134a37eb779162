use aws_sdk_dynamodb::primitives::Blob;
use aws_sdk_dynamodb::types::AttributeValue;
use serde_json::{Map, Number, Value};
use std::collections::HashMap;

/// A DynamoDB item in plain JSON form.
pub type Document = Map<String, Value>;

pub type Item = HashMap<String, AttributeValue>;

pub fn to_attribute(value: &Value) -> AttributeValue {
    match value {
        Value::Null => AttributeValue::Null(true),
        Value::Bool(b) => AttributeValue::Bool(*b),
        Value::Number(n) => AttributeValue::N(n.to_string()),
        Value::String(s) => AttributeValue::S(s.clone()),
        Value::Array(values) => AttributeValue::L(values.iter().map(to_attribute).collect()),
        Value::Object(map) => AttributeValue::M(to_item(map)),
    }
}

fn number(n: &str) -> Value {
    if let Ok(i) = n.parse::<i64>() {
        return Value::Number(i.into());
    }
    n.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
        // out-of-range numbers stay exact as text
        .unwrap_or_else(|| Value::String(n.to_string()))
}

fn bytes(blob: &Blob) -> Value {
    Value::Array(blob.as_ref().iter().map(|b| Value::from(*b)).collect())
}

pub fn from_attribute(attribute: &AttributeValue) -> Value {
    match attribute {
        AttributeValue::S(s) => Value::String(s.clone()),
        AttributeValue::N(n) => number(n),
        AttributeValue::Bool(b) => Value::Bool(*b),
        AttributeValue::Null(_) => Value::Null,
        AttributeValue::L(values) => Value::Array(values.iter().map(from_attribute).collect()),
        AttributeValue::M(map) => Value::Object(to_document(map)),
        AttributeValue::Ss(values) => Value::Array(values.iter().cloned().map(Value::String).collect()),
        AttributeValue::Ns(values) => Value::Array(values.iter().map(|n| number(n)).collect()),
        AttributeValue::B(blob) => bytes(blob),
        AttributeValue::Bs(blobs) => Value::Array(blobs.iter().map(bytes).collect()),
        _ => Value::Null,
    }
}

pub fn to_item(document: &Document) -> Item {
    document
        .iter()
        .map(|(k, v)| (k.clone(), to_attribute(v)))
        .collect()
}

pub fn to_document(item: &Item) -> Document {
    item.iter()
        .map(|(k, v)| (k.clone(), from_attribute(v)))
        .collect()
}
