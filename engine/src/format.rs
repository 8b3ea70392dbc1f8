//! JSON:API-style resource representation.
//!
//! Rows are plain JSON objects keyed by column name. Formatting a row keeps
//! only the attributes the schema declares and renders every value as a
//! string or null, so consumers see one transport type regardless of the
//! column's SQL type. Empty values (null, `""`, `0`, `false`) render as null.

use crate::{error::Result, Error, ResourceSchema, Row};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Relationship objects keyed by relation name.
pub type Relationships = serde_json::Map<String, Value>;

/// A formatted resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub id: String,
    #[serde(rename = "type")]
    pub resource_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attributes: Option<Row>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relationships: Option<Relationships>,
}

/// Text form of a scalar JSON value; `None` for null.
///
/// Strings are returned as-is, numbers and booleans use their JSON spelling,
/// arrays and objects are serialized.
pub fn text_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}

/// Text of a value, treating null, empty strings, zero and `false` as absent.
pub fn truthy_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Null | Value::Bool(false) => None,
        Value::String(s) if s.is_empty() => None,
        Value::Number(n) if n.as_f64() == Some(0.0) => None,
        other => text_value(other),
    }
}

/// Resource id: the primary-key value as a string, or `"null"` when absent.
pub fn resource_id(row: &Row, schema: &ResourceSchema) -> String {
    row.get(schema.primary_field())
        .and_then(text_value)
        .unwrap_or_else(|| "null".to_string())
}

/// Declared attributes present in `row`, each as string-or-null.
///
/// Returns `None` when the row carries none of the declared attributes.
pub fn format_attributes(row: &Row, schema: &ResourceSchema) -> Option<Row> {
    let primary = schema.primary_field();
    let attributes: Row = schema
        .attributes()
        .iter()
        .filter(|name| name.as_str() != primary)
        .filter_map(|name| {
            row.get(name).map(|value| {
                let text = truthy_text(Some(value)).map(Value::String).unwrap_or(Value::Null);
                (name.clone(), text)
            })
        })
        .collect();

    if attributes.is_empty() {
        None
    } else {
        Some(attributes)
    }
}

/// Format a row without relationships.
pub fn format_resource(row: &Row, resource_type: &str, schema: &ResourceSchema) -> Resource {
    Resource {
        id: resource_id(row, schema),
        resource_type: resource_type.to_string(),
        attributes: format_attributes(row, schema),
        relationships: None,
    }
}

/// Extract the write payload from a JSON:API document (`data.attributes`).
pub fn parse_body(document: &Value) -> Result<Row> {
    match document.get("data").and_then(|d| d.get("attributes")) {
        None | Some(Value::Null) => Ok(Row::new()),
        Some(Value::Object(attributes)) => Ok(attributes.clone()),
        Some(_) => Err(Error::InvalidData(
            "data.attributes must be an object".into(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> ResourceSchema {
        ResourceSchema::from_value(json!({
            "attributes": ["id", "title", "email", "is_active", "score"],
            "properties": {"id": {"primary": true}}
        }))
        .unwrap()
    }

    fn row(value: Value) -> Row {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn formats_row() {
        let resource = format_resource(
            &row(json!({"id": 7, "title": "Alice", "email": null, "is_active": 1, "password": "x"})),
            "accounts",
            &schema(),
        );

        assert_eq!(resource.id, "7");
        assert_eq!(resource.resource_type, "accounts");
        let attributes = resource.attributes.unwrap();
        assert_eq!(attributes["title"], "Alice");
        assert_eq!(attributes["email"], Value::Null);
        assert_eq!(attributes["is_active"], "1");
        assert!(!attributes.contains_key("password"));
        assert!(!attributes.contains_key("id"));
    }

    #[test]
    fn missing_primary_key_is_null_string() {
        let resource = format_resource(&row(json!({"title": "x"})), "accounts", &schema());
        assert_eq!(resource.id, "null");
    }

    #[test]
    fn attributes_omitted_when_none_present() {
        let resource = format_resource(&row(json!({"id": "9", "other": 1})), "accounts", &schema());
        assert!(resource.attributes.is_none());

        let json = serde_json::to_value(&resource).unwrap();
        assert_eq!(json, json!({"id": "9", "type": "accounts"}));
    }

    #[test]
    fn empty_values_render_as_null() {
        let attributes = format_attributes(
            &row(json!({"id": 1, "score": 0, "title": "", "is_active": false, "email": "0"})),
            &schema(),
        )
        .unwrap();
        assert_eq!(attributes["score"], Value::Null);
        assert_eq!(attributes["title"], Value::Null);
        assert_eq!(attributes["is_active"], Value::Null);
        // only the number zero is empty, not its text
        assert_eq!(attributes["email"], "0");
        assert_eq!(attributes.len(), 4);
    }

    #[test]
    fn truthy_values() {
        assert_eq!(truthy_text(None), None);
        assert_eq!(truthy_text(Some(&json!(0.0))), None);
        assert_eq!(truthy_text(Some(&json!(true))), Some("true".into()));
        assert_eq!(truthy_text(Some(&json!(-1))), Some("-1".into()));
    }

    #[test]
    fn text_values() {
        assert_eq!(text_value(&json!(null)), None);
        assert_eq!(text_value(&json!("a")), Some("a".into()));
        assert_eq!(text_value(&json!(500)), Some("500".into()));
        assert_eq!(text_value(&json!(1.5)), Some("1.5".into()));
        assert_eq!(text_value(&json!([1])), Some("[1]".into()));
    }

    #[test]
    fn body_attributes() {
        let payload = parse_body(&json!({"data": {"type": "accounts", "attributes": {"title": "t"}}}))
            .unwrap();
        assert_eq!(payload["title"], "t");

        assert!(parse_body(&json!({})).unwrap().is_empty());
        assert!(parse_body(&json!({"data": {"attributes": [1]}})).is_err());
    }
}
