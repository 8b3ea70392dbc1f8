//! Resource schema descriptor.
//!
//! A schema describes one resource: which columns are exposed as attributes,
//! which property is the primary key, and how each property is named in the
//! other tables the resource is written to. Schemas are parsed once from a
//! JSON document and never change afterwards.

use crate::{error::Result, Error};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Alias key holding a property's column name in the resource's action table.
pub const ACTION_FIELD_ALIAS: &str = "field_name";

/// Primary field used when no property is flagged as primary.
pub const DEFAULT_PRIMARY_FIELD: &str = "id";

/// A single schema property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Property {
    /// Canonical property name
    pub name: String,
    /// Column name of this property per target table
    pub aliases: BTreeMap<String, String>,
    /// Whether this property is the primary key
    pub primary: bool,
    /// Whether the mirror equality check ignores this property
    pub exclude_from_comparing: bool,
}

impl Property {
    /// Column name of this property in `table`, if it has one.
    pub fn alias(&self, table: &str) -> Option<&str> {
        self.aliases.get(table).map(String::as_str)
    }
}

/// Join table description for a to-many relationship.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipDef {
    /// Table holding the relation rows
    pub relation_table: String,
    /// Column referencing this resource's id
    pub resource_column: String,
    /// Column holding the related resource's id
    pub id_column: String,
}

#[derive(Deserialize)]
struct SchemaDocument {
    #[serde(default)]
    title: String,
    #[serde(default)]
    attributes: Vec<String>,
    #[serde(default)]
    properties: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    relationships: BTreeMap<String, RelationshipDef>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PropertyDocument {
    #[serde(default)]
    alias: BTreeMap<String, String>,
    #[serde(default)]
    primary: bool,
    #[serde(default)]
    exclude_from_comparing: bool,
}

/// Immutable descriptor of a resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceSchema {
    title: String,
    attributes: Vec<String>,
    properties: Vec<Property>,
    relationships: BTreeMap<String, RelationshipDef>,
    primary_field: String,
    primary_action_field: String,
}

impl ResourceSchema {
    /// Parse a schema from its JSON document text.
    pub fn from_json(text: &str) -> Result<Self> {
        let value: serde_json::Value =
            serde_json::from_str(text).map_err(|e| Error::InvalidSchema(e.to_string()))?;
        Self::from_value(value)
    }

    /// Build a schema from an already-parsed JSON document.
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        let document: SchemaDocument =
            serde_json::from_value(value).map_err(|e| Error::InvalidSchema(e.to_string()))?;

        let mut properties = Vec::with_capacity(document.properties.len());
        for (name, raw) in document.properties {
            let prop: PropertyDocument = serde_json::from_value(raw)
                .map_err(|e| Error::InvalidSchema(format!("property '{}': {}", name, e)))?;
            properties.push(Property {
                name,
                aliases: prop.alias,
                primary: prop.primary,
                exclude_from_comparing: prop.exclude_from_comparing,
            });
        }

        let primary_field = properties
            .iter()
            .find(|p| p.primary)
            .map(|p| p.name.clone())
            .unwrap_or_else(|| DEFAULT_PRIMARY_FIELD.to_string());

        let primary_action_field = properties
            .iter()
            .find(|p| p.name == primary_field)
            .and_then(|p| p.alias(ACTION_FIELD_ALIAS))
            .map(str::to_string)
            .unwrap_or_else(|| primary_field.clone());

        Ok(Self {
            title: document.title,
            attributes: document.attributes,
            properties,
            relationships: document.relationships,
            primary_field,
            primary_action_field,
        })
    }

    /// Schema title.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Declared attributes, in document order.
    pub fn attributes(&self) -> &[String] {
        &self.attributes
    }

    /// All properties, in document order.
    pub fn properties(&self) -> &[Property] {
        &self.properties
    }

    /// Relationship sections by name.
    pub fn relationships(&self) -> &BTreeMap<String, RelationshipDef> {
        &self.relationships
    }

    /// Get a property by name.
    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name == name)
    }

    /// Name of the primary-key property in the main table.
    pub fn primary_field(&self) -> &str {
        &self.primary_field
    }

    /// Name of the primary-key column in the action table.
    pub fn primary_action_field(&self) -> &str {
        &self.primary_action_field
    }

    /// Whether `name` is a declared attribute.
    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.iter().any(|a| a == name)
    }

    /// Whether `name` can be used as a column in a query against this resource.
    pub fn is_queryable(&self, name: &str) -> bool {
        name == self.primary_field || self.has_attribute(name) || self.property(name).is_some()
    }

    /// `(property, column)` pairs for every property aliased into `table`.
    pub fn table_aliases(&self, table: &str) -> Vec<(&str, &str)> {
        self.properties
            .iter()
            .filter_map(|p| p.alias(table).map(|column| (p.name.as_str(), column)))
            .collect()
    }

    /// Like [`table_aliases`](Self::table_aliases) but without properties
    /// excluded from comparison.
    pub fn comparable_aliases(&self, table: &str) -> Vec<(&str, &str)> {
        self.properties
            .iter()
            .filter(|p| !p.exclude_from_comparing)
            .filter_map(|p| p.alias(table).map(|column| (p.name.as_str(), column)))
            .collect()
    }
}
