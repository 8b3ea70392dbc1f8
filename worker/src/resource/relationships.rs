//! Relationship resolution for formatted resources.

use crate::config::RelationshipSettings;
use crate::db::{acquire, rows_to_json, Pool};
use crate::error::Result;
use async_trait::async_trait;
use rowmirror_engine::format::{resource_id, text_value};
use rowmirror_engine::{quote_identifier, Relationships, ResourceSchema, Row};
use serde_json::{json, Value};
use std::sync::Arc;

/// Builds the `relationships` member of a resource.
#[async_trait]
pub trait RelationshipResolver: Send + Sync {
    /// Relationships declared by the resource schema for `row`.
    async fn build_relationships(&self, row: &Row) -> Result<Relationships>;

    /// Items related to resource `id` through a configured reference table.
    async fn one_to_many(&self, id: &str, settings: &RelationshipSettings) -> Result<Value>;
}

/// Resolver for resources without relations.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRelationships;

#[async_trait]
impl RelationshipResolver for NoRelationships {
    async fn build_relationships(&self, _row: &Row) -> Result<Relationships> {
        Ok(Relationships::new())
    }

    async fn one_to_many(&self, _id: &str, _settings: &RelationshipSettings) -> Result<Value> {
        Ok(linkage(Vec::new()))
    }
}

/// Resolves relationships with queries against the relation tables.
#[derive(Clone)]
pub struct SqlRelationshipResolver {
    pool: Pool,
    schema: Arc<ResourceSchema>,
}

impl SqlRelationshipResolver {
    pub fn new(pool: Pool, schema: Arc<ResourceSchema>) -> Self {
        Self { pool, schema }
    }

    async fn related_ids(&self, sql: &str, binds: &[&str]) -> Result<Vec<String>> {
        let mut query = sqlx::query(sql);
        for value in binds {
            query = query.bind(*value);
        }

        let mut conn = acquire(&self.pool, None).await?;
        let rows = rows_to_json(&query.fetch_all(&mut *conn).await?)?;

        Ok(rows
            .iter()
            .filter_map(|row| row.values().next().and_then(text_value))
            .collect())
    }
}

#[async_trait]
impl RelationshipResolver for SqlRelationshipResolver {
    async fn build_relationships(&self, row: &Row) -> Result<Relationships> {
        let mut relationships = Relationships::new();
        let id = resource_id(row, &self.schema);
        if id == "null" {
            return Ok(relationships);
        }

        for (name, def) in self.schema.relationships() {
            let sql = format!(
                "SELECT {} FROM {} WHERE {} = ?",
                quote_identifier(&def.id_column),
                quote_identifier(&def.relation_table),
                quote_identifier(&def.resource_column)
            );
            let ids = self.related_ids(&sql, &[id.as_str()]).await?;
            relationships.insert(name.clone(), linkage(identifiers(name, ids)));
        }

        Ok(relationships)
    }

    async fn one_to_many(&self, id: &str, settings: &RelationshipSettings) -> Result<Value> {
        let columns = &settings.columns;
        let reference = quote_identifier(&settings.reference_table);

        let ids = match (&settings.role_key, &settings.roles_table) {
            (Some(role_key), Some(roles_table)) => {
                let sql = format!(
                    "SELECT rt.{ctx} FROM {reference} AS rt \
                     INNER JOIN {roles} AS r ON r.`id` = rt.{role} AND r.`key` = ? \
                     WHERE rt.{res} = ?",
                    ctx = quote_identifier(&columns.context_id),
                    role = quote_identifier(&columns.role_id),
                    res = quote_identifier(&columns.resource_id),
                    roles = quote_identifier(roles_table),
                );
                self.related_ids(&sql, &[role_key.as_str(), id]).await?
            }
            _ => {
                let sql = format!(
                    "SELECT rt.{} FROM {} AS rt WHERE rt.{} = ?",
                    quote_identifier(&columns.context_id),
                    reference,
                    quote_identifier(&columns.resource_id)
                );
                self.related_ids(&sql, &[id]).await?
            }
        };

        Ok(linkage(identifiers(&settings.resource_type, ids)))
    }
}

fn identifiers(resource_type: &str, ids: Vec<String>) -> Vec<Value> {
    ids.into_iter()
        .map(|id| json!({"type": resource_type, "id": id}))
        .collect()
}

/// `{"data": [...]}` resource linkage.
fn linkage(data: Vec<Value>) -> Value {
    json!({ "data": data })
}
