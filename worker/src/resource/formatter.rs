//! Resource formatter.
//!
//! Wraps the engine's row formatting with relationship resolution. Resources
//! whose settings enable one-to-many surfacing get every configured relation
//! that the resolver did not already produce, looked up concurrently.

use super::RelationshipResolver;
use crate::config::ResourceSettings;
use crate::error::Result;
use futures::future::try_join_all;
use rowmirror_engine::{format_resource, Resource, ResourceSchema, Row};
use std::sync::Arc;

#[derive(Clone)]
pub struct ResourceFormatter {
    schema: Arc<ResourceSchema>,
    resolver: Arc<dyn RelationshipResolver>,
    settings: Arc<Vec<ResourceSettings>>,
}

impl ResourceFormatter {
    pub fn new(
        schema: Arc<ResourceSchema>,
        resolver: Arc<dyn RelationshipResolver>,
        settings: Vec<ResourceSettings>,
    ) -> Self {
        Self {
            schema,
            resolver,
            settings: Arc::new(settings),
        }
    }

    /// Format one row as `resource`.
    pub async fn format_row(
        &self,
        row: &Row,
        resource: &str,
        include_relationships: bool,
    ) -> Result<Resource> {
        let mut formatted = format_resource(row, resource, &self.schema);
        if !include_relationships {
            return Ok(formatted);
        }

        let mut relationships = self.resolver.build_relationships(row).await?;

        if let Some(settings) = ResourceSettings::find(&self.settings, resource)
            .filter(|s| s.add_one_to_many_relationships_to_response)
        {
            let missing: Vec<_> = settings
                .relationships
                .iter()
                .filter(|r| !relationships.contains_key(&r.name))
                .collect();

            let resolved = try_join_all(
                missing
                    .iter()
                    .map(|r| self.resolver.one_to_many(&formatted.id, r)),
            )
            .await?;

            for (settings, value) in missing.into_iter().zip(resolved) {
                relationships.insert(settings.name.clone(), value);
            }
        }

        formatted.relationships = Some(relationships);
        Ok(formatted)
    }

    /// Format every row, preserving order.
    pub async fn format_many(
        &self,
        rows: &[Row],
        resource: &str,
        include_relationships: bool,
    ) -> Result<Vec<Resource>> {
        try_join_all(
            rows.iter()
                .map(|row| self.format_row(row, resource, include_relationships)),
        )
        .await
    }

    /// Format only the first row, if any.
    pub async fn format_first(
        &self,
        rows: &[Row],
        resource: &str,
        include_relationships: bool,
    ) -> Result<Option<Resource>> {
        match rows.first() {
            Some(row) => Ok(Some(
                self.format_row(row, resource, include_relationships).await?,
            )),
            None => Ok(None),
        }
    }
}
