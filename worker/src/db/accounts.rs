//! Database operations for the mirror (accounts) tables.
//!
//! Every identifier comes from [`SyncSettings`] and is backtick-quoted; every
//! value is bound.

use super::codec::row_to_json;
use crate::config::SyncSettings;
use crate::error::{AppError, Result};
use rowmirror_engine::mirror::columns;
use rowmirror_engine::{quote_identifier, AccountProjection, Row};
use sqlx::MySqlConnection;

/// Cluster and role a source row's account should be associated with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClusterLink {
    pub cluster_id: Option<i64>,
    pub role_id: Option<i64>,
}

impl ClusterLink {
    /// Both ends resolved, as `(cluster_id, role_id)`.
    pub fn resolved(&self) -> Option<(i64, i64)> {
        Some((self.cluster_id?, self.role_id?))
    }
}

/// Mirror row for `source_id`, if any.
pub async fn find_by_source(
    conn: &mut MySqlConnection,
    settings: &SyncSettings,
    source_id: &str,
) -> Result<Option<Row>> {
    let sql = format!(
        "SELECT * FROM {} AS a WHERE a.`source_table` = ? AND a.`source_id` = ? LIMIT 1",
        quote_identifier(&settings.mirror_table)
    );

    let row = sqlx::query(&sql)
        .bind(&settings.source_table)
        .bind(source_id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(row.as_ref().map(row_to_json).transpose()?)
}

/// Mirror row by its own id.
pub async fn find_by_id(
    conn: &mut MySqlConnection,
    settings: &SyncSettings,
    id: u64,
) -> Result<Option<Row>> {
    let sql = format!(
        "SELECT * FROM {} AS a WHERE a.`id` = ?",
        quote_identifier(&settings.mirror_table)
    );

    let row = sqlx::query(&sql).bind(id).fetch_optional(&mut *conn).await?;
    Ok(row.as_ref().map(row_to_json).transpose()?)
}

/// Insert a mirror row and return its id.
pub async fn insert_account(
    conn: &mut MySqlConnection,
    settings: &SyncSettings,
    projection: &AccountProjection,
    account_type_id: i64,
) -> Result<u64> {
    let sql = format!(
        "INSERT INTO {} (`{}`, `{}`, `{}`, `{}`, `{}`, `{}`, `{}`, `{}`) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        quote_identifier(&settings.mirror_table),
        columns::EXTERNAL_ID,
        columns::TITLE,
        columns::EMAIL,
        columns::PHONE,
        columns::IS_ACTIVE,
        columns::ACCOUNT_TYPE_ID,
        columns::SOURCE_TABLE,
        columns::SOURCE_ID,
    );

    let result = sqlx::query(&sql)
        .bind(&projection.external_id)
        .bind(&projection.title)
        .bind(&projection.email)
        .bind(&projection.phone)
        .bind(projection.is_active)
        .bind(account_type_id)
        .bind(&settings.source_table)
        .bind(source_id_text(projection))
        .execute(&mut *conn)
        .await?;

    match result.last_insert_id() {
        0 => Err(AppError::DatabaseRequestFailed(None)),
        id => Ok(id),
    }
}

/// Overwrite the projected columns of mirror row `id`.
pub async fn update_account(
    conn: &mut MySqlConnection,
    settings: &SyncSettings,
    id: u64,
    projection: &AccountProjection,
    account_type_id: i64,
) -> Result<()> {
    let sql = format!(
        "UPDATE {} SET `{}` = ?, `{}` = ?, `{}` = ?, `{}` = ?, `{}` = ?, `{}` = ?, `{}` = ? \
         WHERE `id` = ?",
        quote_identifier(&settings.mirror_table),
        columns::SOURCE_ID,
        columns::EXTERNAL_ID,
        columns::IS_ACTIVE,
        columns::TITLE,
        columns::EMAIL,
        columns::PHONE,
        columns::ACCOUNT_TYPE_ID,
    );

    sqlx::query(&sql)
        .bind(source_id_text(projection))
        .bind(&projection.external_id)
        .bind(projection.is_active)
        .bind(&projection.title)
        .bind(&projection.email)
        .bind(&projection.phone)
        .bind(account_type_id)
        .bind(id)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

/// Delete mirror row `id`, returning the number of rows removed.
pub async fn delete_account(
    conn: &mut MySqlConnection,
    settings: &SyncSettings,
    id: u64,
) -> Result<u64> {
    let sql = format!(
        "DELETE FROM {} WHERE `id` = ?",
        quote_identifier(&settings.mirror_table)
    );
    let result = sqlx::query(&sql).bind(id).execute(&mut *conn).await?;
    Ok(result.rows_affected())
}

/// Resolve the cluster of the source row's `pod` and the cluster role.
///
/// Pods are matched to cluster titles as `P<pod>`, zero-padded to two digits.
pub async fn find_cluster_link(
    conn: &mut MySqlConnection,
    settings: &SyncSettings,
    source_id: &str,
) -> Result<ClusterLink> {
    let sql = format!(
        "SELECT cl.`id` AS cluster_id, r.`id` AS role_id \
         FROM {source} AS c \
         LEFT JOIN ( \
             SELECT sc.`id`, sc.`title` FROM {clusters} AS sc WHERE sc.`source_table` = ? \
         ) AS cl ON CONCAT(IF(c.`pod` * 1 < 10, 'P0', 'P'), c.`pod`) = cl.`title` \
         LEFT JOIN {roles} AS r ON r.`key` = ? \
         WHERE c.`id` = ? \
         LIMIT 1",
        source = quote_identifier(&settings.source_table),
        clusters = quote_identifier(&settings.cluster_table),
        roles = quote_identifier(&settings.roles_table),
    );

    let row = sqlx::query(&sql)
        .bind(&settings.cluster_source_table)
        .bind(&settings.cluster_role_key)
        .bind(source_id)
        .fetch_optional(&mut *conn)
        .await?;

    let Some(row) = row else {
        return Ok(ClusterLink::default());
    };
    let row = row_to_json(&row)?;

    Ok(ClusterLink {
        cluster_id: row.get("cluster_id").and_then(|v| v.as_i64()),
        role_id: row.get("role_id").and_then(|v| v.as_i64()),
    })
}

/// Statement inserting an association, or moving an existing one to a new
/// cluster. The role of an existing association is left as it is.
fn association_upsert_sql(settings: &SyncSettings) -> String {
    format!(
        "INSERT INTO {} (`resource_id`, `context_id`, `role_id`, `source_id`, `source_table`) \
         VALUES (?, ?, ?, ?, ?) \
         ON DUPLICATE KEY UPDATE `context_id` = VALUES(`context_id`)",
        quote_identifier(&settings.association_table)
    )
}

/// Create or refresh the cluster association of a mirrored source row.
///
/// Relies on the unique key over `(source_table, source_id)`.
pub async fn upsert_cluster_association(
    conn: &mut MySqlConnection,
    settings: &SyncSettings,
    account_id: u64,
    source_id: &str,
    cluster_id: i64,
    role_id: i64,
) -> Result<()> {
    let sql = association_upsert_sql(settings);

    sqlx::query(&sql)
        .bind(account_id)
        .bind(cluster_id)
        .bind(role_id)
        .bind(source_id)
        .bind(&settings.source_table)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

/// Delete rows hanging off `source_id` from every dependent table.
pub async fn delete_dependents(
    conn: &mut MySqlConnection,
    settings: &SyncSettings,
    source_id: &str,
) -> Result<u64> {
    let mut removed = 0;

    for dependent in &settings.dependent_tables {
        let mut sql = format!(
            "DELETE FROM {} WHERE {} = ?",
            quote_identifier(&dependent.table),
            quote_identifier(&dependent.key_column)
        );
        if let Some(column) = &dependent.source_table_column {
            sql.push_str(&format!(" AND {} = ?", quote_identifier(column)));
        }

        let mut query = sqlx::query(&sql).bind(source_id);
        if dependent.source_table_column.is_some() {
            query = query.bind(&settings.source_table);
        }

        let result = query.execute(&mut *conn).await?;
        tracing::debug!(
            table = %dependent.table,
            rows = result.rows_affected(),
            "Deleted dependent rows"
        );
        removed += result.rows_affected();
    }

    Ok(removed)
}

/// Id of the configured account type in the dictionaries table.
pub async fn account_type_id(
    conn: &mut MySqlConnection,
    settings: &SyncSettings,
) -> Result<Option<i64>> {
    let sql = format!(
        "SELECT d.`id` FROM {} AS d WHERE d.`type` = ? AND d.`title` = ? LIMIT 1",
        quote_identifier(&settings.dictionaries_table)
    );

    let row = sqlx::query(&sql)
        .bind(&settings.account_type)
        .bind(&settings.account_type_title)
        .fetch_optional(&mut *conn)
        .await?;

    let Some(row) = row else {
        return Ok(None);
    };
    Ok(row_to_json(&row)?.get("id").and_then(|v| v.as_i64()))
}

fn source_id_text(projection: &AccountProjection) -> Option<String> {
    rowmirror_engine::format::text_value(&projection.source_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cluster_link_needs_both_ends() {
        assert_eq!(ClusterLink::default().resolved(), None);
        let link = ClusterLink {
            cluster_id: Some(4),
            role_id: None,
        };
        assert_eq!(link.resolved(), None);
        let link = ClusterLink {
            cluster_id: Some(4),
            role_id: Some(9),
        };
        assert_eq!(link.resolved(), Some((4, 9)));
    }

    #[test]
    fn association_upsert_refreshes_cluster_only() {
        let sql = association_upsert_sql(&SyncSettings::default());
        assert!(sql.starts_with("INSERT INTO `rcsredb`.`accounts_has_clusters`"));
        let (_, update) = sql.split_once("ON DUPLICATE KEY UPDATE").unwrap();
        assert_eq!(update.trim(), "`context_id` = VALUES(`context_id`)");
    }
}
