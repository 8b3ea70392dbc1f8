//! Resource data accessor.
//!
//! Generic CRUD over a resource's main (read) and action (write) tables.
//! Column names only ever reach SQL after being checked against the schema
//! and backtick-quoted; values are always bound.

use crate::config::Tables;
use crate::db::{self, acquire, bind_all, bind_value, Pool};
use crate::error::{AppError, Result};
use rowmirror_engine::{
    compile_where, get_sorting, quote_identifier, CompiledQuery, Error, FilterParam,
    ResourceQuery, ResourceSchema, Row,
};
use sqlx::MySqlConnection;
use std::sync::Arc;

/// Field holding the source id in an action table distinct from the main table.
const SOURCE_ID_COLUMN: &str = "source_id";

/// Payload key never written by [`ResourceAccessor::update`].
const CREATED_BY_COLUMN: &str = "created_by";

#[derive(Clone)]
pub struct ResourceAccessor {
    pool: Pool,
    schema: Arc<ResourceSchema>,
    tables: Tables,
}

impl ResourceAccessor {
    pub fn new(pool: Pool, schema: Arc<ResourceSchema>, tables: Tables) -> Self {
        Self {
            pool,
            schema,
            tables,
        }
    }

    pub fn schema(&self) -> &ResourceSchema {
        &self.schema
    }

    pub fn tables(&self) -> &Tables {
        &self.tables
    }

    /// Rows of `table` (main table by default) matching `query`.
    pub async fn fetch_by_filter(
        &self,
        query: &ResourceQuery,
        table: Option<&str>,
        conn: Option<&mut MySqlConnection>,
    ) -> Result<Vec<Row>> {
        let target = table.unwrap_or(&self.tables.main_table);
        let (sql_text, compiled) = self.select_sql(query, target)?;

        tracing::debug!(sql = %sql_text, values = ?compiled.values, "Fetching by filter");

        let mut conn = acquire(&self.pool, conn).await?;
        let rows = bind_all(sqlx::query(&sql_text), &compiled.values)
            .fetch_all(&mut *conn)
            .await?;

        Ok(db::rows_to_json(&rows)?)
    }

    /// The first row of `table` whose `field` (primary field by default)
    /// equals `value`.
    pub async fn fetch_one_by_field(
        &self,
        value: &str,
        field: Option<&str>,
        table: Option<&str>,
        conn: Option<&mut MySqlConnection>,
    ) -> Result<Row> {
        let target = table.unwrap_or(&self.tables.main_table);
        let field = field.unwrap_or(self.schema.primary_field());
        let sql_text = format!(
            "SELECT * FROM {} WHERE {} = ?",
            quote_identifier(target),
            quote_identifier(field)
        );

        let mut conn = acquire(&self.pool, conn).await?;
        let row = sqlx::query(&sql_text)
            .bind(value)
            .fetch_optional(&mut *conn)
            .await?;

        match row {
            Some(row) => Ok(db::row_to_json(&row)?),
            None => Err(AppError::ResourceNotFound),
        }
    }

    /// Insert `payload` into `table` (action table by default) and return the
    /// stored row.
    pub async fn insert(
        &self,
        payload: &Row,
        table: Option<&str>,
        conn: Option<&mut MySqlConnection>,
    ) -> Result<Row> {
        let target = table.unwrap_or(self.tables.action_table());

        let columns: Vec<String> = payload.keys().map(|k| quote_identifier(k)).collect();
        let sql_text = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_identifier(target),
            columns.join(", "),
            vec!["?"; columns.len()].join(", ")
        );

        let mut conn = acquire(&self.pool, conn).await?;

        let mut query = sqlx::query(&sql_text);
        for value in payload.values() {
            query = bind_value(query, value);
        }
        let result = query.execute(&mut *conn).await?;

        let insert_id = match result.last_insert_id() {
            0 => return Err(AppError::DatabaseRequestFailed(None)),
            id => id.to_string(),
        };
        tracing::debug!(table = target, insert_id = %insert_id, "Inserted row");

        let field = self.refetch_field();
        self.fetch_one_by_field(&insert_id, Some(field), Some(target), Some(&mut *conn))
            .await
    }

    /// Update the row whose primary action field equals `id`.
    ///
    /// Fails with [`AppError::ResourceNotFound`] when no row matches and with
    /// [`AppError::NoContent`] when the row was already as requested.
    pub async fn update(
        &self,
        payload: &Row,
        id: &str,
        table: Option<&str>,
        conn: Option<&mut MySqlConnection>,
    ) -> Result<Row> {
        let target = table.unwrap_or(self.tables.action_table());
        let key = self.schema.primary_action_field();

        let mut payload = payload.clone();
        payload.remove(CREATED_BY_COLUMN);

        let mut conn = acquire(&self.pool, conn).await?;

        let before = self
            .fetch_one_by_field(id, Some(key), Some(target), Some(&mut *conn))
            .await?;
        if payload.is_empty() {
            return Err(AppError::NoContent);
        }

        let filter = compile_where(&[FilterParam::eq(quote_identifier(key), id)]);
        let sets: Vec<String> = payload
            .keys()
            .map(|k| format!("{} = ?", quote_identifier(k)))
            .collect();
        let sql_text = format!(
            "UPDATE {} SET {} WHERE {}",
            quote_identifier(target),
            sets.join(", "),
            filter.where_clause
        );

        let mut query = sqlx::query(&sql_text);
        for value in payload.values() {
            query = bind_value(query, value);
        }
        let result = bind_all(query, &filter.values).execute(&mut *conn).await?;
        if result.rows_affected() == 0 {
            return Err(AppError::ResourceNotFound);
        }

        // affected rows count matched rows, so compare the row itself
        let after = self
            .fetch_one_by_field(id, Some(key), Some(target), Some(&mut *conn))
            .await?;
        if before == after {
            return Err(AppError::NoContent);
        }

        let field = self.refetch_field();
        self.fetch_one_by_field(id, Some(field), Some(target), Some(&mut *conn))
            .await
    }

    /// Delete the row whose primary action field equals `id`.
    pub async fn remove(
        &self,
        id: &str,
        table: Option<&str>,
        conn: Option<&mut MySqlConnection>,
    ) -> Result<()> {
        let target = table.unwrap_or(self.tables.action_table());
        let filter = compile_where(&[FilterParam::eq(
            quote_identifier(self.schema.primary_action_field()),
            id,
        )]);
        let sql_text = format!(
            "DELETE FROM {} WHERE {}",
            quote_identifier(target),
            filter.where_clause
        );

        let mut conn = acquire(&self.pool, conn).await?;
        let result = bind_all(sqlx::query(&sql_text), &filter.values)
            .execute(&mut *conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::ResourceNotFound);
        }
        Ok(())
    }

    /// Column a freshly written row is read back by.
    fn refetch_field(&self) -> &str {
        if self.tables.action_table() == self.tables.main_table {
            self.schema.primary_action_field()
        } else {
            SOURCE_ID_COLUMN
        }
    }

    /// Filters with validated, quoted field names.
    fn quoted_filters(&self, filters: &[FilterParam]) -> Result<Vec<FilterParam>> {
        filters
            .iter()
            .map(|f| {
                if !self.schema.is_queryable(&f.field) {
                    return Err(AppError::from(Error::InvalidQueryParameter(f.field.clone())));
                }
                Ok(FilterParam::new(
                    quote_identifier(&f.field),
                    f.operand,
                    f.values.clone(),
                ))
            })
            .collect()
    }

    /// Full SELECT statement for `query` against `target`, with the values
    /// to bind.
    pub(crate) fn select_sql(
        &self,
        query: &ResourceQuery,
        target: &str,
    ) -> Result<(String, CompiledQuery)> {
        let compiled = compile_where(&self.quoted_filters(&query.filters)?);

        let sorting = get_sorting(&query.sort, target);
        if let Some(unknown) = sorting.keys.iter().find(|k| !self.schema.is_queryable(&k.key)) {
            return Err(AppError::from(Error::UnknownSortParameter(unknown.key.clone())));
        }

        let mut sql_text = format!(
            "SELECT * FROM {} WHERE {}",
            quote_identifier(target),
            compiled.where_clause
        );
        if let Some(order_by) = sorting.order_by_clause() {
            sql_text.push(' ');
            sql_text.push_str(&order_by);
        }
        if let Some(page) = query.page {
            sql_text.push(' ');
            sql_text.push_str(&page.limit_clause());
        }
        Ok((sql_text, compiled))
    }
}
