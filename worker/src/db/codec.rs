//! Conversion between MySQL rows and JSON rows.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rowmirror_engine::Row;
use serde_json::Value;
use sqlx::mysql::{MySqlArguments, MySqlRow};
use sqlx::query::Query;
use sqlx::{Column, MySql, Row as _, TypeInfo, ValueRef};

const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Decode a row into a JSON object keyed by column name, in column order.
///
/// Integers (including `TINYINT(1)`/`BOOLEAN`) decode as numbers, temporal
/// columns as `YYYY-MM-DD HH:MM:SS` text, `JSON` columns as JSON, and
/// everything else as text.
pub fn row_to_json(row: &MySqlRow) -> Result<Row, sqlx::Error> {
    let mut out = Row::new();
    for column in row.columns() {
        let index = column.ordinal();
        let value = decode_column(row, index, column.type_info().name())?;
        out.insert(column.name().to_string(), value);
    }
    Ok(out)
}

/// Decode every row of a result set.
pub fn rows_to_json(rows: &[MySqlRow]) -> Result<Vec<Row>, sqlx::Error> {
    rows.iter().map(row_to_json).collect()
}

fn decode_column(row: &MySqlRow, index: usize, type_name: &str) -> Result<Value, sqlx::Error> {
    if row.try_get_raw(index)?.is_null() {
        return Ok(Value::Null);
    }

    let value = match type_name {
        "BOOLEAN" | "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" | "YEAR" => {
            Value::from(row.try_get_unchecked::<i64, _>(index)?)
        }
        "TINYINT UNSIGNED" | "SMALLINT UNSIGNED" | "MEDIUMINT UNSIGNED" | "INT UNSIGNED"
        | "BIGINT UNSIGNED" => Value::from(row.try_get_unchecked::<u64, _>(index)?),
        "FLOAT" => Value::from(f64::from(row.try_get_unchecked::<f32, _>(index)?)),
        "DOUBLE" => Value::from(row.try_get_unchecked::<f64, _>(index)?),
        "DATETIME" | "TIMESTAMP" => Value::String(
            row.try_get_unchecked::<NaiveDateTime, _>(index)?
                .format(DATETIME_FORMAT)
                .to_string(),
        ),
        "DATE" => Value::String(row.try_get_unchecked::<NaiveDate, _>(index)?.to_string()),
        "TIME" => Value::String(row.try_get_unchecked::<NaiveTime, _>(index)?.to_string()),
        "JSON" => row.try_get_unchecked::<Value, _>(index)?,
        "BLOB" | "TINYBLOB" | "MEDIUMBLOB" | "LONGBLOB" | "BINARY" | "VARBINARY" | "BIT" => {
            let bytes = row.try_get_unchecked::<Vec<u8>, _>(index)?;
            Value::String(String::from_utf8_lossy(&bytes).into_owned())
        }
        // DECIMAL, CHAR, VARCHAR, TEXT, ENUM, SET
        _ => Value::String(row.try_get_unchecked::<String, _>(index)?),
    };

    Ok(value)
}

/// Bind a JSON value as a query parameter.
pub fn bind_value<'q>(
    query: Query<'q, MySql, MySqlArguments>,
    value: &Value,
) -> Query<'q, MySql, MySqlArguments> {
    match value {
        Value::Null => query.bind(None::<String>),
        Value::Bool(b) => query.bind(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                query.bind(i)
            } else if let Some(u) = n.as_u64() {
                query.bind(u)
            } else {
                query.bind(n.as_f64())
            }
        }
        Value::String(s) => query.bind(s.clone()),
        other => query.bind(other.to_string()),
    }
}

/// Bind text values in order.
pub fn bind_all<'q>(
    mut query: Query<'q, MySql, MySqlArguments>,
    values: &[String],
) -> Query<'q, MySql, MySqlArguments> {
    for value in values {
        query = query.bind(value.clone());
    }
    query
}
