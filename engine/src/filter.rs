//! Query filter compiler.
//!
//! Turns the JSON:API query-string surface into parameterized SQL fragments:
//!
//! - `filter[<field>]=v` and `filter[<field>][<operand>]=v1,v2` become
//!   [`FilterParam`]s and then a [`CompiledQuery`] WHERE clause
//! - `sort=-fieldA,fieldB` becomes a [`Sorting`]
//! - `page[number]` / `page[size]` become a [`Page`]
//!
//! Field names are emitted verbatim into the WHERE clause, so callers must
//! check them against the resource schema before executing the SQL.

use crate::{error::Result, Error};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

static FILTER_KEY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^filter\[(.+?)\](\[(.+?)\])?$").expect("filter key pattern is valid")
});

/// Comparison operand of a filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operand {
    Eq,
    Gt,
    Gte,
    In,
    Like,
    Lt,
    Lte,
    Ne,
    Nin,
}

impl Operand {
    /// All recognized operands.
    pub const ALL: [Operand; 9] = [
        Operand::Eq,
        Operand::Gt,
        Operand::Gte,
        Operand::In,
        Operand::Like,
        Operand::Lt,
        Operand::Lte,
        Operand::Ne,
        Operand::Nin,
    ];

    /// Query-string spelling of the operand.
    pub fn as_str(&self) -> &'static str {
        match self {
            Operand::Eq => "eq",
            Operand::Gt => "gt",
            Operand::Gte => "gte",
            Operand::In => "in",
            Operand::Like => "like",
            Operand::Lt => "lt",
            Operand::Lte => "lte",
            Operand::Ne => "ne",
            Operand::Nin => "nin",
        }
    }

    /// SQL operator text including placeholders for `count` values.
    pub fn sql(&self, count: usize) -> String {
        match self {
            Operand::Eq => "=?".to_string(),
            Operand::Gt => ">?".to_string(),
            Operand::Gte => ">=?".to_string(),
            Operand::Lt => "<?".to_string(),
            Operand::Lte => "<=?".to_string(),
            Operand::Ne => "<>?".to_string(),
            Operand::Like => "LIKE ?".to_string(),
            Operand::In => format!("IN ({})", placeholders(count)),
            Operand::Nin => format!("NOT IN ({})", placeholders(count)),
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operand {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Operand::ALL
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| Error::InvalidQueryOperand(s.to_string()))
    }
}

/// Comma-separated `?` placeholders.
pub fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

/// One parsed filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterParam {
    pub field: String,
    pub operand: Operand,
    pub values: Vec<String>,
}

impl FilterParam {
    /// Create a filter.
    pub fn new(field: impl Into<String>, operand: Operand, values: Vec<String>) -> Self {
        Self {
            field: field.into(),
            operand,
            values,
        }
    }

    /// Single-value equality filter.
    pub fn eq(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(field, Operand::Eq, vec![value.into()])
    }
}

/// A WHERE clause with its positional values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompiledQuery {
    pub where_clause: String,
    pub values: Vec<String>,
}

/// Parse `filter[...]` keys into filters.
///
/// Each entry is a raw key with every value supplied for it. A single value
/// keeps the requested operand; several values turn `eq` into `in` and any
/// other operand into `nin`.
pub fn parse_params(params: &[(String, Vec<String>)]) -> Result<Vec<FilterParam>> {
    let mut filters = Vec::with_capacity(params.len());

    for (key, values) in params {
        let (field, requested) = parse_filter_key(key)?;
        if values.is_empty() {
            return Err(Error::InvalidQueryParameter(key.clone()));
        }

        let operand = match (values.len(), requested) {
            (1, op) => op,
            (_, Operand::Eq) => Operand::In,
            _ => Operand::Nin,
        };

        filters.push(FilterParam::new(field, operand, values.clone()));
    }

    Ok(filters)
}

fn parse_filter_key(key: &str) -> Result<(String, Operand)> {
    let captures = FILTER_KEY
        .captures(key)
        .ok_or_else(|| Error::InvalidQueryParameter(key.to_string()))?;

    let field = captures[1].to_string();
    let operand = match captures.get(3) {
        Some(op) => op.as_str().parse()?,
        None => Operand::Eq,
    };

    Ok((field, operand))
}

/// Compile filters into a WHERE clause.
///
/// No filters compile to the match-all clause `1`.
pub fn compile_where(filters: &[FilterParam]) -> CompiledQuery {
    if filters.is_empty() {
        return CompiledQuery {
            where_clause: "1".to_string(),
            values: Vec::new(),
        };
    }

    let conditions: Vec<String> = filters
        .iter()
        .map(|f| format!("{} {}", f.field, f.operand.sql(f.values.len())))
        .collect();

    let values = filters
        .iter()
        .flat_map(|f| f.values.iter().cloned())
        .collect();

    CompiledQuery {
        where_clause: conditions.join(" AND "),
        values,
    }
}

/// Backtick-quote a dotted identifier: `db.table` → `` `db`.`table` ``.
pub fn quote_identifier(name: &str) -> String {
    name.split('.')
        .map(|part| format!("`{}`", part.replace('`', "``")))
        .collect::<Vec<_>>()
        .join(".")
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortDirection::Asc => f.write_str("ASC"),
            SortDirection::Desc => f.write_str("DESC"),
        }
    }
}

/// One sort key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKey {
    /// Key as requested, without the direction marker
    pub key: String,
    /// Quoted column qualified with the main table
    pub column: String,
    pub direction: SortDirection,
}

/// Ordered sort specification.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sorting {
    pub keys: Vec<SortKey>,
}

impl Sorting {
    /// Whether no sort keys were requested.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// `ORDER BY ...` clause, or `None` when unsorted.
    pub fn order_by_clause(&self) -> Option<String> {
        if self.keys.is_empty() {
            return None;
        }
        let parts: Vec<String> = self
            .keys
            .iter()
            .map(|k| format!("{} {}", k.column, k.direction))
            .collect();
        Some(format!("ORDER BY {}", parts.join(", ")))
    }
}

/// Build a sort specification from `sort` tokens.
///
/// Tokens may themselves be comma-separated. A leading `-` sorts descending.
pub fn get_sorting(tokens: &[String], main_table: &str) -> Sorting {
    let keys = tokens
        .iter()
        .flat_map(|t| t.split(','))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .filter_map(|token| {
            let (key, direction) = match token.strip_prefix('-') {
                Some(rest) => (rest, SortDirection::Desc),
                None => (token, SortDirection::Asc),
            };
            if key.is_empty() {
                return None;
            }
            Some(SortKey {
                key: key.to_string(),
                column: quote_identifier(&format!("{}.{}", main_table, key)),
                direction,
            })
        })
        .collect();

    Sorting { keys }
}

/// Zero-based page selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub number: u64,
    pub size: u64,
}

impl Page {
    /// Parse `page[number]` and `page[size]`. Returns `None` when neither is given.
    pub fn parse(number: Option<&str>, size: Option<&str>, default_size: u64) -> Result<Option<Self>> {
        if number.is_none() && size.is_none() {
            return Ok(None);
        }

        let number = match number {
            Some(n) => n.trim().parse().map_err(|_| Error::InvalidPageNumber)?,
            None => 0,
        };
        let size = match size {
            Some(s) => s.trim().parse().map_err(|_| Error::InvalidPageSize)?,
            None => default_size,
        };

        Ok(Some(Self { number, size }))
    }

    /// Row offset of the first row on this page.
    pub fn offset(&self) -> u64 {
        self.size.saturating_mul(self.number)
    }

    /// `LIMIT offset, size` clause.
    pub fn limit_clause(&self) -> String {
        format!("LIMIT {}, {}", self.offset(), self.size)
    }
}

/// Default page size when only `page[number]` is supplied.
pub const DEFAULT_PAGE_SIZE: u64 = 1000;

/// Everything a resource listing request can ask for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceQuery {
    pub filters: Vec<FilterParam>,
    pub sort: Vec<String>,
    pub page: Option<Page>,
}

impl ResourceQuery {
    /// Parse a raw, URL-encoded query string.
    pub fn parse(query: &str) -> Result<Self> {
        let query = query.strip_prefix('?').unwrap_or(query);
        Self::from_pairs(url::form_urlencoded::parse(query.as_bytes()))
    }

    /// Build from decoded key/value pairs. Repeated keys accumulate values and
    /// each value is split on commas.
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut grouped: Vec<(String, Vec<String>)> = Vec::new();
        for (key, value) in pairs {
            let key = key.as_ref();
            let values = value.as_ref().split(',').map(str::to_string);
            match grouped.iter_mut().find(|(k, _)| k == key) {
                Some((_, existing)) => existing.extend(values),
                None => grouped.push((key.to_string(), values.collect())),
            }
        }

        let mut sort = Vec::new();
        let mut page_number = None;
        let mut page_size = None;
        let mut filter_params = Vec::new();

        for (key, values) in grouped {
            match key.as_str() {
                "sort" => sort.extend(values),
                "page[number]" => page_number = Some(values.join(",")),
                "page[size]" => page_size = Some(values.join(",")),
                _ => filter_params.push((key, values)),
            }
        }

        Ok(Self {
            filters: parse_params(&filter_params)?,
            sort,
            page: Page::parse(
                page_number.as_deref(),
                page_size.as_deref(),
                DEFAULT_PAGE_SIZE,
            )?,
        })
    }
}
