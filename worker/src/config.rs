//! Configuration management for the worker.

use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Worker configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Full MySQL URL; overrides the individual `DB_*` settings when set
    pub database_url: Option<String>,
    pub db_host: String,
    pub db_port: u16,
    pub db_user: String,
    pub db_password: String,
    /// Default schema; tables are always addressed as `db.table` anyway
    pub db_name: Option<String>,
    /// Pool size
    pub connections_limit: u32,
    /// How long to wait for a pooled connection
    pub acquire_timeout: Duration,
    /// Resource schema document; the embedded customer schema when unset
    pub schema_path: Option<PathBuf>,
    /// Apply `migrations/` at startup
    pub run_migrations: bool,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_vars<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let db_port = match var("DB_PORT") {
            Some(v) => v.trim().parse().map_err(|_| ConfigError::InvalidPort)?,
            None => 3306,
        };

        let connections_limit = match var("DB_CONNECTIONS_LIMIT") {
            Some(v) => match v.trim().parse::<u32>() {
                Ok(n) if n > 0 => n,
                _ => return Err(ConfigError::InvalidConnectionsLimit),
            },
            None => 2,
        };

        let acquire_timeout = match var("DB_ACQUIRE_TIMEOUT_SECS") {
            Some(v) => Duration::from_secs(
                v.trim()
                    .parse()
                    .map_err(|_| ConfigError::InvalidAcquireTimeout)?,
            ),
            None => Duration::from_secs(10),
        };

        let run_migrations = match var("RUN_MIGRATIONS").as_deref().map(str::trim) {
            None | Some("0") | Some("false") | Some("no") => false,
            Some("1") | Some("true") | Some("yes") => true,
            Some(_) => return Err(ConfigError::InvalidFlag("RUN_MIGRATIONS")),
        };

        let database_url = var("DATABASE_URL");
        let db_host = var("DB_HOST").unwrap_or_else(|| "localhost".to_string());
        if database_url.is_none() && var("DB_USER").is_none() {
            return Err(ConfigError::MissingCredentials);
        }

        Ok(Self {
            database_url,
            db_host,
            db_port,
            db_user: var("DB_USER").unwrap_or_default(),
            db_password: lookup("DB_PASSWORD").unwrap_or_default(),
            db_name: var("DB_NAME"),
            connections_limit,
            acquire_timeout,
            schema_path: var("SCHEMA_PATH").map(PathBuf::from),
            run_migrations,
        })
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("either DATABASE_URL or DB_USER must be set")]
    MissingCredentials,

    #[error("Invalid DB_PORT value")]
    InvalidPort,

    #[error("DB_CONNECTIONS_LIMIT must be a positive number")]
    InvalidConnectionsLimit,

    #[error("DB_ACQUIRE_TIMEOUT_SECS must be a number of seconds")]
    InvalidAcquireTimeout,

    #[error("{0} must be a boolean")]
    InvalidFlag(&'static str),
}

/// A table whose rows hang off a mirrored source id and go when it goes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependentTable {
    pub table: String,
    /// Column matched against the source id
    pub key_column: String,
    /// Column matched against the source table name, when the table has one
    #[serde(default)]
    pub source_table_column: Option<String>,
}

impl DependentTable {
    pub fn new(table: &str, key_column: &str, source_table_column: Option<&str>) -> Self {
        Self {
            table: table.to_string(),
            key_column: key_column.to_string(),
            source_table_column: source_table_column.map(str::to_string),
        }
    }
}

/// Tables and keys for the customer → accounts mirror.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    pub source_table: String,
    pub mirror_table: String,
    pub cluster_table: String,
    /// `source_table` value of the clusters the source `pod` refers to
    pub cluster_source_table: String,
    pub roles_table: String,
    pub cluster_role_key: String,
    pub association_table: String,
    pub dictionaries_table: String,
    pub account_type: String,
    pub account_type_title: String,
    pub dependent_tables: Vec<DependentTable>,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            source_table: "impdb.customer".into(),
            mirror_table: "rcsredb.accounts".into(),
            cluster_table: "rcsredb.clusters".into(),
            cluster_source_table: "rccmrdb.pod".into(),
            roles_table: "rcsredb.roles".into(),
            cluster_role_key: "ACCOUNT_RELATES_TO_CLUSTER".into(),
            association_table: "rcsredb.accounts_has_clusters".into(),
            dictionaries_table: "rcsredb.dictionaries".into(),
            account_type: "account_type".into(),
            account_type_title: "customer".into(),
            dependent_tables: vec![
                DependentTable::new("rcsredb.accounts_has_roles", "resource_id", None),
                DependentTable::new(
                    "rcsredb.accounts_has_clusters",
                    "source_id",
                    Some("source_table"),
                ),
                DependentTable::new("rcsredb.accounts_has_memberships", "resource_id", None),
            ],
        }
    }
}

/// Main (read) and action (write) tables of a resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tables {
    pub main_table: String,
    #[serde(default)]
    pub action_table: Option<String>,
}

impl Tables {
    pub fn new(main_table: impl Into<String>) -> Self {
        Self {
            main_table: main_table.into(),
            action_table: None,
        }
    }

    pub fn with_action_table(mut self, action_table: impl Into<String>) -> Self {
        self.action_table = Some(action_table.into());
        self
    }

    /// Write target; the main table unless an action table is configured.
    pub fn action_table(&self) -> &str {
        self.action_table.as_deref().unwrap_or(&self.main_table)
    }
}

/// Column names of a relationship reference table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceColumns {
    pub context_id: String,
    pub resource_id: String,
    pub role_id: String,
}

impl Default for ReferenceColumns {
    fn default() -> Self {
        Self {
            context_id: "context_id".into(),
            resource_id: "resource_id".into(),
            role_id: "role_id".into(),
        }
    }
}

/// One configured one-to-many relationship of a resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipSettings {
    pub name: String,
    /// Resource type of the related items
    pub resource_type: String,
    pub reference_table: String,
    /// Restrict to references carrying the role with this key
    #[serde(default)]
    pub role_key: Option<String>,
    #[serde(default)]
    pub roles_table: Option<String>,
    #[serde(default)]
    pub columns: ReferenceColumns,
}

/// Per-resource settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceSettings {
    pub name: String,
    pub tables: Tables,
    #[serde(default)]
    pub add_one_to_many_relationships_to_response: bool,
    #[serde(default)]
    pub relationships: Vec<RelationshipSettings>,
}

impl ResourceSettings {
    /// Settings for `name` in `all`, matched by exact name.
    pub fn find<'a>(all: &'a [ResourceSettings], name: &str) -> Option<&'a ResourceSettings> {
        all.iter().find(|r| r.name == name)
    }

    /// Settings of the `customers` resource.
    pub fn customers(sync: &SyncSettings) -> Self {
        Self {
            name: "customers".into(),
            tables: Tables::new(sync.source_table.clone()),
            add_one_to_many_relationships_to_response: true,
            relationships: vec![RelationshipSettings {
                name: "clusters".into(),
                resource_type: "clusters".into(),
                reference_table: sync.association_table.clone(),
                role_key: Some(sync.cluster_role_key.clone()),
                roles_table: Some(sync.roles_table.clone()),
                // associations are keyed by the customer id, not the account id
                columns: ReferenceColumns {
                    resource_id: "source_id".into(),
                    ..ReferenceColumns::default()
                },
            }],
        }
    }
}
