//! Database connection pool management.

use crate::config::Config;
use sqlx::mysql::{MySqlConnectOptions, MySqlPoolOptions};
use sqlx::MySqlPool;

/// Type alias for the database pool.
pub type Pool = MySqlPool;

/// Connect options for `config`; `DATABASE_URL` wins over the `DB_*` parts.
pub fn connect_options(config: &Config) -> Result<MySqlConnectOptions, sqlx::Error> {
    if let Some(url) = &config.database_url {
        return url.parse();
    }

    let mut options = MySqlConnectOptions::new()
        .host(&config.db_host)
        .port(config.db_port)
        .username(&config.db_user)
        .password(&config.db_password);
    if let Some(name) = &config.db_name {
        options = options.database(name);
    }
    Ok(options)
}

/// Create a new database connection pool.
pub async fn create_pool(config: &Config) -> Result<Pool, sqlx::Error> {
    MySqlPoolOptions::new()
        .max_connections(config.connections_limit)
        .acquire_timeout(config.acquire_timeout)
        .connect_with(connect_options(config)?)
        .await
}

/// Run database migrations.
pub async fn run_migrations(pool: &Pool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
