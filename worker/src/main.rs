//! rowmirror worker - mirrors `impdb.customer` change events into
//! `rcsredb.accounts`.
//!
//! `sync` reads one event JSON per stdin line and writes one response
//! envelope per stdout line. `query` lists customers through the generic
//! resource accessor. Logs go to stderr.

use clap::{Parser, Subcommand};
use rowmirror_engine::{ResourceQuery, ResourceSchema};
use rowmirror_worker::config::{Config, ResourceSettings, SyncSettings};
use rowmirror_worker::resource::{ResourceAccessor, ResourceFormatter, SqlRelationshipResolver};
use rowmirror_worker::{db, handle_event, AppError, Response, SyncEngine};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Customer resource schema used when `SCHEMA_PATH` is not set.
const DEFAULT_SCHEMA: &str = include_str!("../schemas/customer.json");

#[derive(Parser)]
#[command(name = "rowmirror-worker")]
#[command(about = "Mirrors customer change events into the accounts schema")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply change events read from stdin, one JSON object per line
    Sync,

    /// List customers matching a query string
    Query {
        /// e.g. `filter[name][like]=A%25&sort=-id&page[size]=10`
        #[arg(default_value = "")]
        query: String,

        /// Resolve relationships for every resource
        #[arg(short, long)]
        relationships: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rowmirror_worker=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;
    let schema = Arc::new(load_schema(&config)?);

    tracing::info!(
        host = %config.db_host,
        port = config.db_port,
        connections = config.connections_limit,
        "Starting rowmirror worker"
    );

    // Create database pool
    let pool = db::create_pool(&config).await?;

    if config.run_migrations {
        tracing::info!("Running database migrations...");
        db::run_migrations(&pool).await?;
    }

    let settings = SyncSettings::default();

    match cli.command {
        Commands::Sync => {
            let engine = SyncEngine::new(pool, schema, settings);
            run_sync(&engine).await?;
        }
        Commands::Query {
            query,
            relationships,
        } => {
            let customers = ResourceSettings::customers(&settings);
            let accessor = ResourceAccessor::new(pool.clone(), schema.clone(), customers.tables.clone());
            let resolver = Arc::new(SqlRelationshipResolver::new(pool, schema.clone()));
            let formatter = ResourceFormatter::new(schema, resolver, vec![customers.clone()]);

            let query = ResourceQuery::parse(&query).map_err(AppError::from)?;
            let rows = accessor.fetch_by_filter(&query, None, None).await?;
            let data = formatter
                .format_many(&rows, &customers.name, relationships)
                .await?;

            println!("{}", serde_json::json!({ "data": data }));
        }
    }

    Ok(())
}

fn load_schema(config: &Config) -> Result<ResourceSchema, AppError> {
    let text = match &config.schema_path {
        Some(path) => {
            tracing::info!(path = %path.display(), "Loading resource schema");
            std::fs::read_to_string(path)?
        }
        None => DEFAULT_SCHEMA.to_string(),
    };
    Ok(ResourceSchema::from_json(&text)?)
}

async fn run_sync(engine: &SyncEngine) -> Result<(), Box<dyn std::error::Error>> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let response = match serde_json::from_str(&line) {
            Ok(params) => handle_event(engine, &params).await,
            Err(e) => {
                let err = AppError::from(rowmirror_engine::Error::InvalidEvent(e.to_string()));
                tracing::warn!(error = %err, "Unreadable event line");
                Response::error(&err)
            }
        };

        println!("{}", serde_json::to_string(&response)?);
    }

    tracing::info!("Input closed, shutting down");
    Ok(())
}
