//! rowmirror worker - MySQL host for the rowmirror engine.
//!
//! Consumes row change events for `impdb.customer` and keeps the derived
//! `rcsredb.accounts` rows (plus their cluster associations) in step, one
//! transaction per event. Also hosts the generic resource accessor and
//! formatter used to read and write any schema-described table.

pub mod config;
pub mod db;
pub mod error;
pub mod handler;
pub mod resource;
pub mod sync;

pub use config::{Config, ConfigError, ResourceSettings, SyncSettings};
pub use error::{AppError, Result};
pub use handler::{handle_event, Response};
pub use sync::{SyncEngine, SyncOutcome};
