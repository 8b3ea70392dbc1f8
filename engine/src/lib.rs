//! # rowmirror engine
//!
//! Pure logic behind the rowmirror worker: query compilation, resource
//! formatting and mirror planning.
//!
//! ## Design Principles
//!
//! - **No IO**: the engine never touches a database, file or socket
//! - **Deterministic**: same inputs always produce the same SQL and plans
//! - **Testable**: everything here is exercised without a database
//!
//! ## Core Concepts
//!
//! ### Schemas
//!
//! A [`ResourceSchema`] is the immutable descriptor of a resource: its
//! attributes, primary key, per-table column aliases and which properties the
//! mirror comparison ignores.
//!
//! ### Filters
//!
//! The [`filter`] module parses `filter[...]`, `sort` and `page[...]` query
//! parameters and compiles them into a [`CompiledQuery`] with `?` placeholders.
//!
//! ### Resources
//!
//! The [`format`] module turns rows into JSON:API-style [`Resource`]s with
//! string-or-null attributes.
//!
//! ### Mirror planning
//!
//! The [`mirror`] module classifies a [`ChangeEvent`] against the current mirror
//! row ([`MirrorState`]) and picks the [`Transition`] to apply.
//!
//! ## Quick Start
//!
//! ```rust
//! use rowmirror_engine::{compile_where, parse_params, FilterParam, Operand};
//!
//! let filters = parse_params(&[
//!     ("filter[name][like]".to_string(), vec!["foo%".to_string()]),
//!     ("filter[id]".to_string(), vec!["1".to_string(), "2".to_string()]),
//! ])
//! .unwrap();
//!
//! assert_eq!(filters[0], FilterParam::new("name", Operand::Like, vec!["foo%".into()]));
//! assert_eq!(filters[1].operand, Operand::In);
//!
//! let query = compile_where(&filters);
//! assert_eq!(query.where_clause, "name LIKE ? AND id IN (?, ?)");
//! assert_eq!(query.values, vec!["foo%", "1", "2"]);
//! ```

pub mod error;
pub mod event;
pub mod filter;
pub mod format;
pub mod mirror;
pub mod schema;

// Re-export main types at crate root
pub use error::Error;
pub use event::{ChangeAction, ChangeEvent};
pub use filter::{
    compile_where, get_sorting, parse_params, quote_identifier, CompiledQuery, FilterParam,
    Operand, Page, ResourceQuery, SortDirection, SortKey, Sorting,
};
pub use format::{format_resource, parse_body, Relationships, Resource};
pub use mirror::{classify, plan, AccountProjection, MirrorState, Transition};
pub use schema::{Property, RelationshipDef, ResourceSchema};

/// A database row: column name to JSON value, in column order.
pub type Row = serde_json::Map<String, serde_json::Value>;
