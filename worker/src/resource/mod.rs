//! Generic schema-driven resources: data access, relationships and output
//! formatting.

mod accessor;
mod formatter;
mod relationships;

pub use accessor::ResourceAccessor;
pub use formatter::ResourceFormatter;
pub use relationships::{NoRelationships, RelationshipResolver, SqlRelationshipResolver};
