//! Database module for MySQL persistence.

pub mod accounts;
mod codec;
mod connection;
mod pool;
mod transaction;

pub use codec::*;
pub use connection::*;
pub use pool::*;
pub use transaction::*;
