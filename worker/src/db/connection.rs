//! Caller-supplied or pooled connections.

use super::Pool;
use sqlx::pool::PoolConnection;
use sqlx::{MySql, MySqlConnection};
use std::ops::{Deref, DerefMut};

/// A connection borrowed from the caller (usually inside a transaction) or
/// checked out of the pool for the duration of one call.
pub enum Conn<'c> {
    Borrowed(&'c mut MySqlConnection),
    Pooled(PoolConnection<MySql>),
}

impl Deref for Conn<'_> {
    type Target = MySqlConnection;

    fn deref(&self) -> &Self::Target {
        match self {
            Conn::Borrowed(conn) => conn,
            Conn::Pooled(conn) => conn,
        }
    }
}

impl DerefMut for Conn<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        match self {
            Conn::Borrowed(conn) => conn,
            Conn::Pooled(conn) => conn,
        }
    }
}

/// Use `conn` when given, otherwise acquire one from `pool`.
///
/// A pooled connection goes back to the pool when the returned value drops.
pub async fn acquire<'c>(
    pool: &Pool,
    conn: Option<&'c mut MySqlConnection>,
) -> Result<Conn<'c>, sqlx::Error> {
    match conn {
        Some(conn) => Ok(Conn::Borrowed(conn)),
        None => Ok(Conn::Pooled(pool.acquire().await?)),
    }
}
