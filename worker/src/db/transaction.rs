//! Transaction coordinator.
//!
//! Runs an ordered list of steps on one connection: `BEGIN`, every step in
//! order, `COMMIT`. The first failing step rolls the whole transaction back
//! and the caller gets a [`AppError::Transaction`] carrying the cause.

use super::Pool;
use crate::error::{AppError, Result};
use async_trait::async_trait;
use sqlx::MySqlConnection;

/// One unit of work inside a transaction.
#[async_trait]
pub trait TransactionStep: Send {
    async fn run(&mut self, conn: &mut MySqlConnection) -> Result<()>;
}

/// Runs steps atomically on a pooled connection.
#[derive(Clone)]
pub struct TransactionCoordinator {
    pool: Pool,
}

impl TransactionCoordinator {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Run `steps` in order inside one transaction.
    ///
    /// No nesting: steps must not open transactions of their own.
    pub async fn run(&self, steps: &mut [&mut dyn TransactionStep]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        for (index, step) in steps.iter_mut().enumerate() {
            if let Err(err) = step.run(&mut tx).await {
                tracing::error!(step = index, error = ?err, "Transaction step failed, rolling back");
                if let Err(rollback) = tx.rollback().await {
                    tracing::error!(error = ?rollback, "Rollback failed");
                }
                return Err(AppError::Transaction(Box::new(err)));
            }
        }

        tx.commit()
            .await
            .map_err(|e| AppError::Transaction(Box::new(e.into())))?;

        Ok(())
    }
}
