//! Mirror sync engine.
//!
//! Each event is handled inside one transaction: look up the current mirror
//! row, classify it against the source row, then apply the planned
//! transition together with its association bookkeeping.

use crate::config::SyncSettings;
use crate::db::accounts::{self, ClusterLink};
use crate::db::{Pool, TransactionCoordinator, TransactionStep};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use dashmap::DashMap;
use rowmirror_engine::mirror::source_id;
use rowmirror_engine::{
    classify, plan, AccountProjection, ChangeAction, ChangeEvent, ResourceSchema, Row,
    Transition,
};
use serde::Serialize;
use sqlx::MySqlConnection;
use std::sync::Arc;

/// Result of applying one event.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncOutcome {
    pub transition: Transition,
    /// `false` when a delete found nothing to delete
    pub status: bool,
    /// Mirror row after the write, or before it for deletes
    pub data: Option<Row>,
}

impl SyncOutcome {
    fn new(transition: Transition, data: Option<Row>) -> Self {
        Self {
            transition,
            status: transition != Transition::DeleteMissing,
            data,
        }
    }
}

/// Applies change events to the mirror table.
#[derive(Clone)]
pub struct SyncEngine {
    coordinator: TransactionCoordinator,
    schema: Arc<ResourceSchema>,
    settings: Arc<SyncSettings>,
    /// Dictionary ids by `type/title`, resolved once per process
    account_types: Arc<DashMap<String, i64>>,
}

impl SyncEngine {
    pub fn new(pool: Pool, schema: Arc<ResourceSchema>, settings: SyncSettings) -> Self {
        Self {
            coordinator: TransactionCoordinator::new(pool),
            schema,
            settings: Arc::new(settings),
            account_types: Arc::new(DashMap::new()),
        }
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    /// Apply `event` in its own transaction.
    ///
    /// Returns `Ok(None)` when the event carried no usable row data.
    pub async fn execute(&self, event: &ChangeEvent) -> Result<Option<SyncOutcome>> {
        let mut step = SyncStep {
            engine: self,
            event,
            outcome: None,
        };
        let mut steps: [&mut dyn TransactionStep; 1] = [&mut step];
        self.coordinator.run(&mut steps).await?;
        Ok(step.outcome)
    }

    /// Apply `event` on `conn`, which the caller holds a transaction on.
    pub async fn sync(
        &self,
        event: &ChangeEvent,
        conn: &mut MySqlConnection,
    ) -> Result<Option<SyncOutcome>> {
        let source = match event.payload() {
            Ok(Some(row)) => row,
            Ok(None) => {
                tracing::warn!(action = %event.action, "Event carries no row data, skipping");
                return Ok(None);
            }
            Err(err) => {
                tracing::warn!(action = %event.action, error = %err, "Undecodable row data, skipping");
                return Ok(None);
            }
        };

        let Some(source_id) = source_id(&source) else {
            tracing::warn!(action = %event.action, "Source row has no id");
            return without_source_id(event.action).map(Some);
        };

        tracing::info!(action = %event.action, source_id = %source_id, "New event");

        let mirror = accounts::find_by_source(conn, &self.settings, &source_id).await?;
        let state = classify(&source, mirror.as_ref(), &self.schema, &self.settings.mirror_table);
        let transition = plan(event.action, state);

        tracing::debug!(source_id = %source_id, ?state, ?transition, "Planned mirror transition");

        let outcome = match (transition, mirror) {
            (Transition::InsertMirror, _) => {
                let row = self.insert(&source, &source_id, conn).await?;
                SyncOutcome::new(transition, Some(row))
            }
            (Transition::UpdateMirror, Some(mirror)) => {
                let row = self.update(&source, &source_id, &mirror, conn).await?;
                SyncOutcome::new(transition, Some(row))
            }
            (Transition::DeleteMirror, Some(mirror)) => {
                self.delete(&source_id, &mirror, conn).await?;
                SyncOutcome::new(transition, Some(mirror))
            }
            (Transition::DeleteMissing, _) => {
                tracing::info!(source_id = %source_id, "Nothing to delete");
                SyncOutcome::new(transition, None)
            }
            (Transition::Noop, _) => {
                tracing::debug!(source_id = %source_id, "Mirror already up to date");
                SyncOutcome::new(transition, None)
            }
            // update and delete are only planned for an existing mirror row
            (Transition::UpdateMirror | Transition::DeleteMirror, None) => {
                return Err(AppError::ResourceNotFound)
            }
        };

        Ok(Some(outcome))
    }

    async fn insert(
        &self,
        source: &Row,
        source_id: &str,
        conn: &mut MySqlConnection,
    ) -> Result<Row> {
        let projection = AccountProjection::from_source(source)?;
        let account_type_id = self.account_type_id(conn).await?;

        let account_id =
            accounts::insert_account(conn, &self.settings, &projection, account_type_id).await?;
        tracing::info!(source_id, account_id, "Inserted mirror row");

        let link = accounts::find_cluster_link(conn, &self.settings, source_id).await?;
        self.associate(conn, account_id, source_id, link).await?;

        accounts::find_by_id(conn, &self.settings, account_id)
            .await?
            .ok_or(AppError::ResourceNotFound)
    }

    async fn update(
        &self,
        source: &Row,
        source_id: &str,
        mirror: &Row,
        conn: &mut MySqlConnection,
    ) -> Result<Row> {
        let account_id = mirror_id(mirror)?;

        let link = accounts::find_cluster_link(conn, &self.settings, source_id).await?;
        self.associate(conn, account_id, source_id, link).await?;

        let projection = AccountProjection::from_source(source)?;
        let account_type_id = self.account_type_id(conn).await?;
        accounts::update_account(conn, &self.settings, account_id, &projection, account_type_id)
            .await?;
        tracing::info!(source_id, account_id, "Updated mirror row");

        accounts::find_by_source(conn, &self.settings, source_id)
            .await?
            .ok_or(AppError::ResourceNotFound)
    }

    async fn delete(&self, source_id: &str, mirror: &Row, conn: &mut MySqlConnection) -> Result<()> {
        let account_id = mirror_id(mirror)?;

        let dependents = accounts::delete_dependents(conn, &self.settings, source_id).await?;
        let deleted = accounts::delete_account(conn, &self.settings, account_id).await?;
        if deleted == 0 {
            return Err(AppError::ResourceNotFound);
        }

        tracing::info!(source_id, account_id, dependents, "Deleted mirror row");
        Ok(())
    }

    async fn associate(
        &self,
        conn: &mut MySqlConnection,
        account_id: u64,
        source_id: &str,
        link: ClusterLink,
    ) -> Result<()> {
        match link.resolved() {
            Some((cluster_id, role_id)) => {
                accounts::upsert_cluster_association(
                    conn,
                    &self.settings,
                    account_id,
                    source_id,
                    cluster_id,
                    role_id,
                )
                .await
            }
            None => {
                tracing::debug!(source_id, ?link, "No cluster or role, skipping association");
                Ok(())
            }
        }
    }

    /// Account type id, looked up once and cached.
    async fn account_type_id(&self, conn: &mut MySqlConnection) -> Result<i64> {
        let key = format!(
            "{}/{}",
            self.settings.account_type, self.settings.account_type_title
        );
        if let Some(id) = self.account_types.get(&key) {
            return Ok(*id);
        }

        let id = accounts::account_type_id(conn, &self.settings)
            .await?
            .ok_or(AppError::UndefinedAccountType)?;
        self.account_types.insert(key, id);
        Ok(id)
    }
}

/// Outcome of an event whose row has no id. A delete has nothing to find
/// and reports a failed status; inserts and updates cannot proceed.
fn without_source_id(action: ChangeAction) -> Result<SyncOutcome> {
    match action {
        ChangeAction::Delete => Ok(SyncOutcome::new(Transition::DeleteMissing, None)),
        ChangeAction::Insert | ChangeAction::Update => Err(AppError::MissingSourceId),
    }
}

/// Id column of a mirror row.
fn mirror_id(mirror: &Row) -> Result<u64> {
    mirror
        .get("id")
        .and_then(|v| v.as_u64().or_else(|| v.as_str()?.parse().ok()))
        .ok_or(AppError::ResourceNotFound)
}

struct SyncStep<'a> {
    engine: &'a SyncEngine,
    event: &'a ChangeEvent,
    outcome: Option<SyncOutcome>,
}

#[async_trait]
impl<'a> TransactionStep for SyncStep<'a> {
    async fn run(&mut self, conn: &mut MySqlConnection) -> Result<()> {
        self.outcome = self.engine.sync(self.event, conn).await?;
        Ok(())
    }
}
