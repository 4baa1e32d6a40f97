//! Append-only audit trail stored in one table.
//!
//! Each category is a partition. Row keys are monotonic ULIDs, so the table's
//! natural key order is append order.

use std::{collections::BTreeMap, sync::Arc};

use async_lock::Mutex;
use chrono::{DateTime, Utc};
use futures_util::TryStreamExt;
use ulid::{Generator, Ulid};

use crate::{
    client::{Connector, QueryOptions},
    credential::TokenProvider,
    error::TableError,
    executor::Executor,
    filter,
    key::CompositeKey,
    observability::log_debug,
    store::TableStore,
    TableEntity,
};

/// One recorded action.
#[derive(Debug, Clone, Default, PartialEq, TableEntity)]
pub struct AuditEntry {
    /// `"{category}/{ulid}"`, assigned by [`AuditLog::append`].
    pub key: String,
    /// What happened.
    #[entity(rename = "Action")]
    pub action: String,
    /// Who did it.
    #[entity(rename = "Actor")]
    pub actor: Option<String>,
    /// Free-form context, stored as JSON.
    #[entity(rename = "Details")]
    pub details: BTreeMap<String, String>,
    /// Write time assigned by the store.
    pub timestamp: Option<DateTime<Utc>>,
}

impl AuditEntry {
    /// Entry recording `action`.
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            ..Default::default()
        }
    }

    /// Sets the actor.
    pub fn actor(self, actor: impl Into<String>) -> Self {
        Self {
            actor: Some(actor.into()),
            ..self
        }
    }

    /// Adds one detail.
    pub fn detail(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.details.insert(name.into(), value.into());
        self
    }

    /// Partition the entry was appended to; empty before [`AuditLog::append`].
    pub fn category(&self) -> &str {
        self.key.split_once('/').map_or("", |(category, _)| category)
    }
}

/// Append-only log with one partition per category.
pub struct AuditLog<C, P, E> {
    store: Arc<TableStore<C, P, E>>,
    table: String,
    ids: Mutex<Generator>,
}

impl<C, P, E> AuditLog<C, P, E>
where
    C: Connector,
    P: TokenProvider,
    E: Executor,
{
    /// Opens the log in `table`, creating the table when missing.
    pub async fn open(
        store: Arc<TableStore<C, P, E>>,
        table: impl Into<String>,
    ) -> Result<Self, TableError> {
        let table = table.into();
        store.create_table(&table).await?;
        Ok(Self {
            store,
            table,
            ids: Mutex::new(Generator::new()),
        })
    }

    /// Stores `entry` under `category` and returns its key.
    pub async fn append(&self, category: &str, mut entry: AuditEntry) -> Result<String, TableError> {
        let id = self.next_id().await;
        let key = CompositeKey::new(category, id.to_string())?;
        entry.key = key.to_string();
        entry.timestamp = None;
        self.store.upsert_entity(&self.table, &entry).await?;
        log_debug!(
            component = "audit",
            event = "entry_appended",
            table = %self.table,
            category = %category,
            action = %entry.action,
        );
        Ok(entry.key)
    }

    /// Entries of `category` in append order.
    pub async fn entries(&self, category: &str) -> Result<Vec<AuditEntry>, TableError> {
        let options = QueryOptions::default().filter(filter::partition_eq(category));
        self.store
            .list_entities::<AuditEntry>(&self.table, options)
            .await?
            .try_collect()
            .await
    }

    /// Entries recorded under `category`.
    pub async fn count(&self, category: &str) -> Result<usize, TableError> {
        self.store
            .count_items(&self.table, Some(category), |_| {}, None)
            .await
    }

    async fn next_id(&self) -> Ulid {
        let mut ids = self.ids.lock().await;
        // the generator only fails when the random part overflows within one millisecond
        ids.generate().unwrap_or_else(|_| Ulid::new())
    }
}
