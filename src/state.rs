//! Named JSON values grouped by scope, one row per value.

use std::sync::Arc;

use futures_util::TryStreamExt;
use serde::{de::DeserializeOwned, Serialize};

use crate::{
    client::{Connector, QueryOptions},
    credential::TokenProvider,
    entity::EntityError,
    error::TableError,
    executor::Executor,
    filter,
    key::CompositeKey,
    row::ROW_KEY,
    store::TableStore,
    TableEntity,
};

const VALUE_PROPERTY: &str = "Value";

#[derive(Debug, Default, TableEntity)]
struct StateRow {
    key: String,
    #[entity(rename = "Value")]
    value: serde_json::Value,
}

/// JSON values keyed by scope and name, stored in one table.
pub struct StateStore<C, P, E> {
    store: Arc<TableStore<C, P, E>>,
    table: String,
}

impl<C, P, E> StateStore<C, P, E>
where
    C: Connector,
    P: TokenProvider,
    E: Executor,
{
    /// Opens the state table, creating it when missing.
    pub async fn open(
        store: Arc<TableStore<C, P, E>>,
        table: impl Into<String>,
    ) -> Result<Self, TableError> {
        let table = table.into();
        store.create_table(&table).await?;
        Ok(Self { store, table })
    }

    /// Value stored under `scope`/`name`, decoded as `V`.
    pub async fn get<V>(&self, scope: &str, name: &str) -> Result<Option<V>, TableError>
    where
        V: DeserializeOwned,
    {
        let key = CompositeKey::new(scope, name)?;
        let Some(row) = self
            .store
            .get_entity::<StateRow>(&self.table, &key.to_string())
            .await?
        else {
            return Ok(None);
        };
        serde_json::from_value(row.value)
            .map(Some)
            .map_err(|source| json_error(source).into())
    }

    /// Stores `value` under `scope`/`name`, replacing any previous value.
    pub async fn set<V>(&self, scope: &str, name: &str, value: &V) -> Result<(), TableError>
    where
        V: Serialize + ?Sized,
    {
        let key = CompositeKey::new(scope, name)?;
        let row = StateRow {
            key: key.to_string(),
            value: serde_json::to_value(value).map_err(json_error)?,
        };
        self.store.upsert_entity(&self.table, &row).await
    }

    /// Removes a value. Returns `false` when it was not set.
    pub async fn remove(&self, scope: &str, name: &str) -> Result<bool, TableError> {
        let key = CompositeKey::new(scope, name)?;
        self.store.delete_entity(&self.table, &key.to_string()).await
    }

    /// Names set in `scope`, in key order.
    pub async fn names(&self, scope: &str) -> Result<Vec<String>, TableError> {
        let options = QueryOptions::default()
            .filter(filter::partition_eq(scope))
            .select([ROW_KEY]);
        let rows: Vec<StateRow> = self
            .store
            .list_entities(&self.table, options)
            .await?
            .try_collect()
            .await?;
        Ok(rows
            .into_iter()
            .filter_map(|row| row.key.split_once('/').map(|(_, name)| name.to_string()))
            .collect())
    }
}

fn json_error(source: serde_json::Error) -> EntityError {
    EntityError::Json {
        field: VALUE_PROPERTY,
        source,
    }
}
