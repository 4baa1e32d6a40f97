//! Typed access to the tables of one storage instance.
//!
//! A [`TableStore`] resolves a live connection through its shared
//! [`CredentialCache`] for every operation, so an expired token is refreshed
//! transparently. Keys are validated before any remote call. "Not found" is an
//! absent result, never an error.

use std::sync::Arc;

use futures_core::Stream;
use tokio_util::sync::CancellationToken;

use crate::{
    batch::{plan_batches, submit_batches},
    client::{BatchOperation, ClientError, Connector, QueryOptions, TableClient},
    count::{count_query, count_rows},
    credential::{CredentialCache, TokenProvider},
    entity::{from_row, to_row, TableEntity},
    error::TableError,
    executor::Executor,
    key::CompositeKey,
    observability::{log_debug, log_info},
    option::TableOptions,
    row::Row,
    scan::{PagedScanner, Subscription},
};

type ClientOf<C> = <C as Connector>::Client;

/// Entity operations on the tables of one storage instance.
pub struct TableStore<C, P, E> {
    instance: String,
    credentials: Arc<CredentialCache<P>>,
    connector: C,
    executor: Arc<E>,
    options: TableOptions,
}

impl<C, P, E> TableStore<C, P, E>
where
    C: Connector,
    P: TokenProvider,
    E: Executor,
{
    /// Store for `instance`, authenticating through `credentials`.
    pub fn new(
        instance: impl Into<String>,
        credentials: Arc<CredentialCache<P>>,
        connector: C,
        executor: E,
    ) -> Self {
        Self {
            instance: instance.into(),
            credentials,
            connector,
            executor: Arc::new(executor),
            options: TableOptions::default(),
        }
    }

    /// Replaces the default [`TableOptions`].
    pub fn with_options(self, options: TableOptions) -> Self {
        Self { options, ..self }
    }

    /// Options in effect.
    pub fn options(&self) -> &TableOptions {
        &self.options
    }

    /// Name of the instance this store resolves.
    pub fn instance(&self) -> &str {
        &self.instance
    }

    /// Forces the next operation to authenticate again.
    pub async fn invalidate_credentials(&self) {
        self.credentials.invalidate(&self.instance).await;
    }

    /// Reads the entity under `key`; `None` when the row or table is missing.
    pub async fn get_entity<T>(&self, table: &str, key: &str) -> Result<Option<T>, TableError>
    where
        T: TableEntity,
    {
        let key = CompositeKey::parse(key)?;
        let client = self.client(table).await?;
        match self.fetch_row(&client, table, &key).await? {
            Some(row) => Ok(Some(from_row(row)?)),
            None => Ok(None),
        }
    }

    /// Whether a row is stored under `key`.
    pub async fn exists(&self, table: &str, key: &str) -> Result<bool, TableError> {
        let key = CompositeKey::parse(key)?;
        let client = self.client(table).await?;
        Ok(self.fetch_row(&client, table, &key).await?.is_some())
    }

    /// Inserts `entity`, replacing any row stored under the same key.
    pub async fn upsert_entity<T>(&self, table: &str, entity: &T) -> Result<(), TableError>
    where
        T: TableEntity,
    {
        let row = to_row(entity)?;
        let key = row.key();
        let client = self.client(table).await?;
        self.options
            .retry
            .run("insert_or_replace", || {
                client.insert_or_replace(table, row.clone())
            })
            .await
            .map_err(|(source, attempts)| {
                TableError::from_client(table, Some(&key), "insert_or_replace", source, attempts)
            })?;
        log_debug!(component = "store", event = "entity_upserted", table = %table, key = %key);
        Ok(())
    }

    /// Replaces the stored row only if it still carries `entity`'s etag.
    ///
    /// An entity without an etag replaces unconditionally, but the row must
    /// exist. A stale etag or a row deleted in the meantime is a
    /// [`TableError::Conflict`].
    pub async fn update_entity<T>(&self, table: &str, entity: &T) -> Result<(), TableError>
    where
        T: TableEntity,
    {
        let row = to_row(entity)?;
        let key = row.key();
        let if_match = entity.etag().unwrap_or("*").to_string();
        let client = self.client(table).await?;
        self.options
            .retry
            .run("replace", || client.replace(table, row.clone(), &if_match))
            .await
            .map_err(|(source, attempts)| match source {
                ClientError::NotFound => TableError::Conflict {
                    table: table.to_string(),
                    key: key.clone(),
                    source,
                },
                source => TableError::from_client(table, Some(&key), "replace", source, attempts),
            })?;
        log_debug!(component = "store", event = "entity_updated", table = %table, key = %key);
        Ok(())
    }

    /// Upserts `entities` in atomic per-partition batches, in input order.
    ///
    /// Every entity is converted before the first batch is sent. Returns the
    /// number of rows written.
    pub async fn upsert_entities<T>(&self, table: &str, entities: &[T]) -> Result<usize, TableError>
    where
        T: TableEntity,
    {
        let operations = entities
            .iter()
            .map(|entity| to_row(entity).map(BatchOperation::InsertOrReplace))
            .collect::<Result<Vec<_>, _>>()?;
        if operations.is_empty() {
            return Ok(0);
        }
        let client = self.client(table).await?;
        let batches = plan_batches(operations, self.options.upsert_batch_size);
        submit_batches(client.as_ref(), table, &self.options.retry, batches).await
    }

    /// Deletes the row under `key`. Returns `false` when there was none.
    pub async fn delete_entity(&self, table: &str, key: &str) -> Result<bool, TableError> {
        let key = CompositeKey::parse(key)?;
        let client = self.client(table).await?;
        let key_text = key.to_string();
        let deleted = self
            .options
            .retry
            .run("delete", || client.delete(table, &key))
            .await;
        match deleted {
            Ok(()) => {
                log_debug!(component = "store", event = "entity_deleted", table = %table, key = %key_text);
                Ok(true)
            }
            Err((ClientError::NotFound | ClientError::TableNotFound, _)) => Ok(false),
            Err((source, attempts)) => Err(TableError::from_client(
                table,
                Some(&key_text),
                "delete",
                source,
                attempts,
            )),
        }
    }

    /// Deletes every key that exists, in atomic per-partition batches.
    ///
    /// Keys not found are skipped. Returns the number of rows deleted.
    pub async fn delete_entities<I, K>(&self, table: &str, keys: I) -> Result<usize, TableError>
    where
        I: IntoIterator<Item = K>,
        K: AsRef<str>,
    {
        let keys = keys
            .into_iter()
            .map(|key| CompositeKey::parse(key.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        if keys.is_empty() {
            return Ok(0);
        }
        let client = self.client(table).await?;
        let mut operations = Vec::with_capacity(keys.len());
        for key in keys {
            if self.fetch_row(&client, table, &key).await?.is_some() {
                operations.push(BatchOperation::Delete(key));
            } else {
                log_debug!(component = "store", event = "delete_skipped", table = %table, key = %key);
            }
        }
        let batches = plan_batches(operations, self.options.delete_batch_size);
        submit_batches(client.as_ref(), table, &self.options.retry, batches).await
    }

    /// Pull mode scan of `table` with an optional filter and projection.
    pub async fn list_entities<T>(
        &self,
        table: &str,
        options: QueryOptions,
    ) -> Result<impl Stream<Item = Result<T, TableError>> + Send + 'static, TableError>
    where
        T: TableEntity,
    {
        Ok(self.scanner(table, options).await?.entities::<T>())
    }

    /// Pull mode scan of the rows matching `filter`.
    pub async fn query_entities<T>(
        &self,
        table: &str,
        filter: impl Into<String>,
    ) -> Result<impl Stream<Item = Result<T, TableError>> + Send + 'static, TableError>
    where
        T: TableEntity,
    {
        self.list_entities(table, QueryOptions::default().filter(filter))
            .await
    }

    /// Push mode scan running on the store's executor.
    ///
    /// Once `cancel` fires no further page is requested; the page in flight is
    /// still delivered before the subscription completes.
    pub async fn subscribe_entities<T>(
        &self,
        table: &str,
        options: QueryOptions,
        cancel: Option<CancellationToken>,
    ) -> Result<Subscription<T>, TableError>
    where
        T: TableEntity,
    {
        let mut scanner = self.scanner(table, options).await?;
        if let Some(cancel) = cancel {
            scanner = scanner.cancel_on(cancel);
        }
        Ok(scanner.subscribe(self.executor.as_ref(), self.options.subscription_buffer))
    }

    /// Counts rows in `table`, or in one partition of it.
    ///
    /// `progress` receives the running total after each page. When `cancel`
    /// fires, counting stops at the next page boundary and the running total
    /// is returned.
    pub async fn count_items<F>(
        &self,
        table: &str,
        partition: Option<&str>,
        progress: F,
        cancel: Option<CancellationToken>,
    ) -> Result<usize, TableError>
    where
        F: FnMut(usize),
    {
        let mut scanner = self.scanner(table, count_query(partition)).await?;
        if let Some(cancel) = cancel {
            scanner = scanner.cancel_on(cancel);
        }
        count_rows(scanner, progress).await
    }

    /// Creates `table`; an existing table is left as is.
    pub async fn create_table(&self, table: &str) -> Result<(), TableError> {
        let client = self.client(table).await?;
        match self
            .options
            .retry
            .run("create_table", || client.create_table(table))
            .await
        {
            Ok(()) => {
                log_info!(component = "store", event = "table_created", table = %table);
                Ok(())
            }
            Err((ClientError::Conflict(_), _)) => Ok(()),
            Err((source, attempts)) => Err(TableError::from_client(
                table,
                None,
                "create_table",
                source,
                attempts,
            )),
        }
    }

    /// Deletes `table`; a missing table is not an error.
    pub async fn delete_table(&self, table: &str) -> Result<(), TableError> {
        let client = self.client(table).await?;
        match self
            .options
            .retry
            .run("delete_table", || client.delete_table(table))
            .await
        {
            Ok(()) => {
                log_info!(component = "store", event = "table_deleted", table = %table);
                Ok(())
            }
            Err((ClientError::TableNotFound | ClientError::NotFound, _)) => Ok(()),
            Err((source, attempts)) => Err(TableError::from_client(
                table,
                None,
                "delete_table",
                source,
                attempts,
            )),
        }
    }

    /// Whether `table` exists.
    pub async fn table_exists(&self, table: &str) -> Result<bool, TableError> {
        let client = self.client(table).await?;
        self.options
            .retry
            .run("table_exists", || client.table_exists(table))
            .await
            .map_err(|(source, attempts)| {
                TableError::from_client(table, None, "table_exists", source, attempts)
            })
    }

    async fn client(&self, table: &str) -> Result<Arc<ClientOf<C>>, TableError> {
        let descriptor = self.credentials.resolve(&self.instance).await?;
        self.connector
            .connect(&descriptor)
            .await
            .map_err(|source| TableError::from_client(table, None, "connect", source, 1))
    }

    async fn scanner(
        &self,
        table: &str,
        options: QueryOptions,
    ) -> Result<PagedScanner<ClientOf<C>>, TableError> {
        let options = match (options.page_size, self.options.page_size) {
            (None, Some(page_size)) => options.page_size(page_size),
            _ => options,
        };
        let client = self.client(table).await?;
        Ok(PagedScanner::new(client, table, options).retry(self.options.retry.clone()))
    }

    async fn fetch_row(
        &self,
        client: &ClientOf<C>,
        table: &str,
        key: &CompositeKey,
    ) -> Result<Option<Row>, TableError> {
        match self.options.retry.run("get", || client.get(table, key)).await {
            Ok(row) => Ok(Some(row)),
            Err((ClientError::NotFound | ClientError::TableNotFound, _)) => Ok(None),
            Err((source, attempts)) => Err(TableError::from_client(
                table,
                Some(&key.to_string()),
                "get",
                source,
                attempts,
            )),
        }
    }
}
