//! In-process table store.
//!
//! [`MemoryTableClient`] implements [`TableClient`] over ordered maps with the
//! same observable rules as the remote service: paged queries with
//! continuation tokens, single-partition atomic batches of at most
//! [`MAX_BATCH_SIZE`] operations, etag preconditions, and distinct not-found
//! errors. It understands the filter subset produced by [`crate::filter`]
//! (`PartitionKey`/`RowKey` equality joined by `and`).
//!
//! Faults can be scheduled per operation to exercise retry and error paths.

use std::{
    collections::{BTreeMap, HashMap},
    ops::Bound,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use async_lock::{Mutex, RwLock};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use ulid::Ulid;

use crate::{
    client::{
        BatchOperation, ClientError, Connector, ContinuationToken, Page, QueryOptions,
        TableClient, MAX_BATCH_SIZE,
    },
    credential::{AccessToken, AuthError, ConnectionDescriptor, InstanceConfig, TokenProvider},
    key::CompositeKey,
    row::{Row, PARTITION_KEY},
};

/// Largest page the store returns regardless of the requested size.
pub const DEFAULT_PAGE_SIZE: usize = 1000;

static FILTER_CLAUSE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(PartitionKey|RowKey)\s+eq\s+'((?:[^']|'')*)'\s*").expect("valid clause regex")
});

static FILTER_AND: Lazy<Regex> = Lazy::new(|| Regex::new(r"^and\s+").expect("valid and regex"));

/// Remote operations that faults can be scheduled for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// [`TableClient::get`].
    Get,
    /// [`TableClient::insert_or_replace`] and [`TableClient::replace`].
    Write,
    /// [`TableClient::delete`].
    Delete,
    /// [`TableClient::submit_batch`].
    Batch,
    /// [`TableClient::query`].
    Query,
    /// Table creation, deletion and existence checks.
    Table,
}

/// A batch accepted by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchRecord {
    /// Table the batch was applied to.
    pub table: String,
    /// Partition shared by every operation.
    pub partition_key: String,
    /// Number of operations in the batch.
    pub operations: usize,
}

type Table = BTreeMap<(String, String), Row>;

/// Tables held in memory, shared by every handle a [`MemoryConnector`] returns.
pub struct MemoryTableClient {
    tables: RwLock<HashMap<String, Table>>,
    page_size: usize,
    faults: Mutex<Vec<(Operation, usize, ClientError)>>,
    batches: Mutex<Vec<BatchRecord>>,
    queries: AtomicUsize,
}

impl Default for MemoryTableClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTableClient {
    /// Empty store with no tables.
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
            page_size: DEFAULT_PAGE_SIZE,
            faults: Mutex::new(Vec::new()),
            batches: Mutex::new(Vec::new()),
            queries: AtomicUsize::new(0),
        }
    }

    /// Caps every page at `page_size` rows.
    pub fn with_page_size(self, page_size: usize) -> Self {
        Self {
            page_size: page_size.max(1),
            ..self
        }
    }

    /// Makes the next `times` calls of `operation` fail with `error`.
    pub async fn fail_next(&self, operation: Operation, times: usize, error: ClientError) {
        if times == 0 {
            return;
        }
        self.faults.lock().await.push((operation, times, error));
    }

    /// Query requests received so far, including failed ones.
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    /// Batches applied so far, in submission order.
    pub async fn batches(&self) -> Vec<BatchRecord> {
        self.batches.lock().await.clone()
    }

    /// Rows currently stored in `table`.
    pub async fn row_count(&self, table: &str) -> usize {
        self.tables
            .read()
            .await
            .get(table)
            .map_or(0, BTreeMap::len)
    }

    async fn inject(&self, operation: Operation) -> Result<(), ClientError> {
        let mut faults = self.faults.lock().await;
        let Some(index) = faults.iter().position(|(op, _, _)| *op == operation) else {
            return Ok(());
        };
        let (_, remaining, error) = &mut faults[index];
        let error = error.clone();
        *remaining -= 1;
        if *remaining == 0 {
            faults.remove(index);
        }
        Err(error)
    }

    fn stamp(mut row: Row) -> Row {
        row.etag = Some(Ulid::new().to_string());
        row.timestamp = Some(Utc::now());
        row
    }
}

fn table_mut<'a>(tables: &'a mut HashMap<String, Table>, table: &str) -> Result<&'a mut Table, ClientError> {
    tables.get_mut(table).ok_or(ClientError::TableNotFound)
}

fn row_id(row: &Row) -> (String, String) {
    (row.partition_key.clone(), row.row_key.clone())
}

fn key_id(key: &CompositeKey) -> (String, String) {
    (key.partition().to_string(), key.row().to_string())
}

/// Equality conditions of a filter expression, as `(column, value)` pairs.
fn parse_filter(filter: &str) -> Result<Vec<(String, String)>, ClientError> {
    let unsupported = || ClientError::BadRequest(format!("unsupported filter: {filter}"));
    let mut rest = filter.trim();
    let mut clauses = Vec::new();
    loop {
        let captures = FILTER_CLAUSE.captures(rest).ok_or_else(unsupported)?;
        clauses.push((captures[1].to_string(), captures[2].replace("''", "'")));
        rest = &rest[captures.get(0).map_or(0, |m| m.end())..];
        if rest.is_empty() {
            return Ok(clauses);
        }
        let and = FILTER_AND.find(rest).ok_or_else(unsupported)?;
        rest = &rest[and.end()..];
    }
}

fn matches(row: &Row, clauses: &[(String, String)]) -> bool {
    clauses.iter().all(|(column, value)| {
        if column == PARTITION_KEY {
            &row.partition_key == value
        } else {
            &row.row_key == value
        }
    })
}

/// Tokens are the JSON array `[partition, row]` of the next row to return.
fn encode_token(id: &(String, String)) -> Result<ContinuationToken, ClientError> {
    serde_json::to_string(id)
        .map(ContinuationToken::new)
        .map_err(|err| ClientError::Other(format!("encoding continuation token: {err}")))
}

fn decode_token(token: &ContinuationToken) -> Result<(String, String), ClientError> {
    serde_json::from_str(token.as_str())
        .map_err(|_| ClientError::BadRequest("invalid continuation token".into()))
}

#[async_trait]
impl TableClient for MemoryTableClient {
    async fn get(&self, table: &str, key: &CompositeKey) -> Result<Row, ClientError> {
        self.inject(Operation::Get).await?;
        let tables = self.tables.read().await;
        let table = tables.get(table).ok_or(ClientError::TableNotFound)?;
        table.get(&key_id(key)).cloned().ok_or(ClientError::NotFound)
    }

    async fn insert_or_replace(&self, table: &str, row: Row) -> Result<(), ClientError> {
        self.inject(Operation::Write).await?;
        let mut tables = self.tables.write().await;
        let table = table_mut(&mut tables, table)?;
        table.insert(row_id(&row), Self::stamp(row));
        Ok(())
    }

    async fn replace(&self, table: &str, row: Row, if_match: &str) -> Result<(), ClientError> {
        self.inject(Operation::Write).await?;
        let mut tables = self.tables.write().await;
        let table = table_mut(&mut tables, table)?;
        let id = row_id(&row);
        let current = table.get(&id).ok_or(ClientError::NotFound)?;
        if if_match != "*" && current.etag.as_deref() != Some(if_match) {
            return Err(ClientError::PreconditionFailed(format!(
                "etag {if_match} does not match the stored row"
            )));
        }
        table.insert(id, Self::stamp(row));
        Ok(())
    }

    async fn delete(&self, table: &str, key: &CompositeKey) -> Result<(), ClientError> {
        self.inject(Operation::Delete).await?;
        let mut tables = self.tables.write().await;
        let table = table_mut(&mut tables, table)?;
        table
            .remove(&key_id(key))
            .map(|_| ())
            .ok_or(ClientError::NotFound)
    }

    async fn submit_batch(
        &self,
        table: &str,
        operations: Vec<BatchOperation>,
    ) -> Result<(), ClientError> {
        self.inject(Operation::Batch).await?;
        let Some(partition_key) = operations.first().map(|op| op.partition_key().to_string())
        else {
            return Err(ClientError::BadRequest("empty batch".into()));
        };
        if operations.len() > MAX_BATCH_SIZE {
            return Err(ClientError::BadRequest(format!(
                "batch of {} operations exceeds {MAX_BATCH_SIZE}",
                operations.len()
            )));
        }
        if operations.iter().any(|op| op.partition_key() != partition_key) {
            return Err(ClientError::BadRequest(
                "batch operations span more than one partition".into(),
            ));
        }

        let mut tables = self.tables.write().await;
        let rows = table_mut(&mut tables, table)?;
        let missing = operations.iter().any(|op| match op {
            BatchOperation::Delete(key) => !rows.contains_key(&key_id(key)),
            BatchOperation::InsertOrReplace(_) => false,
        });
        if missing {
            return Err(ClientError::NotFound);
        }

        let count = operations.len();
        for op in operations {
            match op {
                BatchOperation::InsertOrReplace(row) => {
                    rows.insert(row_id(&row), Self::stamp(row));
                }
                BatchOperation::Delete(key) => {
                    rows.remove(&key_id(&key));
                }
            }
        }
        self.batches.lock().await.push(BatchRecord {
            table: table.to_string(),
            partition_key,
            operations: count,
        });
        Ok(())
    }

    async fn query(
        &self,
        table: &str,
        options: &QueryOptions,
        continuation: Option<ContinuationToken>,
    ) -> Result<Page, ClientError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        self.inject(Operation::Query).await?;
        let clauses = match &options.filter {
            Some(filter) => parse_filter(filter)?,
            None => Vec::new(),
        };
        let start = match &continuation {
            Some(token) => Bound::Included(decode_token(token)?),
            None => Bound::Unbounded,
        };
        let page_size = options
            .page_size
            .unwrap_or(self.page_size)
            .clamp(1, self.page_size);

        let tables = self.tables.read().await;
        let rows = tables.get(table).ok_or(ClientError::TableNotFound)?;
        let mut matching = rows
            .range((start, Bound::Unbounded))
            .filter(|(_, row)| matches(row, &clauses));

        let mut page = Vec::with_capacity(page_size);
        for (_, row) in matching.by_ref().take(page_size) {
            let mut row = row.clone();
            if let Some(select) = &options.select {
                row.project(select);
            }
            page.push(row);
        }
        let continuation = matching
            .next()
            .map(|(id, _)| encode_token(id))
            .transpose()?;
        Ok(Page {
            rows: page,
            continuation,
        })
    }

    async fn create_table(&self, table: &str) -> Result<(), ClientError> {
        self.inject(Operation::Table).await?;
        let mut tables = self.tables.write().await;
        if tables.contains_key(table) {
            return Err(ClientError::Conflict(format!("table {table} already exists")));
        }
        tables.insert(table.to_string(), BTreeMap::new());
        Ok(())
    }

    async fn delete_table(&self, table: &str) -> Result<(), ClientError> {
        self.inject(Operation::Table).await?;
        self.tables
            .write()
            .await
            .remove(table)
            .map(|_| ())
            .ok_or(ClientError::TableNotFound)
    }

    async fn table_exists(&self, table: &str) -> Result<bool, ClientError> {
        self.inject(Operation::Table).await?;
        Ok(self.tables.read().await.contains_key(table))
    }
}

/// Hands out one shared [`MemoryTableClient`] for any descriptor.
#[derive(Clone, Default)]
pub struct MemoryConnector {
    client: Arc<MemoryTableClient>,
    connections: Arc<Mutex<Vec<String>>>,
}

impl MemoryConnector {
    /// Connector that always hands out `client`.
    pub fn new(client: Arc<MemoryTableClient>) -> Self {
        Self {
            client,
            connections: Arc::default(),
        }
    }

    /// The shared client.
    pub fn client(&self) -> &Arc<MemoryTableClient> {
        &self.client
    }

    /// Connection strings seen by [`Connector::connect`], oldest first.
    pub async fn connections(&self) -> Vec<String> {
        self.connections.lock().await.clone()
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    type Client = MemoryTableClient;

    async fn connect(
        &self,
        descriptor: &ConnectionDescriptor,
    ) -> Result<Arc<Self::Client>, ClientError> {
        self.connections
            .lock()
            .await
            .push(descriptor.connection_string().to_string());
        Ok(Arc::clone(&self.client))
    }
}

/// Issues a fixed token valid for `lifetime` from the moment of each request.
#[derive(Debug, Clone)]
pub struct StaticTokenProvider {
    token: String,
    lifetime: Duration,
}

impl StaticTokenProvider {
    /// Provider that always returns `token`.
    pub fn new(token: impl Into<String>, lifetime: Duration) -> Self {
        Self {
            token: token.into(),
            lifetime,
        }
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn acquire(&self, _instance: &InstanceConfig) -> Result<AccessToken, AuthError> {
        Ok(AccessToken {
            token: self.token.clone(),
            expires_on: Utc::now() + self.lifetime,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_filter, MemoryTableClient, Operation};
    use crate::{
        client::{BatchOperation, ClientError, ContinuationToken, QueryOptions, TableClient},
        key::CompositeKey,
        row::Row,
    };

    fn row(key: &str) -> Row {
        Row::new(CompositeKey::parse(key).unwrap())
    }

    #[test]
    fn parses_partition_and_row_filters() {
        assert_eq!(
            parse_filter("PartitionKey eq 'p1' and RowKey eq 'it''s'").unwrap(),
            vec![
                ("PartitionKey".to_string(), "p1".to_string()),
                ("RowKey".to_string(), "it's".to_string()),
            ]
        );
        assert!(matches!(
            parse_filter("Name gt 3"),
            Err(ClientError::BadRequest(_))
        ));
        assert!(parse_filter("PartitionKey eq 'a' or RowKey eq 'b'").is_err());
    }

    #[tokio::test]
    async fn pages_resume_from_continuation() {
        let client = MemoryTableClient::new().with_page_size(2);
        client.create_table("t").await.unwrap();
        for key in ["a/1", "a/2", "b/1"] {
            client.insert_or_replace("t", row(key)).await.unwrap();
        }

        let first = client.query("t", &QueryOptions::default(), None).await.unwrap();
        assert_eq!(first.rows.len(), 2);
        let second = client
            .query("t", &QueryOptions::default(), first.continuation)
            .await
            .unwrap();
        assert_eq!(second.rows.len(), 1);
        assert_eq!(second.rows[0].key(), "b/1");
        assert!(second.continuation.is_none());
        assert_eq!(client.query_count(), 2);
    }

    #[tokio::test]
    async fn batches_are_atomic_and_single_partition() {
        let client = MemoryTableClient::new();
        client.create_table("t").await.unwrap();

        let mixed = vec![
            BatchOperation::InsertOrReplace(row("a/1")),
            BatchOperation::InsertOrReplace(row("b/1")),
        ];
        assert!(matches!(
            client.submit_batch("t", mixed).await,
            Err(ClientError::BadRequest(_))
        ));

        let with_missing_delete = vec![
            BatchOperation::InsertOrReplace(row("a/1")),
            BatchOperation::Delete(CompositeKey::parse("a/404").unwrap()),
        ];
        assert_eq!(
            client.submit_batch("t", with_missing_delete).await,
            Err(ClientError::NotFound)
        );
        assert_eq!(client.row_count("t").await, 0);
        assert!(client.batches().await.is_empty());
    }

    #[tokio::test]
    async fn scheduled_faults_fire_then_clear() {
        let client = MemoryTableClient::new();
        client.create_table("t").await.unwrap();
        client
            .fail_next(Operation::Get, 2, ClientError::Transient("busy".into()))
            .await;
        let key = CompositeKey::parse("a/1").unwrap();
        assert!(client.get("t", &key).await.unwrap_err().is_transient());
        assert!(client.get("t", &key).await.unwrap_err().is_transient());
        assert_eq!(client.get("t", &key).await, Err(ClientError::NotFound));
    }

    #[tokio::test]
    async fn zero_scheduled_faults_are_ignored() {
        let client = MemoryTableClient::new();
        client.create_table("t").await.unwrap();
        client
            .fail_next(Operation::Get, 0, ClientError::Transient("busy".into()))
            .await;
        let key = CompositeKey::parse("a/1").unwrap();
        assert_eq!(client.get("t", &key).await, Err(ClientError::NotFound));
    }

    #[tokio::test]
    async fn continuation_survives_unusual_key_characters() {
        let client = MemoryTableClient::new().with_page_size(1);
        client.create_table("t").await.unwrap();
        let keys = ["a\u{1f}b/c", "a\u{1f}b/d", "a\u{1f}b\u{1f}c/e", "b/\"x\""];
        for key in keys {
            client.insert_or_replace("t", row(key)).await.unwrap();
        }

        let mut seen = Vec::new();
        let mut continuation = None;
        for _ in 0..keys.len() + 1 {
            let page = client
                .query("t", &QueryOptions::default(), continuation)
                .await
                .unwrap();
            seen.extend(page.rows.iter().map(|row| row.key()));
            continuation = page.continuation;
            if continuation.is_none() {
                break;
            }
        }
        assert!(continuation.is_none());
        assert_eq!(seen, keys);
    }

    #[tokio::test]
    async fn garbage_continuation_is_rejected() {
        let client = MemoryTableClient::new();
        client.create_table("t").await.unwrap();
        let token = ContinuationToken::new("a\u{1f}1");
        assert!(matches!(
            client.query("t", &QueryOptions::default(), Some(token)).await,
            Err(ClientError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn replace_checks_etag() {
        let client = MemoryTableClient::new();
        client.create_table("t").await.unwrap();
        client.insert_or_replace("t", row("a/1")).await.unwrap();
        let key = CompositeKey::parse("a/1").unwrap();
        let stored = client.get("t", &key).await.unwrap();
        let etag = stored.etag.clone().unwrap();

        client.replace("t", stored.clone(), &etag).await.unwrap();
        assert!(matches!(
            client.replace("t", stored, &etag).await,
            Err(ClientError::PreconditionFailed(_))
        ));
    }
}
