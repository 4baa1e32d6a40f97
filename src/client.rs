//! Seam to the remote tabular store.
//!
//! The crate does not implement a network transport. A [`TableClient`] is the
//! narrow set of remote calls the access layer needs, and a [`Connector`] turns
//! a resolved [`ConnectionDescriptor`] into a client handle. See
//! [`memory`](crate::memory) for the in-process implementation.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::{credential::ConnectionDescriptor, key::CompositeKey, row::Row};

/// Largest batch the store accepts in one atomic submission.
pub const MAX_BATCH_SIZE: usize = 100;

/// Failures reported by a [`TableClient`] or [`Connector`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// The addressed row does not exist.
    #[error("entity not found")]
    NotFound,
    /// The addressed table does not exist.
    #[error("table not found")]
    TableNotFound,
    /// The row or table already exists.
    #[error("conflict: {0}")]
    Conflict(String),
    /// The row's etag no longer matches the one supplied.
    #[error("precondition failed: {0}")]
    PreconditionFailed(String),
    /// The store rejected the request as malformed.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// The account does not offer the requested feature.
    #[error("not implemented on this account: {0}")]
    NotImplemented(String),
    /// Timeout or throttling; safe to retry.
    #[error("transient failure: {0}")]
    Transient(String),
    /// Anything else the store reported.
    #[error("{0}")]
    Other(String),
}

impl ClientError {
    /// Faults worth retrying with backoff.
    pub fn is_transient(&self) -> bool {
        matches!(self, ClientError::Transient(_))
    }
}

/// Opaque position in a paged query. Only the store interprets it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContinuationToken(String);

impl ContinuationToken {
    /// Wraps a token string returned by the store.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Token text to hand back to the store.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Projection and filter for a paged query, passed through to the store untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryOptions {
    /// Store-side filter expression, see [`filter`](crate::filter).
    pub filter: Option<String>,
    /// Properties to return. `None` returns all of them.
    pub select: Option<Vec<String>>,
    /// Upper bound on rows per page; the store may return fewer.
    pub page_size: Option<usize>,
}

impl QueryOptions {
    /// Sets the filter expression.
    pub fn filter(self, filter: impl Into<String>) -> Self {
        QueryOptions {
            filter: Some(filter.into()),
            ..self
        }
    }

    /// Restricts the returned properties.
    pub fn select<I, S>(self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        QueryOptions {
            select: Some(columns.into_iter().map(Into::into).collect()),
            ..self
        }
    }

    /// Sets the page size hint.
    pub fn page_size(self, page_size: usize) -> Self {
        QueryOptions {
            page_size: Some(page_size),
            ..self
        }
    }
}

/// One page of a segmented query and where the next page resumes.
#[derive(Debug, Clone, Default)]
pub struct Page {
    /// Rows of this page, in key order.
    pub rows: Vec<Row>,
    /// Resume point for the next page. `None` on the last page.
    pub continuation: Option<ContinuationToken>,
}

/// One mutation inside an atomic batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOperation {
    /// Writes the row, replacing any existing one.
    InsertOrReplace(Row),
    /// Removes the row with this key.
    Delete(CompositeKey),
}

impl BatchOperation {
    /// Partition the operation targets.
    pub fn partition_key(&self) -> &str {
        match self {
            BatchOperation::InsertOrReplace(row) => &row.partition_key,
            BatchOperation::Delete(key) => key.partition(),
        }
    }
}

/// Remote table operations. Every method reports "not found" distinctly.
#[async_trait]
pub trait TableClient: Send + Sync + 'static {
    /// Reads one row.
    async fn get(&self, table: &str, key: &CompositeKey) -> Result<Row, ClientError>;

    /// Writes a row unconditionally.
    async fn insert_or_replace(&self, table: &str, row: Row) -> Result<(), ClientError>;

    /// Replaces an existing row only while its etag still equals `if_match`.
    async fn replace(&self, table: &str, row: Row, if_match: &str) -> Result<(), ClientError>;

    /// Deletes one row.
    async fn delete(&self, table: &str, key: &CompositeKey) -> Result<(), ClientError>;

    /// Applies every operation or none. All operations share one partition.
    async fn submit_batch(
        &self,
        table: &str,
        operations: Vec<BatchOperation>,
    ) -> Result<(), ClientError>;

    /// Reads one page of rows starting at `continuation`.
    async fn query(
        &self,
        table: &str,
        options: &QueryOptions,
        continuation: Option<ContinuationToken>,
    ) -> Result<Page, ClientError>;

    /// Creates a table. Fails with [`ClientError::Conflict`] when it exists.
    async fn create_table(&self, table: &str) -> Result<(), ClientError>;

    /// Deletes a table and all its rows.
    async fn delete_table(&self, table: &str) -> Result<(), ClientError>;

    /// Whether the table exists.
    async fn table_exists(&self, table: &str) -> Result<bool, ClientError>;
}

/// Builds a client handle from a live connection descriptor.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Client handle produced by this connector.
    type Client: TableClient;

    /// Opens or reuses a client for `descriptor`.
    async fn connect(
        &self,
        descriptor: &ConnectionDescriptor,
    ) -> Result<Arc<Self::Client>, ClientError>;
}
