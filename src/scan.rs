//! Continuation-token pagination over a remote table query.
//!
//! A scan moves through `Idle -> Fetching -> (Delivering -> Fetching)* ->
//! Done`, or ends in `Failed` when a page request fails for good. Page `N + 1`
//! is never requested before page `N` has been handed on, and a cancellation
//! token is consulted only between pages; a page that has been fetched is
//! always delivered in full.
//!
//! Two consumption modes share that loop. [`PagedScanner::entities`] is a
//! lazy stream the caller pulls from. [`PagedScanner::subscribe`] runs the loop
//! on an [`Executor`] and pushes records into a bounded channel; the
//! [`Subscription`] ends when the channel closes, after an `Err` item when the
//! scan failed.

use std::{
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use async_stream::try_stream;
use futures_core::Stream;
use futures_util::{pin_mut, StreamExt};
use pin_project_lite::pin_project;
use tokio_util::sync::CancellationToken;

use crate::{
    client::{ContinuationToken, Page, QueryOptions, TableClient},
    entity::{from_row, TableEntity},
    error::TableError,
    executor::Executor,
    observability::{log_debug, log_error},
    retry::RetryPolicy,
    row::Row,
};

/// One paged query over a table, consumed as a pull stream or a push subscription.
pub struct PagedScanner<C> {
    client: Arc<C>,
    table: String,
    options: QueryOptions,
    retry: RetryPolicy,
    cancel: Option<CancellationToken>,
}

impl<C> PagedScanner<C>
where
    C: TableClient,
{
    /// Scan of `table` with the given projection and filter.
    pub fn new(client: Arc<C>, table: impl Into<String>, options: QueryOptions) -> Self {
        Self {
            client,
            table: table.into(),
            options,
            retry: RetryPolicy::default(),
            cancel: None,
        }
    }

    /// Retry policy for each page request.
    pub fn retry(self, retry: RetryPolicy) -> Self {
        PagedScanner { retry, ..self }
    }

    /// Stops the scan at the next page boundary once `cancel` fires.
    pub fn cancel_on(self, cancel: CancellationToken) -> Self {
        PagedScanner {
            cancel: Some(cancel),
            ..self
        }
    }

    /// Stream of pages, one remote request per item.
    pub fn pages(self) -> impl Stream<Item = Result<Vec<Row>, TableError>> + Send + 'static {
        let scanner = self;
        try_stream! {
            let mut continuation: Option<ContinuationToken> = None;
            let mut page_number = 0usize;
            loop {
                if scanner.is_cancelled() {
                    log_debug!(
                        component = "scan",
                        event = "scan_cancelled",
                        table = %scanner.table,
                        pages = page_number,
                    );
                    break;
                }
                let Page { rows, continuation: next } = scanner.fetch(continuation.take()).await?;
                page_number += 1;
                log_debug!(
                    component = "scan",
                    event = "page_fetched",
                    table = %scanner.table,
                    page = page_number,
                    rows = rows.len(),
                    more = next.is_some(),
                );
                yield rows;
                match next {
                    Some(token) => continuation = Some(token),
                    None => break,
                }
            }
        }
    }

    /// Pull mode: every row of every page, converted to `T`.
    pub fn entities<T>(self) -> impl Stream<Item = Result<T, TableError>> + Send + 'static
    where
        T: TableEntity,
    {
        let pages = self.pages();
        try_stream! {
            pin_mut!(pages);
            while let Some(rows) = pages.next().await {
                for row in rows? {
                    yield from_row::<T>(row).map_err(TableError::from)?;
                }
            }
        }
    }

    /// Push mode: runs the scan on `executor`, buffering up to `buffer` records.
    pub fn subscribe<T, E>(self, executor: &E, buffer: usize) -> Subscription<T>
    where
        T: TableEntity,
        E: Executor,
    {
        let (sender, receiver) = flume::bounded(buffer.max(1));
        let table = self.table.clone();
        let entities = self.entities::<T>();

        executor.spawn(async move {
            pin_mut!(entities);
            let mut delivered = 0usize;
            while let Some(item) = entities.next().await {
                let failed = item.is_err();
                if let Err(err) = &item {
                    log_error!(
                        component = "scan",
                        event = "subscription_failed",
                        table = %table,
                        delivered,
                        error = %err,
                    );
                }
                if sender.send_async(item).await.is_err() {
                    log_debug!(
                        component = "scan",
                        event = "subscriber_dropped",
                        table = %table,
                        delivered,
                    );
                    return;
                }
                if failed {
                    return;
                }
                delivered += 1;
            }
            log_debug!(
                component = "scan",
                event = "subscription_completed",
                table = %table,
                delivered,
            );
        });

        Subscription {
            inner: receiver.into_stream(),
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
    }

    async fn fetch(&self, continuation: Option<ContinuationToken>) -> Result<Page, TableError> {
        self.retry
            .run("query", || {
                self.client
                    .query(&self.table, &self.options, continuation.clone())
            })
            .await
            .map_err(|(source, attempts)| {
                TableError::from_client(&self.table, None, "query", source, attempts)
            })
    }
}

pin_project! {
    /// Receiving side of a push-mode scan.
    ///
    /// Yields records in scan order. The stream ends when the scan completes,
    /// is cancelled, or after yielding the error that failed it. Dropping the
    /// subscription stops the scan.
    pub struct Subscription<T: 'static> {
        #[pin]
        inner: flume::r#async::RecvStream<'static, Result<T, TableError>>,
    }
}

impl<T: 'static> Stream for Subscription<T> {
    type Item = Result<T, TableError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.project().inner.poll_next(cx)
    }
}
