//! Row counting over a key-only scan.

use futures_util::{pin_mut, StreamExt};

use crate::{
    client::{QueryOptions, TableClient},
    error::TableError,
    filter,
    observability::log_debug,
    row::ROW_KEY,
    scan::PagedScanner,
};

/// Query that fetches only the row key, optionally for one partition.
pub fn count_query(partition: Option<&str>) -> QueryOptions {
    let options = QueryOptions::default().select([ROW_KEY]);
    match partition {
        Some(partition) => options.filter(filter::partition_eq(partition)),
        None => options,
    }
}

/// Sums page sizes, reporting the running total after every page.
///
/// A scan stopped by its cancellation token returns the total so far.
pub(crate) async fn count_rows<C, F>(
    scanner: PagedScanner<C>,
    mut progress: F,
) -> Result<usize, TableError>
where
    C: TableClient,
    F: FnMut(usize),
{
    let pages = scanner.pages();
    pin_mut!(pages);
    let mut total = 0;
    while let Some(rows) = pages.next().await {
        total += rows?.len();
        progress(total);
    }
    log_debug!(component = "count", event = "count_completed", total);
    Ok(total)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio_util::sync::CancellationToken;

    use super::{count_query, count_rows};
    use crate::{
        client::TableClient,
        key::CompositeKey,
        memory::MemoryTableClient,
        row::Row,
        scan::PagedScanner,
    };

    async fn seeded(rows: &[&str]) -> Arc<MemoryTableClient> {
        let client = Arc::new(MemoryTableClient::new().with_page_size(2));
        client.create_table("t").await.unwrap();
        for key in rows {
            let mut row = Row::new(CompositeKey::parse(key).unwrap());
            row.insert("Payload", "x");
            client.insert_or_replace("t", row).await.unwrap();
        }
        client
    }

    #[test]
    fn projects_only_the_row_key() {
        let options = count_query(Some("p1"));
        assert_eq!(options.select, Some(vec!["RowKey".to_string()]));
        assert_eq!(options.filter.as_deref(), Some("PartitionKey eq 'p1'"));
        assert_eq!(count_query(None).filter, None);
    }

    #[tokio::test]
    async fn reports_running_totals() {
        let client = seeded(&["a/1", "a/2", "a/3", "b/1", "b/2"]).await;
        let mut seen = Vec::new();
        let total = count_rows(
            PagedScanner::new(client, "t", count_query(None)),
            |running| seen.push(running),
        )
        .await
        .unwrap();
        assert_eq!(total, 5);
        assert_eq!(seen, vec![2, 4, 5]);
    }

    #[tokio::test]
    async fn cancellation_returns_partial_total() {
        let client = seeded(&["a/1", "a/2", "a/3", "a/4", "a/5"]).await;
        let cancel = CancellationToken::new();
        let scanner =
            PagedScanner::new(Arc::clone(&client), "t", count_query(None)).cancel_on(cancel.clone());
        let total = count_rows(scanner, |_| cancel.cancel()).await.unwrap();
        assert_eq!(total, 2);
        assert_eq!(client.query_count(), 1);
    }
}
