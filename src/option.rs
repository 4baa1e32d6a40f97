use crate::{client::MAX_BATCH_SIZE, retry::RetryPolicy};

/// Tuning knobs for a [`TableStore`](crate::TableStore).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableOptions {
    pub(crate) upsert_batch_size: usize,
    pub(crate) delete_batch_size: usize,
    pub(crate) page_size: Option<usize>,
    pub(crate) subscription_buffer: usize,
    pub(crate) retry: RetryPolicy,
}

impl Default for TableOptions {
    fn default() -> Self {
        TableOptions {
            upsert_batch_size: MAX_BATCH_SIZE,
            delete_batch_size: MAX_BATCH_SIZE,
            page_size: None,
            subscription_buffer: 64,
            retry: RetryPolicy::default(),
        }
    }
}

impl TableOptions {
    /// Rows per atomic upsert batch, clamped to `1..=100`.
    pub fn upsert_batch_size(self, upsert_batch_size: usize) -> Self {
        TableOptions {
            upsert_batch_size: upsert_batch_size.clamp(1, MAX_BATCH_SIZE),
            ..self
        }
    }

    /// Rows per atomic delete batch, clamped to `1..=100`.
    pub fn delete_batch_size(self, delete_batch_size: usize) -> Self {
        TableOptions {
            delete_batch_size: delete_batch_size.clamp(1, MAX_BATCH_SIZE),
            ..self
        }
    }

    /// Rows requested per page; `None` leaves it to the store.
    pub fn page_size(self, page_size: Option<usize>) -> Self {
        TableOptions {
            page_size: page_size.map(|size| size.max(1)),
            ..self
        }
    }

    /// Records buffered between a push-mode scan and its subscriber.
    pub fn subscription_buffer(self, subscription_buffer: usize) -> Self {
        TableOptions {
            subscription_buffer: subscription_buffer.max(1),
            ..self
        }
    }

    /// Retry policy for transient faults.
    pub fn retry(self, retry: RetryPolicy) -> Self {
        TableOptions { retry, ..self }
    }

    /// Configured retry policy.
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }
}

#[cfg(test)]
mod tests {
    use super::TableOptions;

    #[test]
    fn batch_sizes_are_clamped() {
        let options = TableOptions::default()
            .upsert_batch_size(500)
            .delete_batch_size(0);
        assert_eq!(options.upsert_batch_size, 100);
        assert_eq!(options.delete_batch_size, 1);

        let options = TableOptions::default().delete_batch_size(20);
        assert_eq!(options.delete_batch_size, 20);
    }

    #[test]
    fn zero_sizes_are_raised_to_one() {
        let options = TableOptions::default()
            .page_size(Some(0))
            .subscription_buffer(0);
        assert_eq!(options.page_size, Some(1));
        assert_eq!(options.subscription_buffer, 1);
    }
}
