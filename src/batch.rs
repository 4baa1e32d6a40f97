//! Partition-aware grouping and submission of atomic batches.
//!
//! Operations are grouped in caller order. A batch is closed when the
//! partition key changes or it reaches the ceiling, so input that is not sorted
//! by partition produces more, smaller batches, never a reordering.

use serde_json::{json, Map};

use crate::{
    client::{BatchOperation, ClientError, TableClient, MAX_BATCH_SIZE},
    error::TableError,
    observability::log_debug,
    retry::RetryPolicy,
    value::Value,
};

/// Splits `operations` into single-partition batches of at most `ceiling`
/// operations, preserving order. `ceiling` is clamped to `1..=100`.
pub fn plan_batches<I>(operations: I, ceiling: usize) -> Vec<Vec<BatchOperation>>
where
    I: IntoIterator<Item = BatchOperation>,
{
    let ceiling = ceiling.clamp(1, MAX_BATCH_SIZE);
    let mut batches = Vec::new();
    let mut current: Vec<BatchOperation> = Vec::new();

    for operation in operations {
        let partition_changed = current
            .first()
            .is_some_and(|head| head.partition_key() != operation.partition_key());
        if partition_changed {
            batches.push(std::mem::take(&mut current));
        }
        current.push(operation);
        if current.len() == ceiling {
            batches.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        batches.push(current);
    }
    batches
}

/// Submits `batches` one after another, stopping at the first failure.
///
/// Returns the number of operations applied.
pub(crate) async fn submit_batches<C>(
    client: &C,
    table: &str,
    retry: &RetryPolicy,
    batches: Vec<Vec<BatchOperation>>,
) -> Result<usize, TableError>
where
    C: TableClient,
{
    let total = batches.len();
    let mut applied = 0;
    for (index, batch) in batches.into_iter().enumerate() {
        let size = batch.len();
        let partition = batch
            .first()
            .map(|op| op.partition_key().to_string())
            .unwrap_or_default();

        retry
            .run("batch", || client.submit_batch(table, batch.clone()))
            .await
            .map_err(|(source, attempts)| match source {
                ClientError::BadRequest(_) => TableError::MalformedBatch {
                    table: table.to_string(),
                    payload: snapshot(&batch),
                    source,
                },
                source => TableError::from_client(table, Some(&partition), "batch", source, attempts),
            })?;

        applied += size;
        log_debug!(
            component = "batch",
            event = "batch_flushed",
            table = %table,
            partition = %partition,
            batch = index + 1,
            of = total,
            size,
        );
    }
    Ok(applied)
}

/// JSON rendering of a rejected batch for error reports.
fn snapshot(batch: &[BatchOperation]) -> String {
    let operations = batch
        .iter()
        .map(|operation| match operation {
            BatchOperation::InsertOrReplace(row) => {
                let properties = row
                    .properties()
                    .iter()
                    .map(|(name, value)| (name.clone(), value_json(value)))
                    .collect::<Map<_, _>>();
                json!({
                    "op": "InsertOrReplace",
                    "PartitionKey": row.partition_key,
                    "RowKey": row.row_key,
                    "properties": properties,
                })
            }
            BatchOperation::Delete(key) => json!({
                "op": "Delete",
                "PartitionKey": key.partition(),
                "RowKey": key.row(),
            }),
        })
        .collect::<Vec<_>>();
    serde_json::Value::Array(operations).to_string()
}

fn value_json(value: &Value) -> serde_json::Value {
    match value {
        Value::String(v) => json!(v),
        Value::Int32(v) => json!(v),
        Value::Int64(v) => json!(v),
        Value::Double(v) => json!(v),
        Value::Bool(v) => json!(v),
        Value::Guid(v) => json!(v.to_string()),
        Value::DateTime(v) => json!(v.to_rfc3339()),
        Value::DateTimeOffset(v) => json!(v.to_rfc3339()),
        Value::Binary(v) => json!(format!("<{} bytes>", v.len())),
    }
}

#[cfg(test)]
mod tests {
    use super::{plan_batches, snapshot};
    use crate::{client::BatchOperation, key::CompositeKey, row::Row};

    fn upsert(partition: &str, row: usize) -> BatchOperation {
        let key = CompositeKey::new(partition, row.to_string()).unwrap();
        BatchOperation::InsertOrReplace(Row::new(key))
    }

    fn sizes(batches: &[Vec<BatchOperation>]) -> Vec<(String, usize)> {
        batches
            .iter()
            .map(|batch| (batch[0].partition_key().to_string(), batch.len()))
            .collect()
    }

    #[test]
    fn splits_on_partition_then_ceiling() {
        let operations = (0..3)
            .map(|i| upsert("p1", i))
            .chain((0..150).map(|i| upsert("p2", i)));
        let batches = plan_batches(operations, 100);
        assert_eq!(
            sizes(&batches),
            vec![
                ("p1".to_string(), 3),
                ("p2".to_string(), 100),
                ("p2".to_string(), 50)
            ]
        );
    }

    #[test]
    fn interleaved_partitions_keep_caller_order() {
        let operations = vec![upsert("a", 1), upsert("b", 1), upsert("a", 2)];
        let batches = plan_batches(operations, 100);
        assert_eq!(
            sizes(&batches),
            vec![("a".to_string(), 1), ("b".to_string(), 1), ("a".to_string(), 1)]
        );
    }

    #[test]
    fn ceiling_is_clamped() {
        let batches = plan_batches((0..4).map(|i| upsert("p", i)), 0);
        assert_eq!(batches.len(), 4);
        let batches = plan_batches((0..250).map(|i| upsert("p", i)), 1000);
        assert_eq!(batches.iter().map(Vec::len).collect::<Vec<_>>(), vec![100, 100, 50]);
        assert!(plan_batches(Vec::new(), 100).is_empty());
    }

    #[test]
    fn snapshot_names_rows() {
        let mut row = Row::new(CompositeKey::parse("p/r").unwrap());
        row.insert("Name", "n1");
        let payload = snapshot(&[
            BatchOperation::InsertOrReplace(row),
            BatchOperation::Delete(CompositeKey::parse("p/gone").unwrap()),
        ]);
        let parsed: serde_json::Value = serde_json::from_str(&payload).unwrap();
        assert_eq!(parsed[0]["properties"]["Name"], "n1");
        assert_eq!(parsed[1]["op"], "Delete");
        assert_eq!(parsed[1]["RowKey"], "gone");
    }
}
