//! Builders for the filter expressions the access layer issues itself.
//!
//! Values are quoted with single quotes; a quote inside a value is doubled.

use crate::row::{PARTITION_KEY, ROW_KEY};

fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Matches every row of one partition.
pub fn partition_eq(partition: &str) -> String {
    format!("{PARTITION_KEY} eq {}", quote(partition))
}

/// Matches rows with the given row key.
pub fn row_eq(row: &str) -> String {
    format!("{ROW_KEY} eq {}", quote(row))
}

/// Conjunction of two expressions.
pub fn and(left: &str, right: &str) -> String {
    format!("{left} and {right}")
}
