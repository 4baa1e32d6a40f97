use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::{key::CompositeKey, value::Value};

/// System column holding the partition key.
pub const PARTITION_KEY: &str = "PartitionKey";
/// System column holding the row key.
pub const ROW_KEY: &str = "RowKey";
/// System column holding the last-modified time.
pub const TIMESTAMP: &str = "Timestamp";
/// System column holding the concurrency tag.
pub const ETAG: &str = "ETag";
/// Entity field that carries the composite key; never stored as a property.
pub const KEY_FIELD: &str = "Key";

/// Names that can never be used for a stored property.
pub const RESERVED_PROPERTY_NAMES: [&str; 5] = [KEY_FIELD, PARTITION_KEY, ROW_KEY, TIMESTAMP, ETAG];

/// Whether `name` is one of [`RESERVED_PROPERTY_NAMES`].
pub fn is_reserved_property(name: &str) -> bool {
    RESERVED_PROPERTY_NAMES.contains(&name)
}

/// A wide-column row: fixed key plus an open-ended set of typed properties.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    /// Partition the row lives in.
    pub partition_key: String,
    /// Key of the row within its partition.
    pub row_key: String,
    /// Concurrency tag assigned by the store on every write.
    pub etag: Option<String>,
    /// Last-modified time assigned by the store.
    pub timestamp: Option<DateTime<Utc>>,
    properties: BTreeMap<String, Value>,
}

impl Row {
    /// Empty row addressed by `key`.
    pub fn new(key: CompositeKey) -> Self {
        let (partition_key, row_key) = key.into_parts();
        Self {
            partition_key,
            row_key,
            etag: None,
            timestamp: None,
            properties: BTreeMap::new(),
        }
    }

    /// External `"partition/row"` form of the row's key.
    pub fn key(&self) -> String {
        format!("{}/{}", self.partition_key, self.row_key)
    }

    /// Stored properties, ordered by name.
    pub fn properties(&self) -> &BTreeMap<String, Value> {
        &self.properties
    }

    /// Property named `name`.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    /// Sets a property. Reserved system names are dropped and reported as `false`.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> bool {
        let name = name.into();
        if is_reserved_property(&name) {
            return false;
        }
        self.properties.insert(name, value.into());
        true
    }

    /// Removes and returns a property.
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.properties.remove(name)
    }

    /// Keeps only the named properties; key and metadata columns are always kept.
    pub fn project(&mut self, columns: &[String]) {
        self.properties
            .retain(|name, _| columns.iter().any(|column| column == name));
    }

    /// Consumes the row, keeping only its properties.
    pub fn into_properties(self) -> BTreeMap<String, Value> {
        self.properties
    }
}

#[cfg(test)]
mod tests {
    use super::Row;
    use crate::{key::CompositeKey, value::Value};

    #[test]
    fn reserved_names_are_never_stored() {
        let mut row = Row::new(CompositeKey::parse("p/r").unwrap());
        assert!(!row.insert("Key", "p/r"));
        assert!(!row.insert("PartitionKey", "x"));
        assert!(row.insert("Name", "name1"));
        assert_eq!(row.properties().len(), 1);
        assert_eq!(row.get("Name"), Some(&Value::from("name1")));
        assert_eq!(row.key(), "p/r");
    }

    #[test]
    fn projection_keeps_listed_columns() {
        let mut row = Row::new(CompositeKey::parse("p/r").unwrap());
        row.insert("A", 1i32);
        row.insert("B", 2i32);
        row.project(&["B".to_string(), "RowKey".to_string()]);
        assert_eq!(row.get("A"), None);
        assert_eq!(row.get("B"), Some(&Value::Int32(2)));
        assert_eq!(row.row_key, "r");
    }
}
