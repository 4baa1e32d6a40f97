use std::{fmt, str::FromStr};

use thiserror::Error;

/// Separator between the partition and row parts of the external key form.
pub const KEY_SEPARATOR: char = '/';

/// Errors raised while parsing or building a [`CompositeKey`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    /// The key is not two non-empty parts joined by the separator.
    #[error("malformed key {key:?}: expected \"partition/row\" with two non-empty parts")]
    Malformed {
        /// The rejected key text.
        key: String,
    },
}

/// Two-part address of a row: partition key plus row key.
///
/// The external representation is `"partition/row"`. Both parts are non-empty
/// and neither contains the separator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CompositeKey {
    partition: String,
    row: String,
}

impl CompositeKey {
    /// Builds a key from its parts, rejecting empty parts and parts that
    /// contain the separator.
    pub fn new(partition: impl Into<String>, row: impl Into<String>) -> Result<Self, KeyError> {
        let (partition, row) = (partition.into(), row.into());
        if !is_valid_part(&partition) || !is_valid_part(&row) {
            return Err(KeyError::Malformed {
                key: format!("{partition}{KEY_SEPARATOR}{row}"),
            });
        }
        Ok(Self { partition, row })
    }

    /// Parses the external `"partition/row"` form.
    pub fn parse(key: &str) -> Result<Self, KeyError> {
        let mut parts = key.split(KEY_SEPARATOR);
        match (parts.next(), parts.next(), parts.next()) {
            (Some(partition), Some(row), None) if !partition.is_empty() && !row.is_empty() => {
                Ok(Self {
                    partition: partition.to_string(),
                    row: row.to_string(),
                })
            }
            _ => Err(KeyError::Malformed {
                key: key.to_string(),
            }),
        }
    }

    /// Partition part.
    pub fn partition(&self) -> &str {
        &self.partition
    }

    /// Row part.
    pub fn row(&self) -> &str {
        &self.row
    }

    /// Splits the key into `(partition, row)`.
    pub fn into_parts(self) -> (String, String) {
        (self.partition, self.row)
    }
}

fn is_valid_part(part: &str) -> bool {
    !part.is_empty() && !part.contains(KEY_SEPARATOR)
}

impl fmt::Display for CompositeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.partition, KEY_SEPARATOR, self.row)
    }
}

impl FromStr for CompositeKey {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<&str> for CompositeKey {
    type Error = KeyError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}
