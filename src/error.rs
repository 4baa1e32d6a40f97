use thiserror::Error;

use crate::{
    client::ClientError, credential::AuthError, entity::EntityError, key::KeyError,
};

/// Error returned by the table access layer.
#[derive(Debug, Error)]
pub enum TableError {
    /// A key string is not of the form `"partition/row"`.
    #[error(transparent)]
    Key(#[from] KeyError),
    /// An entity could not be converted to or from a row.
    #[error("entity mapping error: {0}")]
    Entity(#[source] EntityError),
    /// The store refused a write because of a concurrent change.
    #[error("conflict writing {key} to table {table}: {source}")]
    Conflict {
        /// Table the operation targeted.
        table: String,
        /// Key of the row being written.
        key: String,
        /// Failure reported by the store.
        #[source]
        source: ClientError,
    },
    /// The store rejected a batch as invalid.
    #[error("table {table} rejected batch: {source}; payload: {payload}")]
    MalformedBatch {
        /// Table the operation targeted.
        table: String,
        /// JSON snapshot of the rejected operations.
        payload: String,
        /// Failure reported by the store.
        #[source]
        source: ClientError,
    },
    /// Credentials for the instance could not be obtained.
    #[error("authentication failed: {0}")]
    Authentication(#[from] AuthError),
    /// The storage account lacks a feature the operation needs.
    #[error("table {table}: {source}")]
    NotImplementedOnAccount {
        /// Table the operation targeted.
        table: String,
        /// Failure reported by the store.
        #[source]
        source: ClientError,
    },
    /// Transient faults persisted through every retry.
    #[error("table {table} unavailable after {attempts} attempts: {source}")]
    RemoteUnavailable {
        /// Table the operation targeted.
        table: String,
        /// Attempts made, including the first.
        attempts: u32,
        /// Failure reported by the store.
        #[source]
        source: ClientError,
    },
    /// Any other failure reported by the store.
    #[error("table {table}: {operation} failed: {source}")]
    Remote {
        /// Table the operation targeted.
        table: String,
        /// Name of the failed operation.
        operation: &'static str,
        /// Failure reported by the store.
        #[source]
        source: ClientError,
    },
}

impl From<EntityError> for TableError {
    fn from(err: EntityError) -> Self {
        match err {
            EntityError::Key { source, .. } => TableError::Key(source),
            other => TableError::Entity(other),
        }
    }
}

impl TableError {
    /// Wraps a client failure with the table and key it concerned.
    pub(crate) fn from_client(
        table: &str,
        key: Option<&str>,
        operation: &'static str,
        source: ClientError,
        attempts: u32,
    ) -> Self {
        let table = table.to_string();
        match source {
            ClientError::Conflict(_) | ClientError::PreconditionFailed(_) => TableError::Conflict {
                table,
                key: key.unwrap_or_default().to_string(),
                source,
            },
            ClientError::NotImplemented(_) => TableError::NotImplementedOnAccount { table, source },
            ClientError::Transient(_) => TableError::RemoteUnavailable {
                table,
                attempts,
                source,
            },
            source => TableError::Remote {
                table,
                operation,
                source,
            },
        }
    }

    /// Whether the error is a write conflict.
    pub fn is_conflict(&self) -> bool {
        matches!(self, TableError::Conflict { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::TableError;
    use crate::{
        client::ClientError,
        entity::EntityError,
        key::{CompositeKey, KeyError},
    };

    #[test]
    fn entity_key_errors_surface_as_malformed_keys() {
        let source = CompositeKey::parse("bad").unwrap_err();
        let err = TableError::from(EntityError::Key {
            entity: "Device",
            source,
        });
        assert!(matches!(err, TableError::Key(KeyError::Malformed { .. })));
    }

    #[test]
    fn client_errors_map_to_taxonomy() {
        let conflict = TableError::from_client(
            "devices",
            Some("p/r"),
            "replace",
            ClientError::PreconditionFailed("etag".into()),
            1,
        );
        assert!(conflict.is_conflict());
        assert!(conflict.to_string().contains("p/r"));

        let unavailable = TableError::from_client(
            "devices",
            None,
            "query",
            ClientError::Transient("timeout".into()),
            4,
        );
        assert!(matches!(
            unavailable,
            TableError::RemoteUnavailable { attempts: 4, .. }
        ));

        let missing_feature = TableError::from_client(
            "devices",
            None,
            "batch",
            ClientError::NotImplemented("batch".into()),
            1,
        );
        assert!(matches!(
            missing_feature,
            TableError::NotImplementedOnAccount { .. }
        ));
    }
}
