#![deny(missing_docs)]
//! Typed access to a partitioned wide-column table store.
//!
//! Records are plain structs that `#[derive(TableEntity)]`. Their `key` field
//! holds the external key form `"partition/row"`; every other field becomes a
//! typed row property, with a JSON-text fallback for types the store has no
//! native kind for. A [`TableStore`] offers point reads and writes,
//! partition-aware batch upserts and deletes, pull and push scans over
//! continuation-token pages, and row counting. Connections are resolved
//! through a shared [`CredentialCache`] that refreshes expired tokens at most
//! once per instance.
//!
//! The remote store is reached through the [`TableClient`] and [`Connector`]
//! traits. [`memory::MemoryTableClient`] is an in-process implementation.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use rowkit::{
//!     executor::tokio::TokioExecutor,
//!     memory::{MemoryConnector, StaticTokenProvider},
//!     Credential, CredentialCache, InstanceConfig, TableEntity, TableStore,
//! };
//!
//! #[derive(Debug, Default, TableEntity)]
//! struct Device {
//!     key: String,
//!     name: String,
//!     firmware: Option<i32>,
//! }
//!
//! # async fn run() -> Result<(), rowkit::TableError> {
//! let credentials = CredentialCache::new(StaticTokenProvider::new(
//!     "token",
//!     chrono::Duration::hours(1),
//! ))
//! .with_instance(
//!     InstanceConfig::new("primary", "devstore")
//!         .credential(Credential::ConnectionString("UseDevelopmentStorage=true".into())),
//! );
//! let store = TableStore::new(
//!     "primary",
//!     Arc::new(credentials),
//!     MemoryConnector::default(),
//!     TokioExecutor::default(),
//! );
//!
//! store.create_table("devices").await?;
//! let device = Device {
//!     key: "site-1/sensor-7".into(),
//!     name: "boiler".into(),
//!     firmware: Some(3),
//! };
//! store.upsert_entity("devices", &device).await?;
//! let found: Option<Device> = store.get_entity("devices", "site-1/sensor-7").await?;
//! assert_eq!(found.map(|d| d.name).as_deref(), Some("boiler"));
//! # Ok(())
//! # }
//! ```

extern crate self as rowkit;

mod observability;

/// Append-only audit trail over a table.
pub mod audit;
/// Partition-aware atomic batches.
pub mod batch;
/// Remote store seam: client and connector traits.
pub mod client;
/// Row counting.
pub mod count;
/// Instance configuration and the shared credential cache.
pub mod credential;
/// Entity descriptors and row conversion.
pub mod entity;
/// Error type of the access layer.
pub mod error;
/// Background task spawning.
pub mod executor;
/// Filter expression builders.
pub mod filter;
/// Composite partition/row keys.
pub mod key;
/// In-process store for tests and local development.
pub mod memory;
/// Store configuration.
pub mod option;
mod retry;
/// Wide-column rows and system column names.
pub mod row;
/// Paged scans in pull and push mode.
pub mod scan;
/// Scoped JSON state over a table.
pub mod state;
/// The table store façade.
pub mod store;
/// Typed property values.
pub mod value;

pub use rowkit_macros::TableEntity;

pub use crate::{
    audit::{AuditEntry, AuditLog},
    client::{
        BatchOperation, ClientError, Connector, ContinuationToken, Page, QueryOptions,
        TableClient, MAX_BATCH_SIZE,
    },
    credential::{
        AccessToken, AuthError, ConnectionDescriptor, Credential, CredentialCache,
        InstanceConfig, TokenProvider,
    },
    entity::{
        from_row, to_row, EntityDescriptor, EntityError, FieldDescriptor, PropertyCodec,
        TableEntity,
    },
    error::TableError,
    key::{CompositeKey, KeyError},
    option::TableOptions,
    retry::RetryPolicy,
    row::Row,
    scan::{PagedScanner, Subscription},
    state::StateStore,
    store::TableStore,
    value::{Value, ValueKind},
};

#[doc(hidden)]
pub mod __private {
    pub use chrono::{DateTime, Utc};
    pub use once_cell::sync::OnceCell;
}
