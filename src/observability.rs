//! Structured `tracing` events emitted by the access layer.
//!
//! Every event is sent to the `rowkit` target and starts with two literal
//! fields: `component` names the subsystem (`store`, `scan`, `batch`,
//! `count`, `credential`, `retry`, `audit`) and `event` is a snake_case name
//! that stays stable across releases. The level macros reject calls that omit
//! either one.
//!
//! No subscriber is installed here; the embedding application decides where
//! events go. Table names, keys and counts may be logged. Property values and
//! credentials are not.

/// Target shared by every event of this crate.
pub(crate) const TARGET: &str = "rowkit";

macro_rules! rowkit_event {
    ($level:ident, component = $component:literal, event = $event:literal $(, $($field:tt)*)?) => {
        ::tracing::$level!(
            target: $crate::observability::TARGET,
            component = $component,
            event = $event
            $(, $($field)*)?
        )
    };
}

/// Table lifecycle changes.
macro_rules! log_info {
    ($($args:tt)*) => {
        $crate::observability::rowkit_event!(info, $($args)*)
    };
}

/// Per-operation detail: pages, batches, refreshes.
macro_rules! log_debug {
    ($($args:tt)*) => {
        $crate::observability::rowkit_event!(debug, $($args)*)
    };
}

/// Recoverable trouble such as a retried fault.
macro_rules! log_warn {
    ($($args:tt)*) => {
        $crate::observability::rowkit_event!(warn, $($args)*)
    };
}

/// A failure that ends an operation the caller cannot observe directly.
macro_rules! log_error {
    ($($args:tt)*) => {
        $crate::observability::rowkit_event!(error, $($args)*)
    };
}

pub(crate) use log_debug;
pub(crate) use log_error;
pub(crate) use log_info;
pub(crate) use log_warn;
pub(crate) use rowkit_event;
