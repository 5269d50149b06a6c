//! Typed failure taxonomy shared by every other module.
//!
//! [`DomainError`] is the closed set of failures the aggregate runtime, repository,
//! and buses can raise. [`EventStoreError`] is a narrower taxonomy scoped to the
//! event-store client boundary; it converts into [`DomainError`] via `?` so
//! repository code never has to match on it directly.

use serde_json::{json, Map, Value};

/// The closed failure taxonomy for the SDK.
///
/// Every variant carries a stable [`DomainError::code`] (its kind name) and a
/// structured [`DomainError::details`] map, so callers that only have a
/// serialized representation of the error (e.g. across an FFI boundary) can
/// still dispatch on it.
#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    /// No stream exists for this aggregate identity.
    #[error("aggregate not found: {aggregate_type}:{aggregate_id}")]
    AggregateNotFound {
        /// The aggregate type that was looked up.
        aggregate_type: String,
        /// The aggregate id that was looked up.
        aggregate_id: String,
    },

    /// An append was rejected because the stream had already advanced.
    ///
    /// This is the one variant the SDK documents as recoverable: a caller
    /// can reload the aggregate and retry its command.
    #[error("concurrency conflict: expected version {expected_version}, got {actual_version}")]
    ConcurrencyConflict {
        /// The version the writer believed the stream was at.
        expected_version: u64,
        /// The version the store actually found. `-1` when unknown.
        actual_version: i64,
    },

    /// A lifecycle rule was violated (emitting before initialization, or
    /// re-initializing with a different id).
    #[error("invalid aggregate state for {aggregate_type}: {reason}")]
    InvalidAggregateState {
        /// The aggregate type the violation occurred on.
        aggregate_type: String,
        /// Human-readable description of which rule was broken.
        reason: String,
    },

    /// A command failed domain validation, or no handler was registered for it.
    #[error("command validation failed for {command_type}: {}", errors.join(", "))]
    CommandValidation {
        /// The wire type name of the offending command.
        command_type: String,
        /// One or more validation failure messages.
        errors: Vec<String>,
    },

    /// Any backend I/O failure surfaced by an event-store client.
    #[error("event store error: {message}")]
    EventStore {
        /// Human-readable description of the failure.
        message: String,
        /// The underlying cause, if one is available.
        #[source]
        cause: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A payload failed to encode or decode.
    #[error("failed to {operation} {data_type}")]
    Serialization {
        /// What was being attempted (`"serialize"` / `"deserialize"`).
        operation: String,
        /// The type being encoded or decoded, for diagnostics.
        data_type: String,
        /// The underlying `serde_json` failure, if one is available.
        #[source]
        cause: Option<serde_json::Error>,
    },
}

impl DomainError {
    /// The variant's stable name, usable as a machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            DomainError::AggregateNotFound { .. } => "AggregateNotFound",
            DomainError::ConcurrencyConflict { .. } => "ConcurrencyConflict",
            DomainError::InvalidAggregateState { .. } => "InvalidAggregateState",
            DomainError::CommandValidation { .. } => "CommandValidation",
            DomainError::EventStore { .. } => "EventStore",
            DomainError::Serialization { .. } => "Serialization",
        }
    }

    /// A structured view of the error's fields, for machine consumption
    /// (logging sinks, cross-language bindings, problem-details responses).
    pub fn details(&self) -> Map<String, Value> {
        let mut map = Map::new();
        match self {
            DomainError::AggregateNotFound {
                aggregate_type,
                aggregate_id,
            } => {
                map.insert("aggregate_type".into(), json!(aggregate_type));
                map.insert("aggregate_id".into(), json!(aggregate_id));
            }
            DomainError::ConcurrencyConflict {
                expected_version,
                actual_version,
            } => {
                map.insert("expected_version".into(), json!(expected_version));
                map.insert("actual_version".into(), json!(actual_version));
            }
            DomainError::InvalidAggregateState {
                aggregate_type,
                reason,
            } => {
                map.insert("aggregate_type".into(), json!(aggregate_type));
                map.insert("reason".into(), json!(reason));
            }
            DomainError::CommandValidation {
                command_type,
                errors,
            } => {
                map.insert("command_type".into(), json!(command_type));
                map.insert("errors".into(), json!(errors));
            }
            DomainError::EventStore { message, .. } => {
                map.insert("message".into(), json!(message));
            }
            DomainError::Serialization {
                operation,
                data_type,
                ..
            } => {
                map.insert("operation".into(), json!(operation));
                map.insert("data_type".into(), json!(data_type));
            }
        }
        map
    }

    /// Whether a caller is expected to recover by reloading and retrying.
    pub fn is_retriable(&self) -> bool {
        matches!(self, DomainError::ConcurrencyConflict { .. })
    }

    /// Whether this is an absence, not a failure, in disguise.
    pub fn is_not_found(&self) -> bool {
        matches!(self, DomainError::AggregateNotFound { .. })
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(cause: serde_json::Error) -> Self {
        DomainError::Serialization {
            operation: "serialize/deserialize".to_string(),
            data_type: "json".to_string(),
            cause: Some(cause),
        }
    }
}

/// Convenience alias used throughout the crate.
pub type DomainResult<T> = Result<T, DomainError>;

/// Failure taxonomy scoped to the event-store client boundary (C4/C5).
///
/// Kept narrower than [`DomainError`] because a store implementation only
/// ever fails in these three ways; the [`From`] impl below lets repository
/// code propagate it with plain `?`.
#[derive(Debug, thiserror::Error)]
pub enum EventStoreError {
    /// `append_events` was called with an `expected_version` that no longer
    /// matches the stream.
    #[error("concurrency conflict: expected version {expected_version}, got {actual_version}")]
    ConcurrencyConflict {
        /// The version the writer believed the stream was at.
        expected_version: u64,
        /// The version the store actually found.
        actual_version: i64,
    },

    /// `read_events` was called with `from_version` set against a stream
    /// that has never been written to.
    #[error("stream not found: {0}")]
    StreamNotFound(String),

    /// Any other backend failure (connection, transport, storage).
    #[error("event store I/O error: {0}")]
    Io(String),
}

impl From<EventStoreError> for DomainError {
    fn from(err: EventStoreError) -> Self {
        match err {
            EventStoreError::ConcurrencyConflict {
                expected_version,
                actual_version,
            } => DomainError::ConcurrencyConflict {
                expected_version,
                actual_version,
            },
            EventStoreError::StreamNotFound(name) => DomainError::EventStore {
                message: format!("stream not found: {name}"),
                cause: None,
            },
            EventStoreError::Io(message) => DomainError::EventStore {
                message,
                cause: None,
            },
        }
    }
}
