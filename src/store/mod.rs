//! The event-store client contract (C4) and its in-memory reference implementation (C5).

mod memory;

pub use memory::InMemoryEventStore;

use async_trait::async_trait;

use crate::errors::EventStoreError;
use crate::event::{EventEnvelope, GenericDomainEvent};

/// Operations and guarantees every event-store backend must satisfy.
///
/// A remote backend satisfying this contract (a gRPC log service, say) is
/// out of scope for this crate — the contract is expressed purely as a
/// trait so one can be added without touching the aggregate runtime,
/// repository, or buses.
///
/// All methods return [`EventStoreError`], a narrower taxonomy than
/// [`crate::errors::DomainError`]; repository code converts it with `?`.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Acquires the backend connection. Idempotent.
    async fn connect(&self) -> Result<(), EventStoreError>;

    /// Releases the backend connection. Idempotent.
    async fn disconnect(&self) -> Result<(), EventStoreError>;

    /// Returns envelopes with `aggregate_nonce` strictly greater than
    /// `from_version` (or the full stream if `from_version` is `None`).
    ///
    /// A nonexistent stream returns `[]` when `from_version` is `None`, and
    /// fails [`EventStoreError::StreamNotFound`] when it is `Some`. The
    /// returned list is always a snapshot copy.
    async fn read_events(
        &self,
        stream_name: &str,
        from_version: Option<u64>,
    ) -> Result<Vec<EventEnvelope<GenericDomainEvent>>, EventStoreError>;

    /// Atomically appends `events` to `stream_name`, or none of them.
    ///
    /// If `expected_version` is `Some` and differs from the stream's current
    /// version at commit time, fails
    /// [`EventStoreError::ConcurrencyConflict`] without mutating the stream.
    /// On success, assigns each appended envelope a strictly increasing
    /// `global_nonce`. An empty `events` batch is a no-op success that does
    /// not touch the global counter.
    async fn append_events(
        &self,
        stream_name: &str,
        events: Vec<EventEnvelope<GenericDomainEvent>>,
        expected_version: Option<u64>,
    ) -> Result<(), EventStoreError>;

    /// True iff the stream has at least one event.
    async fn stream_exists(&self, stream_name: &str) -> Result<bool, EventStoreError>;

    /// Returns envelopes across all streams with `global_nonce >
    /// after_global_nonce`, sorted by `global_nonce` ascending, capped at
    /// `limit`. Required for projection catch-up.
    async fn read_all_events_from(
        &self,
        after_global_nonce: u64,
        limit: usize,
    ) -> Result<Vec<EventEnvelope<GenericDomainEvent>>, EventStoreError>;
}
