//! Repository (C6): loads and saves aggregates against an [`EventStore`] client.

use std::marker::PhantomData;
use std::sync::Arc;

use crate::aggregate::{AggregateRoot, EventSourced};
use crate::errors::{DomainError, DomainResult};
use crate::store::EventStore;

/// Loads and saves aggregates of one concrete type `A` against a shared
/// [`EventStore`] client.
pub struct Repository<A: EventSourced> {
    store: Arc<dyn EventStore>,
    aggregate_type: String,
    _marker: PhantomData<fn() -> A>,
}

impl<A: EventSourced> Repository<A> {
    /// Builds a repository using `A::aggregate_type()` as the stream prefix.
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        Self::with_aggregate_type(store, A::aggregate_type())
    }

    /// Builds a repository with an explicitly configured aggregate type
    /// name, overriding `A::aggregate_type()`.
    pub fn with_aggregate_type(store: Arc<dyn EventStore>, aggregate_type: impl Into<String>) -> Self {
        Self {
            store,
            aggregate_type: aggregate_type.into(),
            _marker: PhantomData,
        }
    }

    fn stream_name(&self, id: &str) -> String {
        format!("{}-{}", self.aggregate_type, id)
    }

    /// Loads the aggregate identified by `id` by replaying its stream.
    /// Returns `Ok(None)` if no stream exists — absence is not an error.
    pub async fn load(&self, id: &str) -> DomainResult<Option<AggregateRoot<A>>> {
        let stream = self.stream_name(id);
        let events = self.store.read_events(&stream, None).await?;
        if events.is_empty() {
            return Ok(None);
        }

        let typed = events
            .into_iter()
            .map(|envelope| envelope.into_typed::<A::Event>())
            .collect::<DomainResult<Vec<_>>>()?;

        let mut root = AggregateRoot::<A>::new();
        root.rehydrate(typed);
        tracing::debug!(aggregate_type = %self.aggregate_type, id, version = root.version(), "loaded aggregate");
        Ok(Some(root))
    }

    /// Saves `root`'s uncommitted events under optimistic concurrency.
    ///
    /// A no-op if there are no uncommitted events — calling `save` twice in
    /// a row never issues a second network write. On success, marks `root`
    /// committed. On [`DomainError::ConcurrencyConflict`], `root` is left
    /// dirty and the error propagates unchanged so the caller can reload and
    /// retry.
    pub async fn save(&self, root: &mut AggregateRoot<A>) -> DomainResult<()> {
        let id = root
            .id()
            .ok_or_else(|| DomainError::InvalidAggregateState {
                aggregate_type: self.aggregate_type.clone(),
                reason: "cannot save an aggregate that has not been initialized".to_string(),
            })?
            .to_string();

        let uncommitted = root.uncommitted_events();
        if uncommitted.is_empty() {
            return Ok(());
        }

        let expected_version = root.version() - uncommitted.len() as u64;
        let stream = self.stream_name(&id);
        let generic = uncommitted
            .into_iter()
            .map(|envelope| envelope.into_generic())
            .collect::<DomainResult<Vec<_>>>()?;

        self.store
            .append_events(&stream, generic, Some(expected_version))
            .await?;
        root.mark_committed();
        tracing::debug!(aggregate_type = %self.aggregate_type, id, version = root.version(), "saved aggregate");
        Ok(())
    }

    /// True iff a stream exists for `id`.
    pub async fn exists(&self, id: &str) -> DomainResult<bool> {
        Ok(self.store.stream_exists(&self.stream_name(id)).await?)
    }
}

/// Mints per-aggregate-type repositories against one shared [`EventStore`].
pub struct RepositoryFactory {
    store: Arc<dyn EventStore>,
}

impl RepositoryFactory {
    /// Creates a factory backed by `store`.
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        Self { store }
    }

    /// Mints a repository for `A` using its own `aggregate_type()`.
    pub fn repository_for<A: EventSourced>(&self) -> Repository<A> {
        Repository::new(self.store.clone())
    }

    /// Mints a repository for `A` using an explicitly configured aggregate
    /// type name instead of `A::aggregate_type()`.
    pub fn repository_for_named<A: EventSourced>(&self, aggregate_type: impl Into<String>) -> Repository<A> {
        Repository::with_aggregate_type(self.store.clone(), aggregate_type)
    }
}

/// Splits a wire stream name into `(aggregate_type, aggregate_id)` on the
/// **first** hyphen, so aggregate ids that themselves contain hyphens are
/// preserved intact in the second half.
pub fn parse_stream_name(stream_name: &str) -> Option<(&str, &str)> {
    stream_name.split_once('-')
}
