//! Read-model projections and their dispatch (C7).

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;

use crate::event::{EventEnvelope, GenericDomainEvent};

/// Failures specific to projection registration. Kept separate from
/// [`crate::errors::DomainError`] — a duplicate registration is a wiring
/// mistake, not one of the six domain-level failure modes callers branch on.
#[derive(Debug, Error)]
pub enum ProjectionError {
    /// A projection is already registered under this name.
    #[error("a projection named '{0}' is already registered")]
    DuplicateProjection(String),
}

/// A read model fed by the full, ordered event stream.
///
/// `apply` receives every generic event dispatched by a [`ProjectionManager`]
/// and should ignore any `event_type` it does not recognize — unknown types
/// are not an error at this layer, mirroring the aggregate runtime's
/// tolerance for events it cannot interpret.
#[async_trait]
pub trait Projection: Send + Sync {
    /// Stable name this projection is registered under.
    fn name(&self) -> &str;

    /// Schema version of this projection's read model. Bump it when a
    /// change to `apply`'s logic or the read model's shape means previously
    /// written rows are no longer compatible and the projection must be
    /// rebuilt from the beginning of the stream. Defaults to `1`.
    fn version(&self) -> u32 {
        1
    }

    /// Applies one event to this projection's read model.
    async fn apply(&self, envelope: &EventEnvelope<GenericDomainEvent>) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// Dispatches events to a set of registered projections with per-projection
/// failure isolation: one projection's error is logged and does not prevent
/// the others from receiving the same event.
#[derive(Default)]
pub struct ProjectionManager {
    projections: HashMap<String, Box<dyn Projection>>,
}

impl ProjectionManager {
    /// Creates an empty manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `projection`. Fails if its name is already taken.
    pub fn register(&mut self, projection: Box<dyn Projection>) -> Result<(), ProjectionError> {
        let name = projection.name().to_string();
        if self.projections.contains_key(&name) {
            return Err(ProjectionError::DuplicateProjection(name));
        }
        self.projections.insert(name, projection);
        Ok(())
    }

    /// Removes a registered projection, if present.
    pub fn unregister(&mut self, name: &str) -> Option<Box<dyn Projection>> {
        self.projections.remove(name)
    }

    /// Returns the registered projection names, in no particular order.
    pub fn projection_names(&self) -> Vec<&str> {
        self.projections.keys().map(String::as_str).collect()
    }

    /// The schema version of a registered projection, for callers deciding
    /// whether a stored read model needs a full rebuild.
    pub fn projection_version(&self, name: &str) -> Option<u32> {
        self.projections.get(name).map(|projection| projection.version())
    }

    /// Dispatches `envelope` to every registered projection.
    ///
    /// A failing projection is logged via `tracing::error!` and skipped; it
    /// never prevents sibling projections from receiving the event, and
    /// never surfaces as an error to the caller.
    pub async fn dispatch(&self, envelope: &EventEnvelope<GenericDomainEvent>) {
        let results = futures::future::join_all(
            self.projections
                .iter()
                .map(|(name, projection)| async move { (name, projection.apply(envelope).await) }),
        )
        .await;

        for (name, result) in results {
            if let Err(error) = result {
                tracing::error!(
                    projection = %name,
                    event_type = %envelope.event.event_type,
                    error = %error,
                    "projection failed to apply event"
                );
            }
        }
    }
}

/// A projection built from a registry of per-`event_type` closures, for
/// read models that do not warrant a dedicated [`Projection`] impl.
///
/// Events whose `event_type` has no registered handler are silently
/// ignored — catch-up dispatch routinely replays event types a given
/// projection does not care about.
pub struct AutoDispatchProjection<S> {
    name: String,
    version: u32,
    state: tokio::sync::Mutex<S>,
    handlers: HashMap<String, Box<dyn Fn(&mut S, &GenericDomainEvent) + Send + Sync>>,
}

impl<S: Send> AutoDispatchProjection<S> {
    /// Creates a projection named `name`, owning `state`, at schema version `1`.
    pub fn new(name: impl Into<String>, state: S) -> Self {
        Self {
            name: name.into(),
            version: 1,
            state: tokio::sync::Mutex::new(state),
            handlers: HashMap::new(),
        }
    }

    /// Registers a handler invoked when an event's `event_type` equals `event_type`.
    pub fn on(
        mut self,
        event_type: impl Into<String>,
        handler: impl Fn(&mut S, &GenericDomainEvent) + Send + Sync + 'static,
    ) -> Self {
        self.handlers.insert(event_type.into(), Box::new(handler));
        self
    }

    /// Overrides this projection's schema version from the default of `1`.
    pub fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    /// Runs `f` against a snapshot of the current state.
    pub async fn read<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        let state = self.state.lock().await;
        f(&state)
    }
}

#[async_trait]
impl<S: Send + Sync> Projection for AutoDispatchProjection<S> {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> u32 {
        self.version
    }

    async fn apply(&self, envelope: &EventEnvelope<GenericDomainEvent>) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if let Some(handler) = self.handlers.get(&envelope.event.event_type) {
            let mut state = self.state.lock().await;
            handler(&mut state, &envelope.event);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventContext, EventFactory};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn make_envelope(event_type: &str) -> EventEnvelope<GenericDomainEvent> {
        let generic = GenericDomainEvent {
            event_type: event_type.to_string(),
            schema_version: 1,
            payload: serde_json::json!({}),
        };
        EventFactory::create(generic, "acc-1", "Account", 1, EventContext::default())
    }

    struct FailingProjection;
    #[async_trait]
    impl Projection for FailingProjection {
        fn name(&self) -> &str {
            "failing"
        }
        async fn apply(&self, _envelope: &EventEnvelope<GenericDomainEvent>) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
            Err("deliberate failure".into())
        }
    }

    struct CountingProjection(Arc<AtomicU32>);
    #[async_trait]
    impl Projection for CountingProjection {
        fn name(&self) -> &str {
            "counting"
        }
        async fn apply(&self, _envelope: &EventEnvelope<GenericDomainEvent>) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct VersionedProjection;
    #[async_trait]
    impl Projection for VersionedProjection {
        fn name(&self) -> &str {
            "versioned"
        }
        fn version(&self) -> u32 {
            3
        }
        async fn apply(&self, _envelope: &EventEnvelope<GenericDomainEvent>) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
            Ok(())
        }
    }

    #[test]
    fn register_rejects_duplicate_names() {
        let mut manager = ProjectionManager::new();
        manager.register(Box::new(FailingProjection)).unwrap();
        let err = manager.register(Box::new(FailingProjection)).unwrap_err();
        assert!(matches!(err, ProjectionError::DuplicateProjection(name) if name == "failing"));
    }

    #[test]
    fn projection_version_defaults_to_one_and_can_be_overridden() {
        let mut manager = ProjectionManager::new();
        manager.register(Box::new(FailingProjection)).unwrap();
        manager.register(Box::new(VersionedProjection)).unwrap();

        assert_eq!(manager.projection_version("failing"), Some(1));
        assert_eq!(manager.projection_version("versioned"), Some(3));
        assert_eq!(manager.projection_version("missing"), None);
    }

    #[tokio::test]
    async fn auto_dispatch_projection_version_defaults_to_one_and_is_overridable() {
        let default_version = AutoDispatchProjection::new("totals", 0i64);
        assert_eq!(default_version.version(), 1);

        let overridden = AutoDispatchProjection::new("totals", 0i64).with_version(2);
        assert_eq!(overridden.version(), 2);
    }

    #[tokio::test]
    async fn a_failing_projection_does_not_block_its_siblings() {
        let mut manager = ProjectionManager::new();
        let count = Arc::new(AtomicU32::new(0));
        manager.register(Box::new(FailingProjection)).unwrap();
        manager.register(Box::new(CountingProjection(count.clone()))).unwrap();

        manager.dispatch(&make_envelope("Whatever")).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn auto_dispatch_projection_ignores_unregistered_event_types() {
        let projection = AutoDispatchProjection::new("totals", 0i64)
            .on("Credited", |state, _event| *state += 1);

        projection.apply(&make_envelope("Debited")).await.unwrap();
        assert_eq!(projection.read(|s| *s).await, 0);

        projection.apply(&make_envelope("Credited")).await.unwrap();
        assert_eq!(projection.read(|s| *s).await, 1);
    }

    #[tokio::test]
    async fn unregister_removes_a_projection_from_dispatch() {
        let mut manager = ProjectionManager::new();
        let count = Arc::new(AtomicU32::new(0));
        manager.register(Box::new(CountingProjection(count.clone()))).unwrap();
        manager.unregister("counting");

        manager.dispatch(&make_envelope("Whatever")).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}
