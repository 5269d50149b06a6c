//! The aggregate runtime (C3): lifecycle, handler dispatch, and rehydration.

use std::collections::HashMap;
use std::ops::{Deref, DerefMut};

use crate::bus::DomainCommand;
use crate::errors::{DomainError, DomainResult};
use crate::event::{DomainEvent, EventContext, EventEnvelope, EventFactory};

/// Declares an aggregate's event/command vocabulary and gives the runtime a
/// stable type name to build stream names with.
///
/// Implementors are plain domain-state structs (no identity, no version —
/// those live on the [`AggregateRoot`] wrapper around them). `Default`
/// supplies the "nothing has happened yet" state rehydration resets to.
pub trait EventSourced: Default + Send + Sync + 'static {
    /// The event enum this aggregate emits and applies.
    type Event: DomainEvent + Clone + PartialEq + serde::Serialize + serde::de::DeserializeOwned;
    /// The command enum this aggregate accepts.
    type Command: DomainCommand;

    /// The aggregate type name used in `"{aggregate_type}-{aggregate_id}"`.
    fn aggregate_type() -> &'static str;

    /// The cached event-handler registry for this concrete aggregate type.
    fn event_handlers() -> &'static EventHandlerRegistry<Self>;

    /// The cached command-handler registry for this concrete aggregate type.
    fn command_handlers() -> &'static CommandHandlerRegistry<Self>;
}

/// Derives an aggregate's wire type name from its Rust struct name by
/// stripping a trailing `"Aggregate"` suffix, mirroring the rule used when a
/// repository's aggregate type is not explicitly configured.
pub fn derive_aggregate_type(struct_name: &'static str) -> &'static str {
    struct_name.strip_suffix("Aggregate").unwrap_or(struct_name)
}

/// `event_type -> handler` association, built once per concrete aggregate
/// type and cached (see [`EventSourced::event_handlers`]).
///
/// Handlers are pure state updates: `fn(&mut A, &A::Event)`. They must never
/// validate or raise further events — that is the command handler's job.
pub struct EventHandlerRegistry<A: EventSourced> {
    handlers: HashMap<&'static str, fn(&mut A, &A::Event)>,
}

impl<A: EventSourced> EventHandlerRegistry<A> {
    /// Starts building a registry.
    pub fn builder() -> EventHandlerRegistryBuilder<A> {
        EventHandlerRegistryBuilder {
            handlers: HashMap::new(),
        }
    }

    fn get(&self, event_type: &str) -> Option<&fn(&mut A, &A::Event)> {
        self.handlers.get(event_type)
    }
}

/// Builder for [`EventHandlerRegistry`].
pub struct EventHandlerRegistryBuilder<A: EventSourced> {
    handlers: HashMap<&'static str, fn(&mut A, &A::Event)>,
}

impl<A: EventSourced> EventHandlerRegistryBuilder<A> {
    /// Associates `event_type` with `handler`.
    pub fn on(mut self, event_type: &'static str, handler: fn(&mut A, &A::Event)) -> Self {
        self.handlers.insert(event_type, handler);
        self
    }

    /// Finalizes the registry.
    pub fn build(self) -> EventHandlerRegistry<A> {
        EventHandlerRegistry {
            handlers: self.handlers,
        }
    }
}

/// `command_type -> handler` association, built once per concrete aggregate
/// type and cached (see [`EventSourced::command_handlers`]).
///
/// Handlers validate domain rules and call [`AggregateRoot::raise_event`] for
/// each resulting event: `fn(&mut AggregateRoot<A>, A::Command) ->
/// DomainResult<()>`. They operate on the wrapper, not the bare state, since
/// raising an event needs the wrapper's identity/version bookkeeping.
pub struct CommandHandlerRegistry<A: EventSourced> {
    handlers: HashMap<&'static str, fn(&mut AggregateRoot<A>, A::Command) -> DomainResult<()>>,
}

impl<A: EventSourced> CommandHandlerRegistry<A> {
    /// Starts building a registry.
    pub fn builder() -> CommandHandlerRegistryBuilder<A> {
        CommandHandlerRegistryBuilder {
            handlers: HashMap::new(),
        }
    }

    fn get(
        &self,
        command_type: &str,
    ) -> Option<&fn(&mut AggregateRoot<A>, A::Command) -> DomainResult<()>> {
        self.handlers.get(command_type)
    }
}

/// Builder for [`CommandHandlerRegistry`].
pub struct CommandHandlerRegistryBuilder<A: EventSourced> {
    handlers: HashMap<&'static str, fn(&mut AggregateRoot<A>, A::Command) -> DomainResult<()>>,
}

impl<A: EventSourced> CommandHandlerRegistryBuilder<A> {
    /// Associates `command_type` with `handler`.
    pub fn on(
        mut self,
        command_type: &'static str,
        handler: fn(&mut AggregateRoot<A>, A::Command) -> DomainResult<()>,
    ) -> Self {
        self.handlers.insert(command_type, handler);
        self
    }

    /// Finalizes the registry.
    pub fn build(self) -> CommandHandlerRegistry<A> {
        CommandHandlerRegistry {
            handlers: self.handlers,
        }
    }
}

/// The mutable in-memory reduction of one aggregate's stream.
///
/// Wraps a bare [`EventSourced`] domain-state value with the identity,
/// version, and uncommitted-events bookkeeping that event sourcing needs,
/// and derefs to the domain state so handler bodies can read/write its
/// fields directly.
pub struct AggregateRoot<A: EventSourced> {
    id: Option<String>,
    version: u64,
    uncommitted: Vec<EventEnvelope<A::Event>>,
    state: A,
}

impl<A: EventSourced> Default for AggregateRoot<A> {
    fn default() -> Self {
        Self {
            id: None,
            version: 0,
            uncommitted: Vec::new(),
            state: A::default(),
        }
    }
}

impl<A: EventSourced> AggregateRoot<A> {
    /// Creates a fresh, uninitialized aggregate root.
    pub fn new() -> Self {
        Self::default()
    }

    /// The aggregate's identity, if it has been initialized.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// The stream version: the count of events this aggregate has produced.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Whether this aggregate has uncommitted events.
    pub fn is_dirty(&self) -> bool {
        !self.uncommitted.is_empty()
    }

    /// Sets the aggregate's identity. Idempotent for the same id; fails
    /// [`DomainError::InvalidAggregateState`] for a different one.
    pub fn initialize(&mut self, id: impl Into<String>) -> DomainResult<()> {
        let id = id.into();
        match &self.id {
            None => {
                self.id = Some(id);
                Ok(())
            }
            Some(existing) if existing == &id => Ok(()),
            Some(existing) => Err(DomainError::InvalidAggregateState {
                aggregate_type: A::aggregate_type().to_string(),
                reason: format!(
                    "cannot re-initialize aggregate '{existing}' with a different id '{id}'"
                ),
            }),
        }
    }

    /// Applies `event` to the domain state via the registered handler.
    ///
    /// An unregistered `event_type` is non-fatal: it is logged at `warn` and
    /// otherwise ignored, so forward-compatible producers can add event
    /// types this binary does not yet know how to apply.
    pub fn apply_event(&mut self, event: &A::Event) {
        match A::event_handlers().get(event.event_type()) {
            Some(handler) => handler(&mut self.state, event),
            None => tracing::warn!(
                event_type = event.event_type(),
                aggregate_type = A::aggregate_type(),
                "no handler registered for event type; ignoring"
            ),
        }
    }

    /// Emits a new event: requires the aggregate to be initialized,
    /// constructs its envelope with `aggregate_nonce = version + 1`, applies
    /// it, and tracks it as uncommitted.
    pub fn raise_event(&mut self, event: A::Event) -> DomainResult<()> {
        let id = self.id.clone().ok_or_else(|| DomainError::InvalidAggregateState {
            aggregate_type: A::aggregate_type().to_string(),
            reason: "cannot raise an event before the aggregate is initialized".to_string(),
        })?;
        let aggregate_nonce = self.version + 1;
        let envelope = EventFactory::create(
            event,
            id,
            A::aggregate_type(),
            aggregate_nonce,
            EventContext::default(),
        );
        self.apply_event(&envelope.event);
        self.version = aggregate_nonce;
        self.uncommitted.push(envelope);
        Ok(())
    }

    /// Fully resets state and replays `events` in order, adopting identity
    /// from the first envelope and tracking version from each envelope's
    /// `aggregate_nonce`. This is a reset-and-replay, never an incremental
    /// update.
    pub fn rehydrate<I>(&mut self, events: I)
    where
        I: IntoIterator<Item = EventEnvelope<A::Event>>,
    {
        self.uncommitted.clear();
        self.version = 0;
        self.id = None;
        self.state = A::default();
        for envelope in events {
            if self.id.is_none() {
                self.id = Some(envelope.metadata.aggregate_id.clone());
            }
            self.apply_event(&envelope.event);
            self.version = envelope.metadata.aggregate_nonce;
        }
    }

    /// Returns a copy of the pending envelopes; mutating the returned `Vec`
    /// never leaks back into this aggregate.
    pub fn uncommitted_events(&self) -> Vec<EventEnvelope<A::Event>> {
        self.uncommitted.clone()
    }

    /// Clears uncommitted events, preserving `version`.
    pub fn mark_committed(&mut self) {
        self.uncommitted.clear();
    }

    /// Dispatches `command` to its registered handler, keyed by
    /// `command.command_type()`. Fails [`DomainError::CommandValidation`] if
    /// nothing is registered.
    pub fn handle_command(&mut self, command: A::Command) -> DomainResult<()> {
        let command_type = command.command_type().to_string();
        match A::command_handlers().get(&command_type) {
            Some(handler) => handler(self, command),
            None => Err(DomainError::CommandValidation {
                command_type,
                errors: vec!["no handler registered for this command type".to_string()],
            }),
        }
    }
}

impl<A: EventSourced> Deref for AggregateRoot<A> {
    type Target = A;

    fn deref(&self) -> &A {
        &self.state
    }
}

impl<A: EventSourced> DerefMut for AggregateRoot<A> {
    fn deref_mut(&mut self) -> &mut A {
        &mut self.state
    }
}

impl<A> std::fmt::Debug for AggregateRoot<A>
where
    A: EventSourced + std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AggregateRoot")
            .field("id", &self.id)
            .field("version", &self.version)
            .field("uncommitted_count", &self.uncommitted.len())
            .field("state", &self.state)
            .finish()
    }
}
