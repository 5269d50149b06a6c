//! Domain event values, metadata, the envelope pattern, and the envelope factory.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::DomainResult;

/// Contract every domain event value implements.
///
/// `event_type` is the wire discriminator used for handler dispatch
/// throughout the crate (aggregate event handlers, projection auto-dispatch,
/// command/query buses); it is deliberately a string, not a Rust type, so
/// dispatch stays keyed on the producer's wire vocabulary rather than on
/// whatever type happens to model it locally.
pub trait DomainEvent: std::fmt::Debug + Send + Sync + 'static {
    /// The stable wire discriminator for this event's concrete shape.
    fn event_type(&self) -> &str;

    /// The schema revision of this event's payload. Defaults to `1`.
    fn schema_version(&self) -> u32 {
        1
    }
}

/// Immutable record attached to every event at the moment it is produced.
///
/// Once constructed, nothing in this crate mutates an `EventMetadata` in
/// place; `global_nonce` assignment on append reconstructs a new value via
/// [`EventMetadata::with_global_nonce`] rather than setting a field.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct EventMetadata {
    /// Globally unique identifier, generated at envelope creation.
    ///
    /// Built from a UUIDv7 so `event_id`s for the same stream sort in
    /// creation order even if two events carry identical timestamps.
    pub event_id: Uuid,
    /// Event-time, UTC.
    pub timestamp: DateTime<Utc>,
    /// Store-recorded time, UTC. Equal to `timestamp` until a backend
    /// distinguishes the two.
    pub recorded_timestamp: DateTime<Utc>,
    /// Identity of the emitting aggregate.
    pub aggregate_id: String,
    /// Type of the emitting aggregate.
    pub aggregate_type: String,
    /// 1-based sequence within this aggregate's stream.
    pub aggregate_nonce: u64,
    /// Monotonically increasing position across all streams in the store.
    /// `None` until the store assigns one on append.
    pub global_nonce: Option<u64>,
    /// MIME type of the serialized payload.
    pub content_type: String,
    /// Multi-tenancy context, carried on every request and every envelope.
    pub tenant_id: Option<String>,
    /// Correlation identifier for distributed tracing.
    pub correlation_id: Option<String>,
    /// Causation identifier for distributed tracing.
    pub causation_id: Option<String>,
    /// The actor that triggered this event, if known.
    pub actor_id: Option<String>,
    /// Free-form string headers.
    pub headers: HashMap<String, String>,
    /// Free-form structured metadata.
    pub custom_metadata: serde_json::Map<String, serde_json::Value>,
    /// Optional content fingerprint of the payload.
    pub payload_hash: Option<String>,
}

impl EventMetadata {
    /// Returns a new metadata value with `global_nonce` set, leaving `self`
    /// untouched. This is the only way `global_nonce` is ever assigned: by
    /// reconstruction, never by mutating an existing value in place.
    pub(crate) fn with_global_nonce(self, global_nonce: u64) -> Self {
        Self {
            global_nonce: Some(global_nonce),
            ..self
        }
    }
}

/// Immutable `(event, metadata)` pair; the unit of transport and storage.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct EventEnvelope<E> {
    /// The domain event payload.
    pub event: E,
    /// The metadata attached at production time.
    pub metadata: EventMetadata,
}

impl<E> EventEnvelope<E>
where
    E: DomainEvent + Serialize,
{
    /// Erases `E` to a [`GenericDomainEvent`] carrying the same JSON payload.
    ///
    /// Used at the repository boundary so the event-store client never needs
    /// to be generic over every aggregate's concrete event type.
    pub fn into_generic(self) -> DomainResult<EventEnvelope<GenericDomainEvent>> {
        let payload = serde_json::to_value(&self.event)?;
        let generic = GenericDomainEvent {
            event_type: self.event.event_type().to_string(),
            schema_version: self.event.schema_version(),
            payload,
        };
        Ok(EventEnvelope {
            event: generic,
            metadata: self.metadata,
        })
    }
}

impl EventEnvelope<GenericDomainEvent> {
    /// Recovers a concrete, typed envelope from an erased one.
    ///
    /// This is where a store-level record becomes usable by one aggregate's
    /// `rehydrate`; it is the inverse of [`EventEnvelope::into_generic`].
    pub fn into_typed<E>(self) -> DomainResult<EventEnvelope<E>>
    where
        E: DomainEvent + DeserializeOwned,
    {
        let event: E = serde_json::from_value(self.event.payload)?;
        Ok(EventEnvelope {
            event,
            metadata: self.metadata,
        })
    }
}

/// Generic domain event that allows arbitrary payload fields.
///
/// Used for deserializing events from the event store when the concrete
/// event type is not known at deserialization time — the cross-aggregate
/// store and projection layers only ever see this shape, never a specific
/// aggregate's event enum.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct GenericDomainEvent {
    /// The wire discriminator as it arrived, verbatim.
    pub event_type: String,
    /// The schema revision as it arrived.
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    /// The raw JSON payload, including the discriminator field if the
    /// concrete type tags itself internally.
    pub payload: serde_json::Value,
}

fn default_schema_version() -> u32 {
    1
}

impl DomainEvent for GenericDomainEvent {
    fn event_type(&self) -> &str {
        &self.event_type
    }

    fn schema_version(&self) -> u32 {
        self.schema_version
    }
}

/// Optional context carried from the point an event is raised into its
/// metadata. All fields default to absent/empty.
#[derive(Clone, Debug, Default)]
pub struct EventContext {
    /// Multi-tenancy identifier.
    pub tenant_id: Option<String>,
    /// Correlation identifier.
    pub correlation_id: Option<String>,
    /// Causation identifier.
    pub causation_id: Option<String>,
    /// The actor that triggered the event, if known.
    pub actor_id: Option<String>,
    /// Free-form string headers.
    pub headers: HashMap<String, String>,
    /// Free-form structured metadata.
    pub custom_metadata: serde_json::Map<String, serde_json::Value>,
}

/// Factory for creating event envelopes with generated metadata.
pub struct EventFactory;

impl EventFactory {
    /// Builds an envelope around `event`, generating `event_id` and
    /// timestamps. The resulting envelope always has `global_nonce = None`;
    /// only the store assigns that, on append.
    pub fn create<E>(
        event: E,
        aggregate_id: impl Into<String>,
        aggregate_type: impl Into<String>,
        aggregate_nonce: u64,
        context: EventContext,
    ) -> EventEnvelope<E> {
        let now = Utc::now();
        let metadata = EventMetadata {
            event_id: Uuid::now_v7(),
            timestamp: now,
            recorded_timestamp: now,
            aggregate_id: aggregate_id.into(),
            aggregate_type: aggregate_type.into(),
            aggregate_nonce,
            global_nonce: None,
            content_type: "application/json".to_string(),
            tenant_id: context.tenant_id,
            correlation_id: context.correlation_id,
            causation_id: context.causation_id,
            actor_id: context.actor_id,
            headers: context.headers,
            custom_metadata: context.custom_metadata,
            payload_hash: None,
        };
        EventEnvelope { event, metadata }
    }
}
