//! Client-side event sourcing SDK: aggregates, a repository abstraction, an
//! in-memory event-store reference implementation, projections, and
//! in-process command/query buses.
//!
//! A typical flow: define domain state implementing [`EventSourced`], drive
//! it through an [`AggregateRoot`] by raising events from command handlers,
//! persist it through a [`Repository`] backed by any [`EventStore`], and
//! feed committed events to [`Projection`]s via a [`ProjectionManager`].

#![warn(missing_docs)]

mod aggregate;
mod bus;
mod config;
mod errors;
mod event;
mod projection;
mod repository;
mod store;

pub use aggregate::{
    derive_aggregate_type, AggregateRoot, CommandHandlerRegistry, CommandHandlerRegistryBuilder,
    EventHandlerRegistry, EventHandlerRegistryBuilder, EventSourced,
};
pub use bus::{CommandBus, CommandHandler, DomainCommand, DomainQuery, QueryBus, QueryHandler};
pub use config::StoreConfig;
pub use errors::{DomainError, DomainResult, EventStoreError};
pub use event::{
    DomainEvent, EventContext, EventEnvelope, EventFactory, EventMetadata, GenericDomainEvent,
};
pub use projection::{AutoDispatchProjection, Projection, ProjectionError, ProjectionManager};
pub use repository::{parse_stream_name, Repository, RepositoryFactory};
pub use store::{EventStore, InMemoryEventStore};
