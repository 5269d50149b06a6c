//! In-process command and query buses (C8).
//!
//! Both buses are registration-time typed but route at runtime on a string
//! discriminator, the same way aggregate event/command handler registries do
//! (C9). Neither bus provides timeouts, retries, or persistence; they are a
//! thin, in-process dispatch layer only.

use std::any::Any;
use std::collections::HashMap;

use async_trait::async_trait;

use crate::errors::{DomainError, DomainResult};

/// Contract every command value implements: a stable wire type name.
pub trait DomainCommand: std::fmt::Debug + Send + Sync + 'static {
    /// The wire discriminator used to look up a registered handler.
    fn command_type(&self) -> &str;
}

/// Contract every query value implements: a stable wire type name.
pub trait DomainQuery: std::fmt::Debug + Send + Sync + 'static {
    /// The wire discriminator used to look up a registered handler.
    fn query_type(&self) -> &str;
}

/// Handles one concrete command type.
#[async_trait]
pub trait CommandHandler<C: DomainCommand>: Send + Sync {
    /// Validate and execute `command`, returning only an acknowledgment.
    async fn handle(&self, command: C) -> DomainResult<()>;
}

/// Handles one concrete query type, producing a result.
#[async_trait]
pub trait QueryHandler<Q: DomainQuery>: Send + Sync {
    /// The value returned for a successful query.
    type Result: Send;

    /// Execute `query` and return its result.
    async fn handle(&self, query: Q) -> DomainResult<Self::Result>;
}

#[async_trait]
trait ErasedCommandHandler: Send + Sync {
    async fn handle_erased(&self, command_type: &str, command: Box<dyn Any + Send>) -> DomainResult<()>;
}

struct TypedCommandHandler<C, H> {
    handler: H,
    _marker: std::marker::PhantomData<fn(C)>,
}

#[async_trait]
impl<C, H> ErasedCommandHandler for TypedCommandHandler<C, H>
where
    C: DomainCommand,
    H: CommandHandler<C> + Send + Sync,
{
    async fn handle_erased(&self, command_type: &str, command: Box<dyn Any + Send>) -> DomainResult<()> {
        let command = match command.downcast::<C>() {
            Ok(command) => *command,
            Err(_) => return Err(handler_type_mismatch(command_type)),
        };
        self.handler.handle(command).await
    }
}

/// In-process command bus. Routes each [`DomainCommand`] by its
/// `command_type()` string to a registered [`CommandHandler`].
#[derive(Default)]
pub struct CommandBus {
    handlers: HashMap<String, Box<dyn ErasedCommandHandler>>,
}

impl CommandBus {
    /// Creates an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for commands whose `command_type()` equals `command_type`.
    pub fn register<C, H>(&mut self, command_type: impl Into<String>, handler: H)
    where
        C: DomainCommand,
        H: CommandHandler<C> + Send + Sync + 'static,
    {
        self.handlers.insert(
            command_type.into(),
            Box::new(TypedCommandHandler::<C, H> {
                handler,
                _marker: std::marker::PhantomData,
            }),
        );
    }

    /// Dispatches `command` to its registered handler.
    ///
    /// Fails with [`DomainError::CommandValidation`] if nothing is registered
    /// for this command's `command_type()`.
    pub async fn send<C: DomainCommand>(&self, command: C) -> DomainResult<()> {
        let command_type = command.command_type().to_string();
        match self.handlers.get(&command_type) {
            Some(handler) => handler.handle_erased(&command_type, Box::new(command)).await,
            None => {
                tracing::warn!(command_type = %command_type, "no handler registered for command");
                Err(DomainError::CommandValidation {
                    command_type,
                    errors: vec!["no handler registered for this command type".to_string()],
                })
            }
        }
    }
}

#[async_trait]
trait ErasedQueryHandler: Send + Sync {
    async fn handle_erased(&self, query_type: &str, query: Box<dyn Any + Send>) -> DomainResult<Box<dyn Any + Send>>;
}

struct TypedQueryHandler<Q, H> {
    handler: H,
    _marker: std::marker::PhantomData<fn(Q)>,
}

#[async_trait]
impl<Q, H> ErasedQueryHandler for TypedQueryHandler<Q, H>
where
    Q: DomainQuery,
    H: QueryHandler<Q> + Send + Sync,
    H::Result: Send + 'static,
{
    async fn handle_erased(&self, query_type: &str, query: Box<dyn Any + Send>) -> DomainResult<Box<dyn Any + Send>> {
        let query = match query.downcast::<Q>() {
            Ok(query) => *query,
            Err(_) => return Err(handler_type_mismatch(query_type)),
        };
        let result = self.handler.handle(query).await?;
        Ok(Box::new(result))
    }
}

/// Builds the graceful failure for a registry invariant violation: a handler
/// registered under this type string whose concrete command/query/result
/// type does not match what the caller sent or expects. Two distinct
/// `DomainCommand`/`DomainQuery` types can legitimately produce the same
/// wire string by mistake, since dispatch is keyed on that string rather
/// than on Rust's type system — this degrades to an error instead of the
/// panic a raw `downcast().unwrap()` would give.
fn handler_type_mismatch(type_name: &str) -> DomainError {
    DomainError::CommandValidation {
        command_type: type_name.to_string(),
        errors: vec![format!(
            "handler registered under '{type_name}' does not match the expected concrete type"
        )],
    }
}

/// In-process query bus. Routes each [`DomainQuery`] by its `query_type()`
/// string to a registered [`QueryHandler`], returning a typed result.
#[derive(Default)]
pub struct QueryBus {
    handlers: HashMap<String, Box<dyn ErasedQueryHandler>>,
}

impl QueryBus {
    /// Creates an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for queries whose `query_type()` equals `query_type`.
    pub fn register<Q, H>(&mut self, query_type: impl Into<String>, handler: H)
    where
        Q: DomainQuery,
        H: QueryHandler<Q> + Send + Sync + 'static,
        H::Result: Send + 'static,
    {
        self.handlers.insert(
            query_type.into(),
            Box::new(TypedQueryHandler::<Q, H> {
                handler,
                _marker: std::marker::PhantomData,
            }),
        );
    }

    /// Dispatches `query` to its registered handler and downcasts the result to `R`.
    ///
    /// Fails with [`DomainError::CommandValidation`] if nothing is registered
    /// for this query's `query_type()`, mirroring the command bus's own
    /// missing-handler failure.
    pub async fn send<Q: DomainQuery, R: 'static>(&self, query: Q) -> DomainResult<R> {
        let query_type = query.query_type().to_string();
        match self.handlers.get(&query_type) {
            Some(handler) => {
                let boxed = handler.handle_erased(&query_type, Box::new(query)).await?;
                boxed
                    .downcast::<R>()
                    .map(|result| *result)
                    .map_err(|_| handler_type_mismatch(&query_type))
            }
            None => {
                tracing::warn!(query_type = %query_type, "no handler registered for query");
                Err(DomainError::CommandValidation {
                    command_type: query_type,
                    errors: vec!["no handler registered for this query type".to_string()],
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Ping;
    impl DomainCommand for Ping {
        fn command_type(&self) -> &str {
            "Ping"
        }
    }

    struct PingHandler;
    #[async_trait]
    impl CommandHandler<Ping> for PingHandler {
        async fn handle(&self, _command: Ping) -> DomainResult<()> {
            Ok(())
        }
    }

    #[derive(Debug)]
    struct CountQuery;
    impl DomainQuery for CountQuery {
        fn query_type(&self) -> &str {
            "Count"
        }
    }

    struct CountHandler;
    #[async_trait]
    impl QueryHandler<CountQuery> for CountHandler {
        type Result = u32;
        async fn handle(&self, _query: CountQuery) -> DomainResult<u32> {
            Ok(42)
        }
    }

    #[tokio::test]
    async fn command_bus_dispatches_to_registered_handler() {
        let mut bus = CommandBus::new();
        bus.register("Ping", PingHandler);
        bus.send(Ping).await.unwrap();
    }

    #[tokio::test]
    async fn command_bus_reports_missing_handler_as_command_validation() {
        let bus = CommandBus::new();
        let err = bus.send(Ping).await.unwrap_err();
        assert_eq!(err.code(), "CommandValidation");
    }

    #[derive(Debug)]
    struct Pong;
    impl DomainCommand for Pong {
        fn command_type(&self) -> &str {
            "Ping" // deliberately colliding with `Ping`'s wire type
        }
    }

    #[tokio::test]
    async fn a_command_type_string_collision_degrades_to_an_error_not_a_panic() {
        let mut bus = CommandBus::new();
        bus.register::<Ping, _>("Ping", PingHandler);

        let err = bus.send(Pong).await.unwrap_err();
        assert_eq!(err.code(), "CommandValidation");
    }

    #[tokio::test]
    async fn query_bus_dispatches_and_downcasts_result() {
        let mut bus = QueryBus::new();
        bus.register("Count", CountHandler);
        let result: u32 = bus.send(CountQuery).await.unwrap();
        assert_eq!(result, 42);
    }

    #[tokio::test]
    async fn a_result_type_mismatch_degrades_to_an_error_not_a_panic() {
        let mut bus = QueryBus::new();
        bus.register("Count", CountHandler);
        let err = bus.send::<CountQuery, String>(CountQuery).await.unwrap_err();
        assert_eq!(err.code(), "CommandValidation");
    }
}
