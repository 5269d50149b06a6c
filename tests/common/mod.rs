//! Shared aggregate fixtures for integration scenarios.
#![allow(dead_code)]

use std::sync::{Once, OnceLock};

use eventsourced::{
    derive_aggregate_type, AggregateRoot, CommandHandlerRegistry, DomainCommand, DomainEvent,
    DomainResult, EventHandlerRegistry, EventSourced,
};
use serde::{Deserialize, Serialize};

static TRACING: Once = Once::new();

/// Initializes a `tracing` subscriber once per test binary, so a scenario
/// can be re-run with `RUST_LOG=debug` to see aggregate/store/projection
/// logs rather than running fully silent.
pub fn init_tracing() {
    TRACING.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init()
            .ok();
    });
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event_type")]
pub enum AccountEvent {
    Opened { owner: String },
    Credited { amount: i64 },
    Debited { amount: i64 },
    #[serde(other)]
    Unknown,
}

impl DomainEvent for AccountEvent {
    fn event_type(&self) -> &str {
        match self {
            AccountEvent::Opened { .. } => "Opened",
            AccountEvent::Credited { .. } => "Credited",
            AccountEvent::Debited { .. } => "Debited",
            AccountEvent::Unknown => "Unknown",
        }
    }
}

#[derive(Debug)]
pub enum AccountCommand {
    Open { owner: String },
    Credit { amount: i64 },
    Debit { amount: i64 },
}

impl DomainCommand for AccountCommand {
    fn command_type(&self) -> &str {
        match self {
            AccountCommand::Open { .. } => "Open",
            AccountCommand::Credit { .. } => "Credit",
            AccountCommand::Debit { .. } => "Debit",
        }
    }
}

#[derive(Default, Debug, Clone, PartialEq)]
pub struct AccountAggregate {
    pub owner: Option<String>,
    pub balance: i64,
}

impl EventSourced for AccountAggregate {
    type Event = AccountEvent;
    type Command = AccountCommand;

    fn aggregate_type() -> &'static str {
        derive_aggregate_type("AccountAggregate")
    }

    fn event_handlers() -> &'static EventHandlerRegistry<Self> {
        static REGISTRY: OnceLock<EventHandlerRegistry<AccountAggregate>> = OnceLock::new();
        REGISTRY.get_or_init(|| {
            EventHandlerRegistry::builder()
                .on("Opened", |state, event| {
                    if let AccountEvent::Opened { owner } = event {
                        state.owner = Some(owner.clone());
                    }
                })
                .on("Credited", |state, event| {
                    if let AccountEvent::Credited { amount } = event {
                        state.balance += amount;
                    }
                })
                .on("Debited", |state, event| {
                    if let AccountEvent::Debited { amount } = event {
                        state.balance -= amount;
                    }
                })
                .build()
        })
    }

    fn command_handlers() -> &'static CommandHandlerRegistry<Self> {
        static REGISTRY: OnceLock<CommandHandlerRegistry<AccountAggregate>> = OnceLock::new();
        REGISTRY.get_or_init(|| {
            CommandHandlerRegistry::builder()
                .on("Open", |root, command| {
                    let AccountCommand::Open { owner } = command else {
                        unreachable!()
                    };
                    root.raise_event(AccountEvent::Opened { owner })
                })
                .on("Credit", |root, command| {
                    let AccountCommand::Credit { amount } = command else {
                        unreachable!()
                    };
                    if amount <= 0 {
                        return Err(eventsourced::DomainError::CommandValidation {
                            command_type: "Credit".to_string(),
                            errors: vec!["amount must be positive".to_string()],
                        });
                    }
                    root.raise_event(AccountEvent::Credited { amount })
                })
                .on("Debit", |root, command| {
                    let AccountCommand::Debit { amount } = command else {
                        unreachable!()
                    };
                    if amount > root.balance {
                        return Err(eventsourced::DomainError::CommandValidation {
                            command_type: "Debit".to_string(),
                            errors: vec!["insufficient balance".to_string()],
                        });
                    }
                    root.raise_event(AccountEvent::Debited { amount })
                })
                .build()
        })
    }
}

pub fn open_account(id: &str, owner: &str) -> DomainResult<AggregateRoot<AccountAggregate>> {
    let mut root = AggregateRoot::<AccountAggregate>::new();
    root.initialize(id)?;
    root.handle_command(AccountCommand::Open {
        owner: owner.to_string(),
    })?;
    Ok(root)
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event_type")]
pub enum TaskEvent {
    Created { title: String },
    Completed,
    #[serde(other)]
    Unknown,
}

impl DomainEvent for TaskEvent {
    fn event_type(&self) -> &str {
        match self {
            TaskEvent::Created { .. } => "Created",
            TaskEvent::Completed => "Completed",
            TaskEvent::Unknown => "Unknown",
        }
    }
}

#[derive(Debug)]
pub enum TaskCommand {
    Create { title: String },
    Complete,
}

impl DomainCommand for TaskCommand {
    fn command_type(&self) -> &str {
        match self {
            TaskCommand::Create { .. } => "Create",
            TaskCommand::Complete => "Complete",
        }
    }
}

#[derive(Default, Debug, Clone, PartialEq)]
pub struct TaskAggregate {
    pub title: Option<String>,
    pub completed: bool,
}

impl EventSourced for TaskAggregate {
    type Event = TaskEvent;
    type Command = TaskCommand;

    fn aggregate_type() -> &'static str {
        derive_aggregate_type("TaskAggregate")
    }

    fn event_handlers() -> &'static EventHandlerRegistry<Self> {
        static REGISTRY: OnceLock<EventHandlerRegistry<TaskAggregate>> = OnceLock::new();
        REGISTRY.get_or_init(|| {
            EventHandlerRegistry::builder()
                .on("Created", |state, event| {
                    if let TaskEvent::Created { title } = event {
                        state.title = Some(title.clone());
                    }
                })
                .on("Completed", |state, _event| {
                    state.completed = true;
                })
                .build()
        })
    }

    fn command_handlers() -> &'static CommandHandlerRegistry<Self> {
        static REGISTRY: OnceLock<CommandHandlerRegistry<TaskAggregate>> = OnceLock::new();
        REGISTRY.get_or_init(|| {
            CommandHandlerRegistry::builder()
                .on("Create", |root, command| {
                    let TaskCommand::Create { title } = command else {
                        unreachable!()
                    };
                    root.raise_event(TaskEvent::Created { title })
                })
                .on("Complete", |root, _command| root.raise_event(TaskEvent::Completed))
                .build()
        })
    }
}
