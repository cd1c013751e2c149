//! Messaging layer for the service-order saga.
//!
//! - [`EventEnvelope`]: the versioned wire wrapper placed on queues
//! - [`SagaEvent`]: closed set of saga events with typed payloads
//! - [`QueueClient`]: send / receive / delete over a queue transport,
//!   with in-memory and PostgreSQL implementations
//! - [`EventPublisher`]: fire-and-forget fan-out of envelopes

pub mod envelope;
pub mod error;
pub mod events;
pub mod memory;
pub mod postgres;
pub mod publisher;
pub mod queue;

pub use envelope::{ENVELOPE_VERSION, EventEnvelope};
pub use error::{MessagingError, Result};
pub use events::{
    BudgetApprovedPayload, BudgetRejectedPayload, EventType, ExecutionFinishedPayload,
    ExecutionStartedPayload, OrderCreatedPayload, SagaEvent,
};
pub use memory::InMemoryQueue;
pub use postgres::PgQueueClient;
pub use publisher::{EventPublisher, PublishOutcome, PublishReport};
pub use queue::{QueueClient, QueueMessage, QueueSettings};
