//! Saga error types.

use domain::DomainError;
use messaging::{EventType, MessagingError};
use thiserror::Error;

/// Errors that can occur while consuming saga events.
#[derive(Debug, Error)]
pub enum SagaError {
    /// The message body is not a valid envelope, or its payload does not
    /// match its event type.
    #[error("Message parse failure: {0}")]
    MessageParse(String),

    /// The order use case rejected the event.
    #[error("Handler execution failure: {0}")]
    Domain(#[from] DomainError),

    /// The queue transport failed.
    #[error("Queue error: {0}")]
    Queue(#[from] MessagingError),

    /// A handler was given an event of a type it is not registered for.
    #[error("Handler for {expected} received {actual}")]
    UnexpectedEvent {
        expected: EventType,
        actual: EventType,
    },
}

impl SagaError {
    /// Returns true if redelivering the message may succeed without a code change.
    ///
    /// Business-rule violations are reported as not retryable: they only clear
    /// if another event moves the order first.
    pub fn is_retryable(&self) -> bool {
        match self {
            SagaError::Domain(e) => e.is_retryable(),
            SagaError::Queue(_) => true,
            SagaError::MessageParse(_) | SagaError::UnexpectedEvent { .. } => false,
        }
    }
}

/// Convenience type alias for saga results.
pub type Result<T> = std::result::Result<T, SagaError>;
