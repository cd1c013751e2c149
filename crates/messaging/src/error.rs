use thiserror::Error;

/// Errors that can occur when encoding envelopes or talking to a queue.
#[derive(Debug, Error)]
pub enum MessagingError {
    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The envelope carries an event type this service does not know.
    #[error("Unknown event type: {0}")]
    UnknownEventType(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// The receipt handle is malformed.
    #[error("Invalid receipt handle: {0}")]
    InvalidReceipt(String),

    /// No in-flight message matches the receipt handle (deleted, or redelivered since).
    #[error("Receipt handle not found: {0}")]
    ReceiptNotFound(String),

    /// The queue transport refused the operation.
    #[error("Queue unavailable: {0}")]
    Unavailable(String),
}

/// Result type for messaging operations.
pub type Result<T> = std::result::Result<T, MessagingError>;
