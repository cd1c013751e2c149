//! Queue transport abstraction.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::{MessagingError, Result};

/// A message received from a queue.
///
/// The message stays on the queue, invisible to other receivers, until it is
/// deleted with its `receipt_handle` or its visibility timeout lapses.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueMessage {
    /// Transport-assigned message identifier.
    pub message_id: i64,

    /// Handle that acknowledges this particular receipt of the message.
    pub receipt_handle: String,

    /// Raw message body.
    pub body: String,

    /// How many times the message has been received, this receipt included.
    pub receive_count: u32,

    /// When the message was first enqueued.
    pub enqueued_at: DateTime<Utc>,
}

/// Receive-side tuning shared by the queue clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueSettings {
    /// Maximum number of messages returned by one receive call.
    pub max_messages: usize,

    /// How long a receive call may wait for messages to arrive (long poll).
    pub wait_time: Duration,

    /// How long a received message stays invisible before it is redelivered.
    pub visibility_timeout: Duration,

    /// Interval between polls while long-polling.
    pub poll_interval: Duration,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            max_messages: 10,
            wait_time: Duration::from_secs(20),
            visibility_timeout: Duration::from_secs(30),
            poll_interval: Duration::from_millis(500),
        }
    }
}

/// Client for an at-least-once message queue addressed by URL.
#[async_trait]
pub trait QueueClient: Send + Sync {
    /// Enqueues a message body, returning the assigned message ID.
    async fn send(&self, queue_url: &str, body: &str) -> Result<i64>;

    /// Receives up to the configured number of visible messages.
    ///
    /// May return an empty batch.
    async fn receive(&self, queue_url: &str) -> Result<Vec<QueueMessage>>;

    /// Deletes (acknowledges) a previously received message.
    async fn delete(&self, queue_url: &str, receipt_handle: &str) -> Result<()>;
}

/// Builds the receipt handle for one receipt of a message.
///
/// The receive count is part of the handle so a handle from an earlier
/// receipt cannot delete a message that has since been redelivered.
pub(crate) fn receipt_handle(message_id: i64, receive_count: u32) -> String {
    format!("{message_id}:{receive_count}")
}

/// Splits a receipt handle into message ID and receive count.
pub(crate) fn parse_receipt_handle(handle: &str) -> Result<(i64, u32)> {
    let invalid = || MessagingError::InvalidReceipt(handle.to_string());
    let (id, count) = handle.split_once(':').ok_or_else(invalid)?;
    let id = id.parse().map_err(|_| invalid())?;
    let count = count.parse().map_err(|_| invalid())?;
    Ok((id, count))
}
