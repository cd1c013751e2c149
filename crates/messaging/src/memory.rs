//! In-memory queue transport.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::error::{MessagingError, Result};
use crate::queue::{QueueClient, QueueMessage, QueueSettings, parse_receipt_handle, receipt_handle};

#[derive(Debug, Clone)]
struct StoredMessage {
    message_id: i64,
    body: String,
    receive_count: u32,
    enqueued_at: DateTime<Utc>,
    visible_at: Instant,
}

#[derive(Debug, Default)]
struct InMemoryQueueState {
    queues: HashMap<String, Vec<StoredMessage>>,
    next_id: i64,
    unavailable: HashSet<String>,
}

/// In-memory queue with visibility-timeout semantics.
///
/// Used for local runs and tests. Receives never block: an empty queue
/// yields an empty batch immediately.
#[derive(Debug, Clone, Default)]
pub struct InMemoryQueue {
    state: Arc<Mutex<InMemoryQueueState>>,
    settings: QueueSettings,
}

impl InMemoryQueue {
    /// Creates a new in-memory queue with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new in-memory queue with the given receive settings.
    pub fn with_settings(settings: QueueSettings) -> Self {
        Self {
            state: Arc::default(),
            settings,
        }
    }

    /// Makes every `send` to `queue_url` fail, or restores it.
    pub async fn set_unavailable(&self, queue_url: &str, unavailable: bool) {
        let mut state = self.state.lock().await;
        if unavailable {
            state.unavailable.insert(queue_url.to_string());
        } else {
            state.unavailable.remove(queue_url);
        }
    }

    /// Returns the number of messages (visible or in flight) on a queue.
    pub async fn total_count(&self, queue_url: &str) -> usize {
        let state = self.state.lock().await;
        state.queues.get(queue_url).map_or(0, Vec::len)
    }

    /// Returns the number of messages currently available for receipt.
    pub async fn visible_count(&self, queue_url: &str) -> usize {
        let now = Instant::now();
        let state = self.state.lock().await;
        state
            .queues
            .get(queue_url)
            .map_or(0, |q| q.iter().filter(|m| m.visible_at <= now).count())
    }

    /// Returns the number of received-but-not-deleted messages still hidden.
    pub async fn in_flight_count(&self, queue_url: &str) -> usize {
        let now = Instant::now();
        let state = self.state.lock().await;
        state
            .queues
            .get(queue_url)
            .map_or(0, |q| q.iter().filter(|m| m.visible_at > now).count())
    }

    /// Returns the bodies of all messages on a queue in enqueue order.
    pub async fn bodies(&self, queue_url: &str) -> Vec<String> {
        let state = self.state.lock().await;
        state
            .queues
            .get(queue_url)
            .map(|q| q.iter().map(|m| m.body.clone()).collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl QueueClient for InMemoryQueue {
    async fn send(&self, queue_url: &str, body: &str) -> Result<i64> {
        let mut state = self.state.lock().await;

        if state.unavailable.contains(queue_url) {
            return Err(MessagingError::Unavailable(queue_url.to_string()));
        }

        state.next_id += 1;
        let message_id = state.next_id;
        state
            .queues
            .entry(queue_url.to_string())
            .or_default()
            .push(StoredMessage {
                message_id,
                body: body.to_string(),
                receive_count: 0,
                enqueued_at: Utc::now(),
                visible_at: Instant::now(),
            });

        Ok(message_id)
    }

    async fn receive(&self, queue_url: &str) -> Result<Vec<QueueMessage>> {
        let now = Instant::now();
        let hidden_until = now + self.settings.visibility_timeout;
        let mut state = self.state.lock().await;

        let Some(queue) = state.queues.get_mut(queue_url) else {
            return Ok(Vec::new());
        };

        let received = queue
            .iter_mut()
            .filter(|m| m.visible_at <= now)
            .take(self.settings.max_messages)
            .map(|m| {
                m.receive_count += 1;
                m.visible_at = hidden_until;
                QueueMessage {
                    message_id: m.message_id,
                    receipt_handle: receipt_handle(m.message_id, m.receive_count),
                    body: m.body.clone(),
                    receive_count: m.receive_count,
                    enqueued_at: m.enqueued_at,
                }
            })
            .collect();

        Ok(received)
    }

    async fn delete(&self, queue_url: &str, receipt: &str) -> Result<()> {
        let (message_id, receive_count) = parse_receipt_handle(receipt)?;
        let mut state = self.state.lock().await;

        let queue = state
            .queues
            .get_mut(queue_url)
            .ok_or_else(|| MessagingError::ReceiptNotFound(receipt.to_string()))?;

        let position = queue
            .iter()
            .position(|m| m.message_id == message_id && m.receive_count == receive_count)
            .ok_or_else(|| MessagingError::ReceiptNotFound(receipt.to_string()))?;

        queue.remove(position);
        Ok(())
    }
}
