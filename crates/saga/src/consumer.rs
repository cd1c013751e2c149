//! Long-running queue consumer.

use std::sync::Arc;
use std::time::Duration;

use messaging::{MessagingError, QueueClient, QueueMessage};
use tokio::sync::watch;

use crate::dispatcher::{EventDispatcher, ProcessOutcome};

/// Pacing of the consumer loop.
#[derive(Debug, Clone, Copy)]
pub struct ConsumerSettings {
    /// Pause after a receive that returned nothing.
    pub idle_interval: Duration,

    /// Pause after a failed receive.
    pub error_backoff: Duration,
}

impl Default for ConsumerSettings {
    fn default() -> Self {
        Self {
            idle_interval: Duration::from_secs(1),
            error_backoff: Duration::from_secs(5),
        }
    }
}

/// Receives messages from the dispatcher's queue and processes them one at a time.
pub struct QueueConsumer<Q: QueueClient> {
    dispatcher: Arc<EventDispatcher<Q>>,
    settings: ConsumerSettings,
}

impl<Q: QueueClient> QueueConsumer<Q> {
    pub fn new(dispatcher: Arc<EventDispatcher<Q>>, settings: ConsumerSettings) -> Self {
        Self {
            dispatcher,
            settings,
        }
    }

    pub fn dispatcher(&self) -> &EventDispatcher<Q> {
        &self.dispatcher
    }

    /// Receives one batch and processes every message in it.
    pub async fn poll_once(&self) -> Result<Vec<ProcessOutcome>, MessagingError> {
        let messages = self.receive().await?;

        let mut outcomes = Vec::with_capacity(messages.len());
        for message in &messages {
            outcomes.push(self.dispatcher.process_message(message).await);
        }
        Ok(outcomes)
    }

    /// Runs until `shutdown` turns true or its sender is dropped.
    ///
    /// Shutdown interrupts a pending receive but never a message that is
    /// being processed: the current message runs to completion (including its
    /// acknowledgment) and the rest of the batch is left untouched for
    /// redelivery. Errors never stop the loop: failed receives are logged and
    /// retried after the back-off.
    #[tracing::instrument(skip_all, fields(queue_url = %self.dispatcher.queue_url()))]
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(
            handlers = self.dispatcher.handler_count(),
            "queue consumer started"
        );

        while !*shutdown.borrow() {
            let received = tokio::select! {
                received = self.receive() => received,
                _ = shutdown.changed() => break,
            };

            let pause = match received {
                Ok(messages) if messages.is_empty() => self.settings.idle_interval,
                Ok(messages) => {
                    self.process_until_shutdown(&messages, &shutdown).await;
                    continue;
                }
                Err(e) => {
                    tracing::error!(error = %e, "failed to receive messages");
                    self.settings.error_backoff
                }
            };

            tokio::select! {
                _ = tokio::time::sleep(pause) => {}
                _ = shutdown.changed() => break,
            }
        }

        tracing::info!("queue consumer stopped");
    }

    async fn receive(&self) -> Result<Vec<QueueMessage>, MessagingError> {
        self.dispatcher
            .queue()
            .receive(self.dispatcher.queue_url())
            .await
    }

    async fn process_until_shutdown(
        &self,
        messages: &[QueueMessage],
        shutdown: &watch::Receiver<bool>,
    ) {
        let mut deleted = 0;
        for (processed, message) in messages.iter().enumerate() {
            if *shutdown.borrow() {
                tracing::info!(
                    processed,
                    skipped = messages.len() - processed,
                    "shutdown requested, leaving rest of batch for redelivery"
                );
                return;
            }
            if self.dispatcher.process_message(message).await.is_deleted() {
                deleted += 1;
            }
        }
        tracing::debug!(processed = messages.len(), deleted, "batch processed");
    }
}
