//! Event handler trait.

use async_trait::async_trait;
use messaging::{EventEnvelope, SagaEvent};

use crate::Result;

/// Reacts to one type of saga event.
///
/// Returning an error leaves the message on the queue for redelivery.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Returns a human-readable name for logging.
    fn name(&self) -> &'static str;

    /// Handles a decoded envelope.
    async fn handle(&self, envelope: &EventEnvelope<SagaEvent>) -> Result<()>;
}
