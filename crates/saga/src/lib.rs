//! Event-driven saga for service orders.
//!
//! Order management takes part in a choreography with billing and production:
//! - [`EventDispatcher`]: parses queue messages and routes them to one
//!   [`EventHandler`] per event type, acknowledging only on success
//! - [`handlers`]: adapters from saga events to order use cases
//! - [`QueueConsumer`]: the receive loop feeding the dispatcher

pub mod consumer;
pub mod dispatcher;
pub mod error;
pub mod handler;
pub mod handlers;

pub use consumer::{ConsumerSettings, QueueConsumer};
pub use dispatcher::{DispatcherBuilder, EventDispatcher, ProcessOutcome};
pub use error::{Result, SagaError};
pub use handler::EventHandler;
pub use handlers::register_order_handlers;
