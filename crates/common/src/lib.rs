//! Shared value types used across the service-order crates.

mod money;
mod types;
mod version;

pub use money::Money;
pub use types::{CustomerId, EventId, OrderId, VehicleId};
pub use version::Version;
