//! Service order aggregate root.

use chrono::{DateTime, TimeDelta, Utc};
use common::{CustomerId, Money, OrderId, VehicleId, Version};
use serde::{Deserialize, Serialize};

use super::{ExecutionPeriod, OrderError, OrderStatus};

/// A repair job from intake to delivery.
///
/// Every mutator takes the current time explicitly and is atomic: when it
/// returns an error, neither the status nor the execution period has changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    id: OrderId,

    /// Current version for optimistic concurrency.
    #[serde(default)]
    version: Version,

    status: OrderStatus,

    /// Budget total; never negative.
    total_value: Money,

    customer_id: Option<CustomerId>,

    /// Only set once a customer is set.
    vehicle_id: Option<VehicleId>,

    execution: ExecutionPeriod,

    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,

    /// When the order entered its current status.
    status_entered_at: DateTime<Utc>,
}

impl Order {
    /// Opens a new order with a generated id.
    ///
    /// When both a customer and a vehicle are given the order starts out
    /// diagnosing.
    pub fn create(
        customer_id: Option<CustomerId>,
        vehicle_id: Option<VehicleId>,
        now: DateTime<Utc>,
    ) -> Result<Self, OrderError> {
        Self::create_with_id(OrderId::new(), customer_id, vehicle_id, now)
    }

    /// Opens a new order with the given id.
    pub fn create_with_id(
        id: OrderId,
        customer_id: Option<CustomerId>,
        vehicle_id: Option<VehicleId>,
        now: DateTime<Utc>,
    ) -> Result<Self, OrderError> {
        if vehicle_id.is_some() && customer_id.is_none() {
            return Err(OrderError::VehicleRequiresCustomer);
        }

        let mut order = Self {
            id,
            version: Version::initial(),
            status: OrderStatus::Received,
            total_value: Money::zero(),
            customer_id,
            vehicle_id,
            execution: ExecutionPeriod::new(),
            created_at: now,
            updated_at: now,
            status_entered_at: now,
        };
        order.diagnose_if_complete(now);
        Ok(order)
    }

    // Queries

    pub fn id(&self) -> &OrderId {
        &self.id
    }

    pub fn version(&self) -> Version {
        self.version
    }

    /// Sets the stored version. Called by repositories after a successful save.
    pub fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn total_value(&self) -> Money {
        self.total_value
    }

    pub fn customer_id(&self) -> Option<&CustomerId> {
        self.customer_id.as_ref()
    }

    pub fn vehicle_id(&self) -> Option<&VehicleId> {
        self.vehicle_id.as_ref()
    }

    pub fn execution(&self) -> &ExecutionPeriod {
        &self.execution
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn status_entered_at(&self) -> DateTime<Utc> {
        self.status_entered_at
    }

    /// Time spent in the current status as of `now`.
    pub fn time_in_status(&self, now: DateTime<Utc>) -> TimeDelta {
        now - self.status_entered_at
    }

    /// Returns true if parts and services can be added.
    pub fn can_accept_items(&self) -> bool {
        self.status.can_accept_items()
    }

    pub fn is_awaiting_approval(&self) -> bool {
        self.status.is_awaiting_approval()
    }

    pub fn is_concluded(&self) -> bool {
        self.status.is_concluded()
    }

    /// Whole days the repair took, rounded up. `None` until execution finished.
    pub fn execution_duration_days(&self) -> Option<i64> {
        self.execution.duration_days()
    }

    // Mutators

    /// Sets or replaces the customer.
    pub fn set_customer(&mut self, customer_id: CustomerId, now: DateTime<Utc>) {
        self.customer_id = Some(customer_id);
        self.updated_at = now;
        self.diagnose_if_complete(now);
    }

    /// Sets or replaces the vehicle. Requires a customer.
    pub fn set_vehicle(&mut self, vehicle_id: VehicleId, now: DateTime<Utc>) -> Result<(), OrderError> {
        if self.customer_id.is_none() {
            return Err(OrderError::VehicleRequiresCustomer);
        }

        self.vehicle_id = Some(vehicle_id);
        self.updated_at = now;
        self.diagnose_if_complete(now);
        Ok(())
    }

    /// Sets the budget total.
    ///
    /// A positive total on a diagnosing order sends it to the customer for approval.
    pub fn set_total_value(&mut self, amount: Money, now: DateTime<Utc>) -> Result<(), OrderError> {
        if amount.is_negative() {
            return Err(OrderError::NegativeTotalValue {
                cents: amount.cents(),
            });
        }

        self.total_value = amount;
        self.updated_at = now;

        if amount.is_positive() && self.can_accept_items() {
            let next = self.status.transition_automatically_to_awaiting_approval()?;
            self.change_status(next, now);
        }
        Ok(())
    }

    /// Moves the order to `target` if the allow-list permits it.
    ///
    /// Entering `Executing` starts the execution period; entering `Finished`
    /// finishes it, which fails if it never started.
    pub fn update_status_manually(
        &mut self,
        target: OrderStatus,
        now: DateTime<Utc>,
    ) -> Result<(), OrderError> {
        let next = self.status.transition_manually(target)?;

        let execution = match next {
            OrderStatus::Executing if !self.execution.is_started() => self.execution.start(now)?,
            OrderStatus::Finished if !self.execution.is_finished() => {
                self.execution.finish(now)?
            }
            _ => self.execution,
        };

        self.execution = execution;
        self.change_status(next, now);
        Ok(())
    }

    /// Approves the budget: the order starts executing.
    pub fn approve_budget(&mut self, now: DateTime<Utc>) -> Result<(), OrderError> {
        self.require_awaiting_approval("approve budget")?;

        let next = self.status.transition_manually(OrderStatus::Executing)?;
        self.execution = self.execution.start(now)?;
        self.change_status(next, now);
        Ok(())
    }

    /// Rejects the budget: the order is canceled.
    pub fn reject_budget(&mut self, now: DateTime<Utc>) -> Result<(), OrderError> {
        self.require_awaiting_approval("reject budget")?;

        let next = self.status.transition_manually(OrderStatus::Canceled)?;
        self.change_status(next, now);
        Ok(())
    }

    fn require_awaiting_approval(&self, action: &'static str) -> Result<(), OrderError> {
        if self.is_awaiting_approval() {
            Ok(())
        } else {
            Err(OrderError::BudgetNotAwaitingApproval {
                action,
                current: self.status,
            })
        }
    }

    /// Fires the automatic move to diagnosing once customer and vehicle are known.
    fn diagnose_if_complete(&mut self, now: DateTime<Utc>) {
        if self.customer_id.is_none() || self.vehicle_id.is_none() {
            return;
        }
        if let Ok(next) = self.status.transition_automatically_to_diagnosing() {
            self.change_status(next, now);
        }
    }

    fn change_status(&mut self, next: OrderStatus, now: DateTime<Utc>) {
        tracing::debug!(order_id = %self.id, from = %self.status, to = %next, "order status changed");
        self.status = next;
        self.status_entered_at = now;
        self.updated_at = now;
    }
}
