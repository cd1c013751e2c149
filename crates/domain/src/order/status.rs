//! Service-order status machine.

use serde::{Deserialize, Serialize};

use super::OrderError;

/// The status of a service order in its lifecycle.
///
/// State transitions:
/// ```text
/// Received ──► Diagnosing ──► AwaitingApproval ──┬──► Executing ──► Finished ──┐
///                                                └──► Canceled ────────────────┴──► Delivered
/// ```
///
/// `Received → Diagnosing` and `Diagnosing → AwaitingApproval` also fire
/// automatically once the order has a customer and vehicle, and a positive
/// total value, respectively. `Delivered` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Order opened, vehicle not yet under diagnosis.
    #[default]
    Received,

    /// Vehicle is being diagnosed; parts and services can be added.
    Diagnosing,

    /// Budget sent to the customer, waiting for approval.
    AwaitingApproval,

    /// Budget approved, repair work in progress.
    Executing,

    /// Repair work done, vehicle ready for pickup.
    Finished,

    /// Budget rejected.
    Canceled,

    /// Vehicle handed back to the customer (terminal state).
    Delivered,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 7] = [
        OrderStatus::Received,
        OrderStatus::Diagnosing,
        OrderStatus::AwaitingApproval,
        OrderStatus::Executing,
        OrderStatus::Finished,
        OrderStatus::Canceled,
        OrderStatus::Delivered,
    ];

    /// Returns the statuses reachable from this one through a manual transition.
    pub fn manual_targets(&self) -> &'static [OrderStatus] {
        match self {
            OrderStatus::Received => &[OrderStatus::Diagnosing],
            OrderStatus::Diagnosing => &[OrderStatus::AwaitingApproval],
            OrderStatus::AwaitingApproval => &[OrderStatus::Executing, OrderStatus::Canceled],
            OrderStatus::Executing => &[OrderStatus::Finished],
            OrderStatus::Finished => &[OrderStatus::Delivered],
            OrderStatus::Canceled => &[OrderStatus::Delivered],
            OrderStatus::Delivered => &[],
        }
    }

    /// Returns true if a manual transition to `target` is allowed.
    pub fn can_transition_to(&self, target: OrderStatus) -> bool {
        self.manual_targets().contains(&target)
    }

    /// Validates an externally requested transition and returns the new status.
    pub fn transition_manually(&self, target: OrderStatus) -> Result<OrderStatus, OrderError> {
        if self.can_transition_to(target) {
            Ok(target)
        } else {
            Err(OrderError::InvalidTransition {
                from: *self,
                to: target,
            })
        }
    }

    /// Automatic transition fired once customer and vehicle are both known.
    pub fn transition_automatically_to_diagnosing(&self) -> Result<OrderStatus, OrderError> {
        self.transition_automatically(OrderStatus::Received, OrderStatus::Diagnosing)
    }

    /// Automatic transition fired once a diagnosing order gets a positive total value.
    pub fn transition_automatically_to_awaiting_approval(
        &self,
    ) -> Result<OrderStatus, OrderError> {
        self.transition_automatically(OrderStatus::Diagnosing, OrderStatus::AwaitingApproval)
    }

    fn transition_automatically(
        &self,
        required: OrderStatus,
        target: OrderStatus,
    ) -> Result<OrderStatus, OrderError> {
        if *self == required {
            Ok(target)
        } else {
            Err(OrderError::AutomaticTransition {
                from: *self,
                to: target,
            })
        }
    }

    pub fn is_received(&self) -> bool {
        matches!(self, OrderStatus::Received)
    }

    pub fn is_diagnosing(&self) -> bool {
        matches!(self, OrderStatus::Diagnosing)
    }

    pub fn is_awaiting_approval(&self) -> bool {
        matches!(self, OrderStatus::AwaitingApproval)
    }

    pub fn is_executing(&self) -> bool {
        matches!(self, OrderStatus::Executing)
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, OrderStatus::Finished)
    }

    pub fn is_canceled(&self) -> bool {
        matches!(self, OrderStatus::Canceled)
    }

    pub fn is_delivered(&self) -> bool {
        matches!(self, OrderStatus::Delivered)
    }

    /// Returns true once the repair job is over, successfully or not.
    pub fn is_concluded(&self) -> bool {
        matches!(
            self,
            OrderStatus::Finished | OrderStatus::Canceled | OrderStatus::Delivered
        )
    }

    /// Returns true while the order still needs work from the shop.
    pub fn is_in_progress(&self) -> bool {
        matches!(
            self,
            OrderStatus::Received
                | OrderStatus::Diagnosing
                | OrderStatus::AwaitingApproval
                | OrderStatus::Executing
        )
    }

    /// Returns true if parts and services can be added to the order.
    pub fn can_accept_items(&self) -> bool {
        matches!(self, OrderStatus::Diagnosing)
    }

    /// Display ordering: lower values are listed first.
    pub fn priority(&self) -> u16 {
        match self {
            OrderStatus::Executing => 1,
            OrderStatus::AwaitingApproval => 2,
            OrderStatus::Diagnosing => 3,
            OrderStatus::Received => 4,
            OrderStatus::Finished | OrderStatus::Canceled | OrderStatus::Delivered => 999,
        }
    }

    /// Returns the status name as used on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Received => "received",
            OrderStatus::Diagnosing => "diagnosing",
            OrderStatus::AwaitingApproval => "awaiting_approval",
            OrderStatus::Executing => "executing",
            OrderStatus::Finished => "finished",
            OrderStatus::Canceled => "canceled",
            OrderStatus::Delivered => "delivered",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.to_ascii_lowercase();
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == normalized)
            .ok_or_else(|| format!("unknown order status: {s}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALLOWED: [(OrderStatus, OrderStatus); 7] = [
        (OrderStatus::Received, OrderStatus::Diagnosing),
        (OrderStatus::Diagnosing, OrderStatus::AwaitingApproval),
        (OrderStatus::AwaitingApproval, OrderStatus::Executing),
        (OrderStatus::AwaitingApproval, OrderStatus::Canceled),
        (OrderStatus::Executing, OrderStatus::Finished),
        (OrderStatus::Finished, OrderStatus::Delivered),
        (OrderStatus::Canceled, OrderStatus::Delivered),
    ];

    #[test]
    fn test_default_status_is_received() {
        assert_eq!(OrderStatus::default(), OrderStatus::Received);
    }

    #[test]
    fn test_manual_transitions_follow_allow_list() {
        for from in OrderStatus::ALL {
            for to in OrderStatus::ALL {
                let result = from.transition_manually(to);
                if ALLOWED.contains(&(from, to)) {
                    assert_eq!(result.unwrap(), to, "{from} -> {to} should be allowed");
                } else {
                    assert!(
                        matches!(result, Err(OrderError::InvalidTransition { from: f, to: t }) if f == from && t == to),
                        "{from} -> {to} should be rejected"
                    );
                }
            }
        }
    }

    #[test]
    fn test_delivered_is_terminal() {
        assert!(OrderStatus::Delivered.manual_targets().is_empty());
    }

    #[test]
    fn test_automatic_transition_to_diagnosing() {
        assert_eq!(
            OrderStatus::Received
                .transition_automatically_to_diagnosing()
                .unwrap(),
            OrderStatus::Diagnosing
        );
        for status in OrderStatus::ALL.into_iter().filter(|s| !s.is_received()) {
            assert!(matches!(
                status.transition_automatically_to_diagnosing(),
                Err(OrderError::AutomaticTransition { .. })
            ));
        }
    }

    #[test]
    fn test_automatic_transition_to_awaiting_approval() {
        assert_eq!(
            OrderStatus::Diagnosing
                .transition_automatically_to_awaiting_approval()
                .unwrap(),
            OrderStatus::AwaitingApproval
        );
        for status in OrderStatus::ALL.into_iter().filter(|s| !s.is_diagnosing()) {
            assert!(status.transition_automatically_to_awaiting_approval().is_err());
        }
    }

    #[test]
    fn test_concluded_and_in_progress_partition() {
        for status in OrderStatus::ALL {
            assert_ne!(status.is_concluded(), status.is_in_progress(), "{status}");
        }
        assert!(OrderStatus::Finished.is_concluded());
        assert!(OrderStatus::Canceled.is_concluded());
        assert!(OrderStatus::Delivered.is_concluded());
    }

    #[test]
    fn test_only_diagnosing_accepts_items() {
        for status in OrderStatus::ALL {
            assert_eq!(status.can_accept_items(), status == OrderStatus::Diagnosing);
        }
    }

    #[test]
    fn test_priority_ordering() {
        assert!(OrderStatus::Executing.priority() < OrderStatus::AwaitingApproval.priority());
        assert!(OrderStatus::AwaitingApproval.priority() < OrderStatus::Diagnosing.priority());
        assert!(OrderStatus::Diagnosing.priority() < OrderStatus::Received.priority());
        assert_eq!(OrderStatus::Delivered.priority(), 999);
    }

    #[test]
    fn test_wire_names() {
        assert_eq!(
            serde_json::to_string(&OrderStatus::AwaitingApproval).unwrap(),
            "\"awaiting_approval\""
        );
        assert_eq!(
            "EXECUTING".parse::<OrderStatus>().unwrap(),
            OrderStatus::Executing
        );
        assert!("paid".parse::<OrderStatus>().is_err());
    }
}
