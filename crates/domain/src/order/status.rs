//! Order status lifecycle.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::OrderError;

/// The status of an order in its lifecycle.
///
/// Status only ever moves forward:
/// ```text
/// Pending ──► WaitingForKitchen ──► ReadyForDelivery ──► DeliveryStarted ──► DeliveryCompleted
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Persisted, waiting for the inventory reservation.
    #[default]
    Pending,

    /// Stock reserved; handed to the kitchen.
    WaitingForKitchen,

    /// Cooked; handed to delivery.
    ReadyForDelivery,

    /// A driver picked the order up.
    DeliveryStarted,

    /// Delivered (terminal state).
    DeliveryCompleted,
}

/// Result of asking for a status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusChange {
    /// The status moved forward.
    Advanced { from: OrderStatus, to: OrderStatus },
    /// The order already had the requested status.
    Unchanged,
    /// The order is already past the requested status; nothing was written.
    Stale { current: OrderStatus },
    /// The requested status is not reachable from the current one; nothing
    /// was written.
    Skipped { current: OrderStatus },
}

impl StatusChange {
    pub fn is_advanced(&self) -> bool {
        matches!(self, StatusChange::Advanced { .. })
    }
}

impl OrderStatus {
    fn rank(&self) -> u8 {
        match self {
            OrderStatus::Pending => 0,
            OrderStatus::WaitingForKitchen => 1,
            OrderStatus::ReadyForDelivery => 2,
            OrderStatus::DeliveryStarted => 3,
            OrderStatus::DeliveryCompleted => 4,
        }
    }

    /// Decides what moving from this status to `target` means.
    ///
    /// A pending order only ever leaves for `WaitingForKitchen`. Past that
    /// point forward jumps are accepted so a reordered delivery event still
    /// lands.
    pub fn transition_to(&self, target: OrderStatus) -> StatusChange {
        match self.rank().cmp(&target.rank()) {
            std::cmp::Ordering::Less
                if *self == OrderStatus::Pending && target != OrderStatus::WaitingForKitchen =>
            {
                StatusChange::Skipped { current: *self }
            }
            std::cmp::Ordering::Less => StatusChange::Advanced {
                from: *self,
                to: target,
            },
            std::cmp::Ordering::Equal => StatusChange::Unchanged,
            std::cmp::Ordering::Greater => StatusChange::Stale { current: *self },
        }
    }

    /// Returns true if this is a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::DeliveryCompleted)
    }

    /// Returns the status as stored and published.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::WaitingForKitchen => "waiting_for_kitchen",
            OrderStatus::ReadyForDelivery => "ready_for_delivery",
            OrderStatus::DeliveryStarted => "delivery_started",
            OrderStatus::DeliveryCompleted => "delivery_completed",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = OrderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OrderStatus::Pending),
            "waiting_for_kitchen" => Ok(OrderStatus::WaitingForKitchen),
            "ready_for_delivery" => Ok(OrderStatus::ReadyForDelivery),
            "delivery_started" => Ok(OrderStatus::DeliveryStarted),
            "delivery_completed" => Ok(OrderStatus::DeliveryCompleted),
            other => Err(OrderError::UnknownStatus(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIFECYCLE: [OrderStatus; 5] = [
        OrderStatus::Pending,
        OrderStatus::WaitingForKitchen,
        OrderStatus::ReadyForDelivery,
        OrderStatus::DeliveryStarted,
        OrderStatus::DeliveryCompleted,
    ];

    #[test]
    fn test_default_status_is_pending() {
        assert_eq!(OrderStatus::default(), OrderStatus::Pending);
    }

    #[test]
    fn test_forward_moves_advance() {
        for pair in LIFECYCLE.windows(2) {
            assert_eq!(
                pair[0].transition_to(pair[1]),
                StatusChange::Advanced {
                    from: pair[0],
                    to: pair[1]
                }
            );
        }
        assert!(
            OrderStatus::WaitingForKitchen
                .transition_to(OrderStatus::DeliveryStarted)
                .is_advanced()
        );
    }

    #[test]
    fn test_pending_only_leaves_for_kitchen() {
        for target in [
            OrderStatus::ReadyForDelivery,
            OrderStatus::DeliveryStarted,
            OrderStatus::DeliveryCompleted,
        ] {
            assert_eq!(
                OrderStatus::Pending.transition_to(target),
                StatusChange::Skipped {
                    current: OrderStatus::Pending
                }
            );
        }
    }

    #[test]
    fn test_same_status_is_unchanged() {
        for status in LIFECYCLE {
            assert_eq!(status.transition_to(status), StatusChange::Unchanged);
        }
    }

    #[test]
    fn test_backward_moves_are_stale() {
        assert_eq!(
            OrderStatus::DeliveryStarted.transition_to(OrderStatus::ReadyForDelivery),
            StatusChange::Stale {
                current: OrderStatus::DeliveryStarted
            }
        );
        assert_eq!(
            OrderStatus::DeliveryCompleted.transition_to(OrderStatus::Pending),
            StatusChange::Stale {
                current: OrderStatus::DeliveryCompleted
            }
        );
    }

    #[test]
    fn test_terminal_status() {
        for status in LIFECYCLE {
            assert_eq!(
                status.is_terminal(),
                status == OrderStatus::DeliveryCompleted
            );
        }
    }

    #[test]
    fn test_string_round_trip() {
        for status in LIFECYCLE {
            assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), status);
        }
        assert!("cancelled".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn test_serialization_uses_snake_case() {
        let json = serde_json::to_string(&OrderStatus::WaitingForKitchen).unwrap();
        assert_eq!(json, "\"waiting_for_kitchen\"");
        let back: OrderStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(back, OrderStatus::WaitingForKitchen);
    }
}
