use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::aggregate::Order;
use super::value_objects::{OrderLineRequest, OrderStatus};

// ============================================================================
// Order Commands - Represent user intent
// ============================================================================

#[derive(Debug, Clone)]
pub enum OrderCommand {
    PlaceOrder {
        username: String,
        items: Vec<OrderLineRequest>,
    },
    ChangeStatus {
        order_id: Uuid,
        status: OrderStatus,
    },
}

impl OrderCommand {
    pub fn name(&self) -> &'static str {
        match self {
            OrderCommand::PlaceOrder { .. } => "PlaceOrder",
            OrderCommand::ChangeStatus { .. } => "ChangeStatus",
        }
    }
}

/// What a successfully handled command left behind.
#[derive(Debug, Clone, PartialEq)]
pub enum OrderOutcome {
    Placed(Order),
    Updated(Order),
    /// The order was cancelled and its record deleted
    Removed(Uuid),
}

/// Cancellation handling for `ChangeStatus { status: Cancelled }`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CancellationPolicy {
    /// Keep the row with status CANCELLED
    #[default]
    Retain,
    /// Delete the order and its lines
    Delete,
}

impl std::str::FromStr for CancellationPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "retain" => Ok(CancellationPolicy::Retain),
            "delete" => Ok(CancellationPolicy::Delete),
            other => Err(format!("expected 'retain' or 'delete', got {:?}", other)),
        }
    }
}
