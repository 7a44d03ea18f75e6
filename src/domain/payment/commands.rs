use uuid::Uuid;

use super::aggregate::PaymentRequest;
use super::value_objects::PaymentStatus;

// ============================================================================
// Payment Commands
// ============================================================================

#[derive(Debug, Clone)]
pub enum PaymentCommand {
    Record {
        order_id: Uuid,
        request: PaymentRequest,
    },
    ChangeStatus {
        payment_id: Uuid,
        status: PaymentStatus,
    },
}
