use uuid::Uuid;

use crate::domain::errors::ErrorKind;
use crate::store::StoreError;
use crate::utils::IsTransient;
use super::value_objects::PaymentStatus;

// ============================================================================
// Payment Business Rule Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("Payment not found: {0}")]
    PaymentNotFound(Uuid),

    #[error("Order not found: {0}")]
    OrderNotFound(Uuid),

    #[error("Order {0} is cancelled and cannot be paid")]
    OrderNotPayable(Uuid),

    #[error("Invalid payment amount: {0}")]
    InvalidAmount(String),

    #[error("Invalid payment request: {0}")]
    InvalidRequest(String),

    #[error("Invalid status transition from {from} to {to}")]
    InvalidStatusTransition { from: PaymentStatus, to: PaymentStatus },

    #[error(transparent)]
    Storage(#[from] StoreError),
}

impl PaymentError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PaymentError::PaymentNotFound(_) | PaymentError::OrderNotFound(_) => ErrorKind::NotFound,
            PaymentError::OrderNotPayable(_)
            | PaymentError::InvalidAmount(_)
            | PaymentError::InvalidRequest(_)
            | PaymentError::InvalidStatusTransition { .. } => ErrorKind::InvalidRequest,
            PaymentError::Storage(StoreError::Conflict(_)) => ErrorKind::Conflict,
            PaymentError::Storage(StoreError::Rejected(_)) => ErrorKind::InvalidRequest,
            PaymentError::Storage(_) => ErrorKind::Internal,
        }
    }
}

impl IsTransient for PaymentError {
    fn is_transient(&self) -> bool {
        matches!(self, PaymentError::Storage(e) if e.is_transient())
    }
}
