use uuid::Uuid;

use crate::domain::errors::ErrorKind;
use crate::store::StoreError;
use crate::utils::IsTransient;
use super::value_objects::OrderStatus;

// ============================================================================
// Order Business Rule Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Product not found: {0}")]
    ProductNotFound(Uuid),

    #[error("Order not found: {0}")]
    OrderNotFound(Uuid),

    #[error("Order items cannot be empty")]
    EmptyOrder,

    #[error("Insufficient stock for product {product_name} ({product_id}): requested {requested}, available {available}")]
    InsufficientStock {
        product_id: Uuid,
        product_name: String,
        requested: i32,
        available: i32,
    },

    #[error("Invalid status transition from {from} to {to}")]
    InvalidStatusTransition { from: OrderStatus, to: OrderStatus },

    #[error("Order amount out of range: {0}")]
    AmountOutOfRange(String),

    #[error(transparent)]
    Storage(#[from] StoreError),
}

impl OrderError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            OrderError::UserNotFound(_)
            | OrderError::ProductNotFound(_)
            | OrderError::OrderNotFound(_) => ErrorKind::NotFound,
            OrderError::EmptyOrder
            | OrderError::InsufficientStock { .. }
            | OrderError::InvalidStatusTransition { .. }
            | OrderError::AmountOutOfRange(_) => ErrorKind::InvalidRequest,
            OrderError::Storage(StoreError::Conflict(_)) => ErrorKind::Conflict,
            OrderError::Storage(StoreError::Rejected(_)) => ErrorKind::InvalidRequest,
            OrderError::Storage(_) => ErrorKind::Internal,
        }
    }

    /// Short label used for rejection metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            OrderError::UserNotFound(_) => "user_not_found",
            OrderError::ProductNotFound(_) => "product_not_found",
            OrderError::OrderNotFound(_) => "order_not_found",
            OrderError::EmptyOrder => "empty_order",
            OrderError::InsufficientStock { .. } => "insufficient_stock",
            OrderError::InvalidStatusTransition { .. } => "invalid_transition",
            OrderError::AmountOutOfRange(_) => "amount_out_of_range",
            OrderError::Storage(_) => "storage",
        }
    }
}

impl IsTransient for OrderError {
    fn is_transient(&self) -> bool {
        matches!(self, OrderError::Storage(e) if e.is_transient())
    }
}
