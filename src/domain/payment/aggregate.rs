use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::lifecycle::Lifecycle;
use crate::domain::order::{Order, OrderStatus};
use super::errors::PaymentError;
use super::value_objects::{PaymentMethod, PaymentStatus, PaymentType};

const MAX_TRANSACTION_ID_LEN: usize = 100;

/// A payment made against an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub order_id: Uuid,
    pub user_id: Uuid,
    pub amount: Decimal,
    pub status: PaymentStatus,
    pub payment_type: PaymentType,
    pub payment_method: PaymentMethod,
    /// Reference assigned by the external payment provider
    pub transaction_id: Option<String>,
    pub payment_date: DateTime<Utc>,
}

/// Request to record a payment for an order.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentRequest {
    pub payment_type: PaymentType,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub amount: Option<Decimal>,
    #[serde(default)]
    pub transaction_id: Option<String>,
}

/// Sum of the payments that still count against their order.
pub fn amount_held(payments: &[Payment]) -> Decimal {
    payments
        .iter()
        .filter(|p| p.status.holds_funds())
        .map(|p| p.amount)
        .sum()
}

impl Payment {
    /// Build a PENDING payment for `order`, given the amount already held by
    /// its earlier payments.
    ///
    /// FULL payments always carry the order total and need an unpaid order.
    /// PARTIAL payments need an explicit amount within (0, outstanding].
    pub fn for_order(
        order: &Order,
        request: PaymentRequest,
        already_paid: Decimal,
    ) -> Result<Self, PaymentError> {
        if order.status == OrderStatus::Cancelled {
            return Err(PaymentError::OrderNotPayable(order.id));
        }

        let outstanding = order.total_amount - already_paid;
        if request.payment_type == PaymentType::Full && already_paid > Decimal::ZERO {
            return Err(PaymentError::InvalidAmount(format!(
                "order already has {} in payments; {} outstanding must be paid as PARTIAL",
                already_paid, outstanding
            )));
        }

        let amount = match (request.payment_type, request.amount) {
            (PaymentType::Full, None) => order.total_amount,
            (PaymentType::Full, Some(amount)) if amount == order.total_amount => amount,
            (PaymentType::Full, Some(amount)) => {
                return Err(PaymentError::InvalidAmount(format!(
                    "full payment of {} does not match order total {}",
                    amount, order.total_amount
                )))
            }
            (PaymentType::Partial, None) => {
                return Err(PaymentError::InvalidAmount(
                    "partial payment requires an amount".to_string(),
                ))
            }
            (PaymentType::Partial, Some(amount)) => {
                if amount <= Decimal::ZERO || amount > outstanding {
                    return Err(PaymentError::InvalidAmount(format!(
                        "partial payment of {} must be positive and at most the {} outstanding",
                        amount, outstanding
                    )));
                }
                amount
            }
        };

        let transaction_id = request
            .transaction_id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty());
        if let Some(id) = &transaction_id {
            if id.chars().count() > MAX_TRANSACTION_ID_LEN {
                return Err(PaymentError::InvalidRequest(format!(
                    "transaction id longer than {} characters",
                    MAX_TRANSACTION_ID_LEN
                )));
            }
        }

        Ok(Self {
            id: Uuid::new_v4(),
            order_id: order.id,
            user_id: order.user_id,
            amount,
            status: PaymentStatus::Pending,
            payment_type: request.payment_type,
            payment_method: request.payment_method,
            transaction_id,
            payment_date: Utc::now(),
        })
    }

    pub fn check_transition(&self, target: PaymentStatus) -> Result<(), PaymentError> {
        if self.status.can_transition_to(target) {
            Ok(())
        } else {
            Err(PaymentError::InvalidStatusTransition {
                from: self.status,
                to: target,
            })
        }
    }
}
