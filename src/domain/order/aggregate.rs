use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::domain::catalog::Product;
use crate::domain::lifecycle::Lifecycle;
use super::errors::OrderError;
use super::value_objects::{OrderLineRequest, OrderStatus};

// ============================================================================
// Order Aggregate
// ============================================================================

const ORDER_NUMBER_PREFIX: &str = "ORD-";

/// Largest line or order total that can be stored: NUMERIC(14, 2).
pub fn max_order_amount() -> Decimal {
    Decimal::new(99_999_999_999_999, 2)
}

fn within_limit(amount: Option<Decimal>) -> Option<Decimal> {
    amount.filter(|a| *a <= max_order_amount())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    // Identity
    pub id: Uuid,
    pub order_number: String,

    // Current State
    pub status: OrderStatus,
    pub total_amount: Decimal,
    pub user_id: Uuid,
    pub items: Vec<OrderLine>,

    // Audit Trail
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One product/quantity pairing with the price captured at placement time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLine {
    pub id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub total_price: Decimal,
    pub created_at: DateTime<Utc>,
}

/// Stock level a product must be written back with once the order commits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockUpdate {
    pub product_id: Uuid,
    pub available_quantity: i32,
}

/// A validated order that has not been persisted yet.
#[derive(Debug, Clone)]
pub struct Placement {
    pub order: Order,
    pub stock_updates: Vec<StockUpdate>,
}

impl Order {
    /// Run the placement algorithm against a snapshot of the referenced products.
    ///
    /// Lines are processed in request order. Each line sees the stock left
    /// over by earlier lines, so repeating a product cannot oversell it. No
    /// state is touched here; the caller persists the returned placement
    /// atomically or not at all.
    pub fn place(
        user_id: Uuid,
        requests: &[OrderLineRequest],
        products: &HashMap<Uuid, Product>,
    ) -> Result<Placement, OrderError> {
        if requests.is_empty() {
            return Err(OrderError::EmptyOrder);
        }

        let now = Utc::now();
        let mut remaining: HashMap<Uuid, i32> = HashMap::new();
        let mut touched: Vec<Uuid> = Vec::new();
        let mut items = Vec::with_capacity(requests.len());
        let mut total_amount = Decimal::ZERO;

        for request in requests {
            let product = products
                .get(&request.product_id)
                .ok_or(OrderError::ProductNotFound(request.product_id))?;

            let quantity = request.effective_quantity();
            let available = *remaining.entry(product.id).or_insert_with(|| {
                touched.push(product.id);
                product.available_quantity
            });

            if available < quantity {
                return Err(OrderError::InsufficientStock {
                    product_id: product.id,
                    product_name: product.name.clone(),
                    requested: quantity,
                    available,
                });
            }

            let line_total = within_limit(product.price.checked_mul(Decimal::from(quantity)))
                .ok_or_else(|| {
                    OrderError::AmountOutOfRange(format!(
                        "{} x {} of {} exceeds {}",
                        quantity,
                        product.price,
                        product.name,
                        max_order_amount()
                    ))
                })?;
            total_amount = within_limit(total_amount.checked_add(line_total)).ok_or_else(|| {
                OrderError::AmountOutOfRange(format!("order total exceeds {}", max_order_amount()))
            })?;

            items.push(OrderLine {
                id: Uuid::new_v4(),
                product_id: product.id,
                quantity,
                unit_price: product.price,
                total_price: line_total,
                created_at: now,
            });

            remaining.insert(product.id, available - quantity);
        }

        let stock_updates = touched
            .into_iter()
            .map(|product_id| StockUpdate {
                product_id,
                available_quantity: remaining[&product_id],
            })
            .collect();

        let order = Order {
            id: Uuid::new_v4(),
            order_number: generate_order_number(),
            status: OrderStatus::Pending,
            total_amount,
            user_id,
            items,
            created_at: now,
            updated_at: now,
        };

        Ok(Placement { order, stock_updates })
    }

    /// Validate a status change without applying it.
    pub fn check_transition(&self, target: OrderStatus) -> Result<(), OrderError> {
        if self.status.can_transition_to(target) {
            Ok(())
        } else {
            Err(OrderError::InvalidStatusTransition {
                from: self.status,
                to: target,
            })
        }
    }
}

/// `ORD-` followed by the first eight hex digits of a random UUID.
pub fn generate_order_number() -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("{}{}", ORDER_NUMBER_PREFIX, &id[..8])
}

// ============================================================================
// Unit Tests
// ============================================================================
