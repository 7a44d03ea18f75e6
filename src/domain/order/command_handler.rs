use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

use crate::metrics::Metrics;
use crate::store::{MarketStore, StoreError};
use crate::utils::{retry_on_transient, RetryConfig};

use super::aggregate::Order;
use super::commands::{CancellationPolicy, OrderCommand, OrderOutcome};
use super::errors::OrderError;
use super::value_objects::{OrderLineRequest, OrderStatus};

// ============================================================================
// Order Command Handler
// ============================================================================
//
// Orchestrates: Command → Store (atomic placement / guarded status write)
//
// Status changes read the order, validate against the transition table and
// write with the read status as the guard. A concurrent writer turns the
// write into StoreError::Conflict, and the whole read-check-write is retried.
//
// ============================================================================

#[derive(Clone)]
pub struct OrderCommandHandler {
    store: Arc<dyn MarketStore>,
    metrics: Arc<Metrics>,
    cancellation: CancellationPolicy,
    retry: RetryConfig,
}

impl OrderCommandHandler {
    pub fn new(
        store: Arc<dyn MarketStore>,
        metrics: Arc<Metrics>,
        cancellation: CancellationPolicy,
    ) -> Self {
        Self {
            store,
            metrics,
            cancellation,
            retry: RetryConfig::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Handle a command and persist its effect
    pub async fn handle(&self, command: OrderCommand) -> Result<OrderOutcome, OrderError> {
        tracing::debug!(command = command.name(), "Handling order command");

        match command {
            OrderCommand::PlaceOrder { username, items } => {
                self.place_order(&username, &items).await.map(OrderOutcome::Placed)
            }
            OrderCommand::ChangeStatus { order_id, status } => {
                self.change_status(order_id, status).await
            }
        }
    }

    async fn place_order(
        &self,
        username: &str,
        items: &[OrderLineRequest],
    ) -> Result<Order, OrderError> {
        let started = Instant::now();
        let store = &self.store;
        let metrics = &self.metrics;

        let result = retry_on_transient(self.retry.clone(), move |attempt| {
            if attempt > 1 {
                metrics.record_retry_attempt("place_order", attempt);
            }
            store.place_order(username, items)
        })
        .await
        .into_result();

        let elapsed = started.elapsed().as_secs_f64();
        match &result {
            Ok(order) => {
                self.metrics.record_order_placed(elapsed);
                tracing::info!(
                    order_id = %order.id,
                    order_number = %order.order_number,
                    username = %username,
                    lines = order.items.len(),
                    total = %order.total_amount,
                    "Order placed"
                );
            }
            Err(e) => {
                self.metrics.record_order_rejected(e.reason(), elapsed);
                tracing::warn!(username = %username, error = %e, "Order rejected");
            }
        }

        result
    }

    async fn change_status(
        &self,
        order_id: Uuid,
        target: OrderStatus,
    ) -> Result<OrderOutcome, OrderError> {
        let metrics = &self.metrics;

        let (from, outcome) = retry_on_transient(self.retry.clone(), move |attempt| {
            if attempt > 1 {
                metrics.record_retry_attempt("change_order_status", attempt);
            }
            self.apply_status(order_id, target)
        })
        .await
        .into_result()
        .inspect_err(|e| {
            tracing::warn!(order_id = %order_id, to = %target, error = %e, "Status change rejected");
        })?;

        self.metrics.record_order_transition(from.as_str(), target.as_str());
        tracing::info!(
            order_id = %order_id,
            from = %from,
            to = %target,
            removed = matches!(outcome, OrderOutcome::Removed(_)),
            "Order status changed"
        );

        Ok(outcome)
    }

    /// One read-check-write round; returns the status the order had before.
    async fn apply_status(
        &self,
        order_id: Uuid,
        target: OrderStatus,
    ) -> Result<(OrderStatus, OrderOutcome), OrderError> {
        let order = self
            .store
            .find_order(order_id)
            .await?
            .ok_or(OrderError::OrderNotFound(order_id))?;
        order.check_transition(target)?;

        if target == OrderStatus::Cancelled && self.cancellation == CancellationPolicy::Delete {
            self.store
                .delete_order(order_id, order.status)
                .await
                .map_err(|e| write_error(order_id, e))?;
            return Ok((order.status, OrderOutcome::Removed(order_id)));
        }

        let updated = self
            .store
            .update_order_status(order_id, order.status, target)
            .await
            .map_err(|e| write_error(order_id, e))?;
        Ok((order.status, OrderOutcome::Updated(updated)))
    }

    pub async fn get_order(&self, order_id: Uuid) -> Result<Order, OrderError> {
        self.store
            .find_order(order_id)
            .await?
            .ok_or(OrderError::OrderNotFound(order_id))
    }

    /// Orders of `username`, newest first.
    pub async fn orders_for_user(&self, username: &str) -> Result<Vec<Order>, OrderError> {
        let user = self
            .store
            .find_user(username)
            .await?
            .ok_or_else(|| OrderError::UserNotFound(username.to_string()))?;

        Ok(self.store.orders_for_user(user.id).await?)
    }
}

/// The row vanished between read and write: report it as a missing order.
fn write_error(order_id: Uuid, error: StoreError) -> OrderError {
    match error {
        StoreError::Missing(_) => OrderError::OrderNotFound(order_id),
        other => OrderError::Storage(other),
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::catalog::{NewProduct, NewUser, Product};
    use crate::store::InMemoryStore;
    use rust_decimal::Decimal;

    struct Fixture {
        store: Arc<InMemoryStore>,
        handler: OrderCommandHandler,
        metrics: Arc<Metrics>,
    }

    async fn fixture(cancellation: CancellationPolicy) -> Fixture {
        let store = Arc::new(InMemoryStore::new());
        store
            .insert_user(&NewUser::new("alice", "alice@example.com").into_user().unwrap())
            .await
            .unwrap();
        let metrics = Arc::new(Metrics::new().unwrap());
        let handler = OrderCommandHandler::new(store.clone(), metrics.clone(), cancellation)
            .with_retry(RetryConfig::immediate(3));
        Fixture { store, handler, metrics }
    }

    async fn add_product(store: &InMemoryStore, price: Decimal, quantity: i32) -> Product {
        let product = NewProduct::new("Desk Lamp", price, quantity).into_product().unwrap();
        store.insert_product(&product).await.unwrap();
        product
    }

    async fn stock(store: &InMemoryStore, id: Uuid) -> i32 {
        store.find_product(id).await.unwrap().unwrap().available_quantity
    }

    async fn place(handler: &OrderCommandHandler, items: Vec<OrderLineRequest>) -> Result<Order, OrderError> {
        match handler
            .handle(OrderCommand::PlaceOrder { username: "alice".to_string(), items })
            .await?
        {
            OrderOutcome::Placed(order) => Ok(order),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    async fn change(
        handler: &OrderCommandHandler,
        order_id: Uuid,
        status: OrderStatus,
    ) -> Result<OrderOutcome, OrderError> {
        handler.handle(OrderCommand::ChangeStatus { order_id, status }).await
    }

    #[tokio::test]
    async fn test_second_order_exceeding_stock_fails_and_keeps_stock() {
        let f = fixture(CancellationPolicy::Retain).await;
        let lamp = add_product(&f.store, Decimal::new(1000, 2), 3).await;

        let order = place(&f.handler, vec![OrderLineRequest::new(lamp.id, 2)]).await.unwrap();
        assert_eq!(order.total_amount, Decimal::new(2000, 2));
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(stock(&f.store, lamp.id).await, 1);

        let second = place(&f.handler, vec![OrderLineRequest::new(lamp.id, 2)]).await;
        assert!(matches!(second, Err(OrderError::InsufficientStock { requested: 2, available: 1, .. })));
        assert_eq!(stock(&f.store, lamp.id).await, 1);

        assert_eq!(f.handler.orders_for_user("alice").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_multi_line_order_decrements_each_product() {
        let f = fixture(CancellationPolicy::Retain).await;
        let lamp = add_product(&f.store, Decimal::new(1000, 2), 5).await;
        let pen = add_product(&f.store, Decimal::new(250, 2), 10).await;

        let order = place(
            &f.handler,
            vec![OrderLineRequest::new(lamp.id, 2), OrderLineRequest::new(pen.id, 3)],
        )
        .await
        .unwrap();

        assert_eq!(order.total_amount, Decimal::new(2750, 2));
        assert_eq!(order.items[0].total_price, Decimal::new(2000, 2));
        assert_eq!(order.items[1].total_price, Decimal::new(750, 2));
        assert_eq!(stock(&f.store, lamp.id).await, 3);
        assert_eq!(stock(&f.store, pen.id).await, 7);
        assert_eq!(f.handler.get_order(order.id).await.unwrap(), order);
    }

    #[tokio::test]
    async fn test_failing_line_rolls_back_earlier_lines() {
        let f = fixture(CancellationPolicy::Retain).await;
        let lamp = add_product(&f.store, Decimal::new(1000, 2), 5).await;
        let pen = add_product(&f.store, Decimal::new(250, 2), 1).await;

        let result = place(
            &f.handler,
            vec![OrderLineRequest::new(lamp.id, 2), OrderLineRequest::new(pen.id, 3)],
        )
        .await;

        assert!(matches!(result, Err(OrderError::InsufficientStock { .. })));
        assert_eq!(stock(&f.store, lamp.id).await, 5);
        assert_eq!(stock(&f.store, pen.id).await, 1);
        assert!(f.handler.orders_for_user("alice").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_user_and_empty_order() {
        let f = fixture(CancellationPolicy::Retain).await;
        let lamp = add_product(&f.store, Decimal::new(1000, 2), 5).await;

        let result = f
            .handler
            .handle(OrderCommand::PlaceOrder {
                username: "nobody".to_string(),
                items: vec![OrderLineRequest::new(lamp.id, 1)],
            })
            .await;
        assert!(matches!(result, Err(OrderError::UserNotFound(_))));

        let result = place(&f.handler, vec![]).await;
        assert!(matches!(result, Err(OrderError::EmptyOrder)));
        assert_eq!(stock(&f.store, lamp.id).await, 5);
    }

    #[tokio::test]
    async fn test_lifecycle_through_delivery() {
        let f = fixture(CancellationPolicy::Retain).await;
        let lamp = add_product(&f.store, Decimal::new(1000, 2), 5).await;
        let order = place(&f.handler, vec![OrderLineRequest::new(lamp.id, 1)]).await.unwrap();

        for status in [OrderStatus::Confirmed, OrderStatus::Shipped] {
            let outcome = change(&f.handler, order.id, status).await.unwrap();
            assert!(matches!(outcome, OrderOutcome::Updated(ref o) if o.status == status));
        }
        assert_eq!(f.handler.get_order(order.id).await.unwrap().status, OrderStatus::Shipped);

        let back = change(&f.handler, order.id, OrderStatus::Pending).await;
        assert!(matches!(
            back,
            Err(OrderError::InvalidStatusTransition { from: OrderStatus::Shipped, to: OrderStatus::Pending })
        ));

        change(&f.handler, order.id, OrderStatus::Delivered).await.unwrap();
        let after = change(&f.handler, order.id, OrderStatus::Cancelled).await;
        assert!(matches!(after, Err(OrderError::InvalidStatusTransition { from: OrderStatus::Delivered, .. })));
    }

    #[tokio::test]
    async fn test_cancel_retains_order_by_default() {
        let f = fixture(CancellationPolicy::Retain).await;
        let lamp = add_product(&f.store, Decimal::new(1000, 2), 5).await;
        let order = place(&f.handler, vec![OrderLineRequest::new(lamp.id, 2)]).await.unwrap();

        let outcome = change(&f.handler, order.id, OrderStatus::Cancelled).await.unwrap();
        assert!(matches!(outcome, OrderOutcome::Updated(ref o) if o.status == OrderStatus::Cancelled));
        assert_eq!(f.handler.get_order(order.id).await.unwrap().status, OrderStatus::Cancelled);
        // Stock is not returned on cancellation
        assert_eq!(stock(&f.store, lamp.id).await, 3);
    }

    #[tokio::test]
    async fn test_cancel_deletes_order_under_delete_policy() {
        let f = fixture(CancellationPolicy::Delete).await;
        let lamp = add_product(&f.store, Decimal::new(1000, 2), 5).await;
        let order = place(&f.handler, vec![OrderLineRequest::new(lamp.id, 1)]).await.unwrap();

        let outcome = change(&f.handler, order.id, OrderStatus::Cancelled).await.unwrap();
        assert_eq!(outcome, OrderOutcome::Removed(order.id));
        assert!(matches!(f.handler.get_order(order.id).await, Err(OrderError::OrderNotFound(_))));
    }

    #[tokio::test]
    async fn test_change_status_of_missing_order() {
        let f = fixture(CancellationPolicy::Retain).await;
        let result = change(&f.handler, Uuid::new_v4(), OrderStatus::Confirmed).await;
        assert!(matches!(result, Err(OrderError::OrderNotFound(_))));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_orders_never_oversell() {
        let f = fixture(CancellationPolicy::Retain).await;
        let lamp = add_product(&f.store, Decimal::new(1000, 2), 5).await;

        let mut tasks = Vec::new();
        for _ in 0..12 {
            let handler = f.handler.clone();
            let items = vec![OrderLineRequest::new(lamp.id, 1)];
            tasks.push(tokio::spawn(async move { place(&handler, items).await }));
        }

        let mut placed = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(_) => placed += 1,
                Err(e) => assert!(matches!(e, OrderError::InsufficientStock { .. })),
            }
        }

        assert_eq!(placed, 5);
        assert_eq!(stock(&f.store, lamp.id).await, 0);
    }

    #[tokio::test]
    async fn test_placement_metrics_recorded() {
        let f = fixture(CancellationPolicy::Retain).await;
        let lamp = add_product(&f.store, Decimal::new(1000, 2), 1).await;

        place(&f.handler, vec![OrderLineRequest::new(lamp.id, 1)]).await.unwrap();
        let _ = place(&f.handler, vec![OrderLineRequest::new(lamp.id, 1)]).await;

        assert_eq!(f.metrics.orders_placed.get(), 1);
        assert_eq!(
            f.metrics.order_rejections.with_label_values(&["insufficient_stock"]).get(),
            1
        );
    }
}
