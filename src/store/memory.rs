use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::domain::catalog::{Product, ProductFilter, ProductRating, RatingSummary, User};
use crate::domain::order::{Order, OrderError, OrderLineRequest, OrderStatus};
use crate::domain::payment::{amount_held, Payment, PaymentStatus};
use super::{MarketStore, StoreError};

// ============================================================================
// In-Memory Store
// ============================================================================
//
// Every operation takes the one lock for its whole duration, so a placement
// observes and writes stock without interleaving with other placements.
//
// ============================================================================

#[derive(Default)]
struct State {
    users: HashMap<Uuid, User>,
    products: HashMap<Uuid, Product>,
    /// Product ids in listing order
    listed: Vec<Uuid>,
    /// Keyed by (product, user)
    ratings: HashMap<(Uuid, Uuid), ProductRating>,
    orders: HashMap<Uuid, Order>,
    /// Order ids in placement order
    placed: Vec<Uuid>,
    payments: HashMap<Uuid, Payment>,
    /// Payment ids in recording order
    recorded: Vec<Uuid>,
}

#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MarketStore for InMemoryStore {
    async fn insert_user(&self, user: &User) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        let taken = state
            .users
            .values()
            .any(|u| u.username == user.username || u.email == user.email);
        if taken || state.users.contains_key(&user.id) {
            return Err(StoreError::Duplicate(format!("user {}", user.username)));
        }
        state.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn find_user(&self, username: &str) -> Result<Option<User>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.users.values().find(|u| u.username == username).cloned())
    }

    async fn insert_product(&self, product: &Product) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if state.products.contains_key(&product.id) {
            return Err(StoreError::Duplicate(format!("product {}", product.id)));
        }
        if let Some(owner) = product.owner_id {
            if !state.users.contains_key(&owner) {
                return Err(StoreError::Missing(format!("user {}", owner)));
            }
        }
        state.listed.push(product.id);
        state.products.insert(product.id, product.clone());
        Ok(())
    }

    async fn find_product(&self, id: Uuid) -> Result<Option<Product>, StoreError> {
        Ok(self.state.lock().await.products.get(&id).cloned())
    }

    async fn list_products(&self, filter: &ProductFilter) -> Result<Vec<Product>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .listed
            .iter()
            .filter_map(|id| state.products.get(id))
            .filter(|product| filter.matches(product))
            .cloned()
            .collect())
    }

    async fn upsert_rating(&self, rating: &ProductRating) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if !state.products.contains_key(&rating.product_id) {
            return Err(StoreError::Missing(format!("product {}", rating.product_id)));
        }
        if !state.users.contains_key(&rating.user_id) {
            return Err(StoreError::Missing(format!("user {}", rating.user_id)));
        }

        state
            .ratings
            .entry((rating.product_id, rating.user_id))
            .and_modify(|existing| {
                existing.stars = rating.stars;
                existing.updated_at = rating.updated_at;
            })
            .or_insert_with(|| rating.clone());
        Ok(())
    }

    async fn find_rating(
        &self,
        product_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<ProductRating>, StoreError> {
        Ok(self.state.lock().await.ratings.get(&(product_id, user_id)).cloned())
    }

    async fn rating_summary(&self, product_id: Uuid) -> Result<RatingSummary, StoreError> {
        let state = self.state.lock().await;
        Ok(RatingSummary::from_stars(
            state
                .ratings
                .values()
                .filter(|r| r.product_id == product_id)
                .map(|r| r.stars),
        ))
    }

    async fn place_order(
        &self,
        username: &str,
        items: &[OrderLineRequest],
    ) -> Result<Order, OrderError> {
        let mut state = self.state.lock().await;

        let user_id = state
            .users
            .values()
            .find(|u| u.username == username)
            .map(|u| u.id)
            .ok_or_else(|| OrderError::UserNotFound(username.to_string()))?;

        let snapshot: HashMap<Uuid, Product> = items
            .iter()
            .filter_map(|item| state.products.get(&item.product_id))
            .map(|p| (p.id, p.clone()))
            .collect();

        let placement = Order::place(user_id, items, &snapshot)?;

        for update in &placement.stock_updates {
            if let Some(product) = state.products.get_mut(&update.product_id) {
                product.available_quantity = update.available_quantity;
            }
        }

        let order = placement.order;
        state.placed.push(order.id);
        state.orders.insert(order.id, order.clone());

        tracing::debug!(order_id = %order.id, lines = order.items.len(), "Order stored in memory");
        Ok(order)
    }

    async fn find_order(&self, id: Uuid) -> Result<Option<Order>, StoreError> {
        Ok(self.state.lock().await.orders.get(&id).cloned())
    }

    async fn orders_for_user(&self, user_id: Uuid) -> Result<Vec<Order>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .placed
            .iter()
            .rev()
            .filter_map(|id| state.orders.get(id))
            .filter(|order| order.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn update_order_status(
        &self,
        id: Uuid,
        expected: OrderStatus,
        next: OrderStatus,
    ) -> Result<Order, StoreError> {
        let mut state = self.state.lock().await;
        let order = state
            .orders
            .get_mut(&id)
            .ok_or_else(|| StoreError::Missing(format!("order {}", id)))?;

        if order.status != expected {
            return Err(StoreError::Conflict(format!(
                "order {} is {}, expected {}",
                id, order.status, expected
            )));
        }

        order.status = next;
        order.updated_at = Utc::now();
        Ok(order.clone())
    }

    async fn delete_order(&self, id: Uuid, expected: OrderStatus) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        let current = state
            .orders
            .get(&id)
            .map(|order| order.status)
            .ok_or_else(|| StoreError::Missing(format!("order {}", id)))?;

        if current != expected {
            return Err(StoreError::Conflict(format!(
                "order {} is {}, expected {}",
                id, current, expected
            )));
        }

        state.orders.remove(&id);
        state.placed.retain(|placed| *placed != id);

        let State { payments, recorded, .. } = &mut *state;
        payments.retain(|_, payment| payment.order_id != id);
        recorded.retain(|payment_id| payments.contains_key(payment_id));
        Ok(())
    }

    async fn insert_payment(&self, payment: &Payment) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        let total = state
            .orders
            .get(&payment.order_id)
            .map(|order| order.total_amount)
            .ok_or_else(|| StoreError::Missing(format!("order {}", payment.order_id)))?;
        if state.payments.contains_key(&payment.id) {
            return Err(StoreError::Duplicate(format!("payment {}", payment.id)));
        }

        let earlier: Vec<Payment> = state
            .payments
            .values()
            .filter(|p| p.order_id == payment.order_id)
            .cloned()
            .collect();
        let held = amount_held(&earlier);
        if held + payment.amount > total {
            return Err(StoreError::Rejected(format!(
                "order {} has {} of {} paid; {} does not fit",
                payment.order_id, held, total, payment.amount
            )));
        }
        state.recorded.push(payment.id);
        state.payments.insert(payment.id, payment.clone());
        Ok(())
    }

    async fn find_payment(&self, id: Uuid) -> Result<Option<Payment>, StoreError> {
        Ok(self.state.lock().await.payments.get(&id).cloned())
    }

    async fn payments_for_order(&self, order_id: Uuid) -> Result<Vec<Payment>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .recorded
            .iter()
            .filter_map(|id| state.payments.get(id))
            .filter(|payment| payment.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn update_payment_status(
        &self,
        id: Uuid,
        expected: PaymentStatus,
        next: PaymentStatus,
    ) -> Result<Payment, StoreError> {
        let mut state = self.state.lock().await;
        let payment = state
            .payments
            .get_mut(&id)
            .ok_or_else(|| StoreError::Missing(format!("payment {}", id)))?;

        if payment.status != expected {
            return Err(StoreError::Conflict(format!(
                "payment {} is {}, expected {}",
                id, payment.status, expected
            )));
        }

        payment.status = next;
        Ok(payment.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::catalog::{NewProduct, NewUser};
    use rust_decimal::Decimal;

    async fn seeded() -> (InMemoryStore, Product) {
        let store = InMemoryStore::new();
        store
            .insert_user(&NewUser::new("alice", "alice@example.com").into_user().unwrap())
            .await
            .unwrap();
        let product = NewProduct::new("Desk Lamp", Decimal::new(1000, 2), 3)
            .into_product()
            .unwrap();
        store.insert_product(&product).await.unwrap();
        (store, product)
    }

    #[tokio::test]
    async fn test_place_order_persists_and_decrements() {
        let (store, lamp) = seeded().await;

        let order = store
            .place_order("alice", &[OrderLineRequest::new(lamp.id, 2)])
            .await
            .unwrap();

        assert_eq!(store.find_order(order.id).await.unwrap(), Some(order.clone()));
        let lamp = store.find_product(lamp.id).await.unwrap().unwrap();
        assert_eq!(lamp.available_quantity, 1);
    }

    #[tokio::test]
    async fn test_failed_placement_leaves_no_trace() {
        let (store, lamp) = seeded().await;
        let alice = store.find_user("alice").await.unwrap().unwrap();

        let result = store
            .place_order(
                "alice",
                &[OrderLineRequest::new(lamp.id, 1), OrderLineRequest::new(Uuid::new_v4(), 1)],
            )
            .await;

        assert!(matches!(result, Err(OrderError::ProductNotFound(_))));
        assert_eq!(store.find_product(lamp.id).await.unwrap().unwrap().available_quantity, 3);
        assert!(store.orders_for_user(alice.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_user_is_rejected() {
        let (store, lamp) = seeded().await;
        let result = store.place_order("mallory", &[OrderLineRequest::new(lamp.id, 1)]).await;
        assert!(matches!(result, Err(OrderError::UserNotFound(name)) if name == "mallory"));
    }

    #[tokio::test]
    async fn test_orders_for_user_newest_first() {
        let (store, lamp) = seeded().await;
        let alice = store.find_user("alice").await.unwrap().unwrap();

        let first = store.place_order("alice", &[OrderLineRequest::new(lamp.id, 1)]).await.unwrap();
        let second = store.place_order("alice", &[OrderLineRequest::new(lamp.id, 1)]).await.unwrap();

        let ids: Vec<Uuid> = store
            .orders_for_user(alice.id)
            .await
            .unwrap()
            .into_iter()
            .map(|o| o.id)
            .collect();
        assert_eq!(ids, vec![second.id, first.id]);
    }

    #[tokio::test]
    async fn test_status_write_is_compare_and_set() {
        let (store, lamp) = seeded().await;
        let order = store.place_order("alice", &[OrderLineRequest::new(lamp.id, 1)]).await.unwrap();

        let stale = store
            .update_order_status(order.id, OrderStatus::Confirmed, OrderStatus::Shipped)
            .await;
        assert!(matches!(stale, Err(StoreError::Conflict(_))));

        let updated = store
            .update_order_status(order.id, OrderStatus::Pending, OrderStatus::Confirmed)
            .await
            .unwrap();
        assert_eq!(updated.status, OrderStatus::Confirmed);

        let missing = store
            .update_order_status(Uuid::new_v4(), OrderStatus::Pending, OrderStatus::Confirmed)
            .await;
        assert!(matches!(missing, Err(StoreError::Missing(_))));
    }

    #[tokio::test]
    async fn test_list_products_in_listing_order() {
        let (store, lamp) = seeded().await;
        let chair = NewProduct::new("Chair", Decimal::new(4500, 2), 2)
            .with_category("Furniture")
            .into_product()
            .unwrap();
        store.insert_product(&chair).await.unwrap();

        let all = store.list_products(&ProductFilter::default()).await.unwrap();
        assert_eq!(all.iter().map(|p| p.id).collect::<Vec<_>>(), vec![lamp.id, chair.id]);

        let filter = ProductFilter { category: Some("furniture".to_string()), ..Default::default() };
        let furniture = store.list_products(&filter).await.unwrap();
        assert_eq!(furniture, vec![chair]);
    }

    #[tokio::test]
    async fn test_product_owner_must_exist() {
        let (store, _) = seeded().await;
        let mut orphan = NewProduct::new("Chair", Decimal::ONE, 1).into_product().unwrap();
        orphan.owner_id = Some(Uuid::new_v4());
        assert!(matches!(store.insert_product(&orphan).await, Err(StoreError::Missing(_))));
    }

    #[tokio::test]
    async fn test_rating_upsert_replaces_stars() {
        let (store, lamp) = seeded().await;
        let alice = store.find_user("alice").await.unwrap().unwrap();
        let bob = NewUser::new("bob", "bob@example.com").into_user().unwrap();
        store.insert_user(&bob).await.unwrap();

        store.upsert_rating(&ProductRating::new(lamp.id, alice.id, 2).unwrap()).await.unwrap();
        store.upsert_rating(&ProductRating::new(lamp.id, bob.id, 5).unwrap()).await.unwrap();
        store.upsert_rating(&ProductRating::new(lamp.id, alice.id, 4).unwrap()).await.unwrap();

        let summary = store.rating_summary(lamp.id).await.unwrap();
        assert_eq!(summary.count, 2);
        assert_eq!(summary.average, Decimal::new(450, 2));
        assert_eq!(store.find_rating(lamp.id, alice.id).await.unwrap().unwrap().stars, 4);

        let unknown = ProductRating::new(Uuid::new_v4(), alice.id, 3).unwrap();
        assert!(matches!(store.upsert_rating(&unknown).await, Err(StoreError::Missing(_))));
    }

    #[tokio::test]
    async fn test_duplicate_username_rejected() {
        let (store, _) = seeded().await;
        let again = NewUser::new("alice", "other@example.com").into_user().unwrap();
        assert!(matches!(store.insert_user(&again).await, Err(StoreError::Duplicate(_))));
    }
}
