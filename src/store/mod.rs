// ============================================================================
// Persistence Layer
// ============================================================================
//
// `MarketStore` is the seam between the command handlers and storage.
// Two implementations:
// - PgStore: PostgreSQL through sqlx, row locks for stock
// - InMemoryStore: single mutex around all state, used without DATABASE_URL
//   and in tests
//
// Status writes are compare-and-set: the caller passes the status it read
// and the store fails with `StoreError::Conflict` when the row moved on.
//
// ============================================================================

mod error;
mod memory;
mod postgres;

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::catalog::{Product, ProductFilter, ProductRating, RatingSummary, User};
use crate::domain::order::{Order, OrderError, OrderLineRequest, OrderStatus};
use crate::domain::payment::{Payment, PaymentStatus};

pub use error::StoreError;
pub use memory::InMemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait MarketStore: Send + Sync {
    // Catalog
    async fn insert_user(&self, user: &User) -> Result<(), StoreError>;
    async fn find_user(&self, username: &str) -> Result<Option<User>, StoreError>;
    async fn insert_product(&self, product: &Product) -> Result<(), StoreError>;
    async fn find_product(&self, id: Uuid) -> Result<Option<Product>, StoreError>;

    /// Products matching `filter`, oldest listing first.
    async fn list_products(&self, filter: &ProductFilter) -> Result<Vec<Product>, StoreError>;

    /// Insert the rating, or replace the stars of the user's earlier rating
    /// of the same product. `Missing` when the product or user is gone.
    async fn upsert_rating(&self, rating: &ProductRating) -> Result<(), StoreError>;
    async fn find_rating(
        &self,
        product_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<ProductRating>, StoreError>;
    async fn rating_summary(&self, product_id: Uuid) -> Result<RatingSummary, StoreError>;

    // Orders

    /// Validate and persist a new order together with its stock decrements.
    /// Either everything is written or nothing is.
    async fn place_order(
        &self,
        username: &str,
        items: &[OrderLineRequest],
    ) -> Result<Order, OrderError>;

    async fn find_order(&self, id: Uuid) -> Result<Option<Order>, StoreError>;

    /// Orders of one user, newest first.
    async fn orders_for_user(&self, user_id: Uuid) -> Result<Vec<Order>, StoreError>;

    async fn update_order_status(
        &self,
        id: Uuid,
        expected: OrderStatus,
        next: OrderStatus,
    ) -> Result<Order, StoreError>;

    /// Delete the order, its lines and its payments.
    async fn delete_order(&self, id: Uuid, expected: OrderStatus) -> Result<(), StoreError>;

    // Payments

    /// Fails with `Rejected` when the payments holding funds on the order
    /// would add up to more than its total.
    async fn insert_payment(&self, payment: &Payment) -> Result<(), StoreError>;
    async fn find_payment(&self, id: Uuid) -> Result<Option<Payment>, StoreError>;
    async fn payments_for_order(&self, order_id: Uuid) -> Result<Vec<Payment>, StoreError>;

    async fn update_payment_status(
        &self,
        id: Uuid,
        expected: PaymentStatus,
        next: PaymentStatus,
    ) -> Result<Payment, StoreError>;
}
