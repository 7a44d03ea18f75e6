use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool};
use std::collections::HashMap;
use std::str::FromStr;
use uuid::Uuid;

use crate::domain::catalog::{Product, ProductFilter, ProductRating, RatingSummary, User};
use crate::domain::lifecycle::Lifecycle;
use crate::domain::order::{Order, OrderError, OrderLine, OrderLineRequest, OrderStatus};
use crate::domain::payment::{Payment, PaymentStatus};
use super::{MarketStore, StoreError};

// ============================================================================
// PostgreSQL Store
// ============================================================================
//
// Order placement runs in one transaction:
//   1. resolve the user
//   2. lock every referenced product row (FOR UPDATE, ascending id)
//   3. run the placement algorithm on the locked snapshot
//   4. write stock, order row and line rows
//   5. commit
// Dropping the transaction on any error rolls all of it back.
//
// ============================================================================

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Explain why a guarded UPDATE/DELETE touched no row.
    async fn write_missed(&self, table: &'static str, id: Uuid) -> StoreError {
        let sql = format!("SELECT EXISTS (SELECT 1 FROM {} WHERE id = $1)", table);
        match sqlx::query_scalar::<_, bool>(&sql).bind(id).fetch_one(&self.pool).await {
            Ok(true) => StoreError::Conflict(format!("{} {} changed status", table, id)),
            Ok(false) => StoreError::Missing(format!("{} {}", table, id)),
            Err(e) => StoreError::Database(e),
        }
    }
}

// ============================================================================
// Row Mapping
// ============================================================================

fn decode<T: FromStr<Err = String>>(column: &str, value: &str) -> Result<T, StoreError> {
    value
        .parse()
        .map_err(|e: String| StoreError::Corrupt(format!("{}: {}", column, e)))
}

#[derive(FromRow)]
struct UserRow {
    id: Uuid,
    username: String,
    email: String,
    first_name: Option<String>,
    last_name: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            username: row.username,
            email: row.email,
            first_name: row.first_name,
            last_name: row.last_name,
            created_at: row.created_at,
        }
    }
}

#[derive(FromRow)]
struct ProductRow {
    id: Uuid,
    name: String,
    description: Option<String>,
    category: Option<String>,
    price: Decimal,
    available_quantity: i32,
    status: String,
    owner_id: Option<Uuid>,
    created_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for Product {
    type Error = StoreError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        Ok(Product {
            id: row.id,
            name: row.name,
            description: row.description,
            category: row.category,
            price: row.price,
            available_quantity: row.available_quantity,
            status: decode("products.status", &row.status)?,
            owner_id: row.owner_id,
            created_at: row.created_at,
        })
    }
}

#[derive(FromRow)]
struct RatingRow {
    id: Uuid,
    product_id: Uuid,
    user_id: Uuid,
    stars: i16,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<RatingRow> for ProductRating {
    fn from(row: RatingRow) -> Self {
        ProductRating {
            id: row.id,
            product_id: row.product_id,
            user_id: row.user_id,
            stars: row.stars,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(FromRow)]
struct OrderRow {
    id: Uuid,
    order_number: String,
    status: String,
    total_amount: Decimal,
    user_id: Uuid,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct OrderItemRow {
    id: Uuid,
    order_id: Uuid,
    product_id: Uuid,
    quantity: i32,
    unit_price: Decimal,
    total_price: Decimal,
    created_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self, items: Vec<OrderItemRow>) -> Result<Order, StoreError> {
        Ok(Order {
            id: self.id,
            order_number: self.order_number,
            status: decode("orders.status", &self.status)?,
            total_amount: self.total_amount,
            user_id: self.user_id,
            items: items
                .into_iter()
                .map(|item| OrderLine {
                    id: item.id,
                    product_id: item.product_id,
                    quantity: item.quantity,
                    unit_price: item.unit_price,
                    total_price: item.total_price,
                    created_at: item.created_at,
                })
                .collect(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(FromRow)]
struct PaymentRow {
    id: Uuid,
    order_id: Uuid,
    user_id: Uuid,
    amount: Decimal,
    status: String,
    payment_type: String,
    payment_method: String,
    transaction_id: Option<String>,
    payment_date: DateTime<Utc>,
}

impl TryFrom<PaymentRow> for Payment {
    type Error = StoreError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        Ok(Payment {
            id: row.id,
            order_id: row.order_id,
            user_id: row.user_id,
            amount: row.amount,
            status: decode("payments.status", &row.status)?,
            payment_type: decode("payments.payment_type", &row.payment_type)?,
            payment_method: decode("payments.payment_method", &row.payment_method)?,
            transaction_id: row.transaction_id,
            payment_date: row.payment_date,
        })
    }
}

const PRODUCT_COLUMNS: &str =
    "id, name, description, category, price, available_quantity, status, owner_id, created_at";
const RATING_COLUMNS: &str = "id, product_id, user_id, stars, created_at, updated_at";
const ORDER_COLUMNS: &str = "id, order_number, status, total_amount, user_id, created_at, updated_at";
const ITEM_COLUMNS: &str = "id, order_id, product_id, quantity, unit_price, total_price, created_at";
const PAYMENT_COLUMNS: &str =
    "id, order_id, user_id, amount, status, payment_type, payment_method, transaction_id, payment_date";

/// `%term%` for ILIKE, with the pattern characters in `term` escaped.
fn contains_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

// ============================================================================
// MarketStore Implementation
// ============================================================================

#[async_trait]
impl MarketStore for PgStore {
    async fn insert_user(&self, user: &User) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO users (id, username, email, first_name, last_name, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(user.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::from_write(e, &format!("user {}", user.username)))?;
        Ok(())
    }

    async fn find_user(&self, username: &str) -> Result<Option<User>, StoreError> {
        let row: Option<UserRow> = sqlx::query_as(
            "SELECT id, username, email, first_name, last_name, created_at \
             FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(User::from))
    }

    async fn insert_product(&self, product: &Product) -> Result<(), StoreError> {
        let sql = format!(
            "INSERT INTO products ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
            PRODUCT_COLUMNS
        );
        sqlx::query(&sql)
            .bind(product.id)
            .bind(&product.name)
            .bind(&product.description)
            .bind(&product.category)
            .bind(product.price)
            .bind(product.available_quantity)
            .bind(product.status.as_str())
            .bind(product.owner_id)
            .bind(product.created_at)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::from_write(e, &format!("product {}", product.id)))?;
        Ok(())
    }

    async fn find_product(&self, id: Uuid) -> Result<Option<Product>, StoreError> {
        let sql = format!("SELECT {} FROM products WHERE id = $1", PRODUCT_COLUMNS);
        let row: Option<ProductRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Product::try_from).transpose()
    }

    async fn list_products(&self, filter: &ProductFilter) -> Result<Vec<Product>, StoreError> {
        let sql = format!(
            "SELECT {} FROM products \
             WHERE ($1::uuid IS NULL OR owner_id = $1) \
               AND ($2::text IS NULL OR LOWER(category) = LOWER($2)) \
               AND ($3::text IS NULL OR status = $3) \
               AND ($4::text IS NULL OR name ILIKE $4 OR description ILIKE $4) \
             ORDER BY created_at, id",
            PRODUCT_COLUMNS
        );
        let rows: Vec<ProductRow> = sqlx::query_as(&sql)
            .bind(filter.owner_id)
            .bind(filter.category.as_deref())
            .bind(filter.status.map(|status| status.as_str()))
            .bind(filter.search.as_deref().map(contains_pattern))
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(Product::try_from).collect()
    }

    async fn upsert_rating(&self, rating: &ProductRating) -> Result<(), StoreError> {
        let sql = format!(
            "INSERT INTO product_ratings ({}) VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (product_id, user_id) \
             DO UPDATE SET stars = EXCLUDED.stars, updated_at = EXCLUDED.updated_at",
            RATING_COLUMNS
        );
        sqlx::query(&sql)
            .bind(rating.id)
            .bind(rating.product_id)
            .bind(rating.user_id)
            .bind(rating.stars)
            .bind(rating.created_at)
            .bind(rating.updated_at)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::from_write(e, &format!("rating of product {}", rating.product_id)))?;
        Ok(())
    }

    async fn find_rating(
        &self,
        product_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<ProductRating>, StoreError> {
        let sql = format!(
            "SELECT {} FROM product_ratings WHERE product_id = $1 AND user_id = $2",
            RATING_COLUMNS
        );
        let row: Option<RatingRow> = sqlx::query_as(&sql)
            .bind(product_id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(ProductRating::from))
    }

    async fn rating_summary(&self, product_id: Uuid) -> Result<RatingSummary, StoreError> {
        let (average, count): (Decimal, i64) = sqlx::query_as(
            "SELECT COALESCE(ROUND(AVG(stars), 2), 0), COUNT(*) \
             FROM product_ratings WHERE product_id = $1",
        )
        .bind(product_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(RatingSummary { average, count })
    }

    async fn place_order(
        &self,
        username: &str,
        items: &[OrderLineRequest],
    ) -> Result<Order, OrderError> {
        let mut tx = self.pool.begin().await.map_err(StoreError::from)?;

        let user_id: Option<Uuid> = sqlx::query_scalar("SELECT id FROM users WHERE username = $1")
            .bind(username)
            .fetch_optional(&mut *tx)
            .await
            .map_err(StoreError::from)?;
        let user_id = user_id.ok_or_else(|| OrderError::UserNotFound(username.to_string()))?;

        let mut product_ids: Vec<Uuid> = items.iter().map(|item| item.product_id).collect();
        product_ids.sort();
        product_ids.dedup();

        // Placements sharing a product serialize on these locks
        let sql = format!(
            "SELECT {} FROM products WHERE id = ANY($1) ORDER BY id FOR UPDATE",
            PRODUCT_COLUMNS
        );
        let rows: Vec<ProductRow> = sqlx::query_as(&sql)
            .bind(product_ids.as_slice())
            .fetch_all(&mut *tx)
            .await
            .map_err(StoreError::from)?;

        let products = rows
            .into_iter()
            .map(|row| Product::try_from(row).map(|product| (product.id, product)))
            .collect::<Result<HashMap<_, _>, StoreError>>()?;

        let placement = Order::place(user_id, items, &products)?;

        for update in &placement.stock_updates {
            sqlx::query("UPDATE products SET available_quantity = $2 WHERE id = $1")
                .bind(update.product_id)
                .bind(update.available_quantity)
                .execute(&mut *tx)
                .await
                .map_err(StoreError::from)?;
        }

        let order = placement.order;
        sqlx::query(
            "INSERT INTO orders (id, order_number, status, total_amount, user_id, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(order.id)
        .bind(&order.order_number)
        .bind(order.status.as_str())
        .bind(order.total_amount)
        .bind(order.user_id)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| StoreError::from_write(e, &format!("order {}", order.order_number)))?;

        for (position, line) in order.items.iter().enumerate() {
            sqlx::query(
                "INSERT INTO order_items \
                 (id, order_id, position, product_id, quantity, unit_price, total_price, created_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
            )
            .bind(line.id)
            .bind(order.id)
            .bind(position as i32)
            .bind(line.product_id)
            .bind(line.quantity)
            .bind(line.unit_price)
            .bind(line.total_price)
            .bind(line.created_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::from_write(e, &format!("order {} line {}", order.order_number, position)))?;
        }

        tx.commit().await.map_err(StoreError::from)?;

        tracing::debug!(
            order_id = %order.id,
            locked_products = product_ids.len(),
            "Order transaction committed"
        );
        Ok(order)
    }

    async fn find_order(&self, id: Uuid) -> Result<Option<Order>, StoreError> {
        let sql = format!("SELECT {} FROM orders WHERE id = $1", ORDER_COLUMNS);
        let row: Option<OrderRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };

        let sql = format!(
            "SELECT {} FROM order_items WHERE order_id = $1 ORDER BY position",
            ITEM_COLUMNS
        );
        let items: Vec<OrderItemRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_all(&self.pool)
            .await?;

        row.into_order(items).map(Some)
    }

    async fn orders_for_user(&self, user_id: Uuid) -> Result<Vec<Order>, StoreError> {
        let sql = format!(
            "SELECT {} FROM orders WHERE user_id = $1 ORDER BY created_at DESC, id",
            ORDER_COLUMNS
        );
        let rows: Vec<OrderRow> = sqlx::query_as(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let order_ids: Vec<Uuid> = rows.iter().map(|row| row.id).collect();
        let sql = format!(
            "SELECT {} FROM order_items WHERE order_id = ANY($1) ORDER BY order_id, position",
            ITEM_COLUMNS
        );
        let item_rows: Vec<OrderItemRow> = sqlx::query_as(&sql)
            .bind(order_ids.as_slice())
            .fetch_all(&self.pool)
            .await?;

        let mut items_by_order: HashMap<Uuid, Vec<OrderItemRow>> = HashMap::new();
        for item in item_rows {
            items_by_order.entry(item.order_id).or_default().push(item);
        }

        rows.into_iter()
            .map(|row| {
                let items = items_by_order.remove(&row.id).unwrap_or_default();
                row.into_order(items)
            })
            .collect()
    }

    async fn update_order_status(
        &self,
        id: Uuid,
        expected: OrderStatus,
        next: OrderStatus,
    ) -> Result<Order, StoreError> {
        let result = sqlx::query(
            "UPDATE orders SET status = $3, updated_at = $4 WHERE id = $1 AND status = $2",
        )
        .bind(id)
        .bind(expected.as_str())
        .bind(next.as_str())
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(self.write_missed("orders", id).await);
        }

        self.find_order(id)
            .await?
            .ok_or_else(|| StoreError::Missing(format!("orders {}", id)))
    }

    async fn delete_order(&self, id: Uuid, expected: OrderStatus) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM orders WHERE id = $1 AND status = $2")
            .bind(id)
            .bind(expected.as_str())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(self.write_missed("orders", id).await);
        }
        Ok(())
    }

    async fn insert_payment(&self, payment: &Payment) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        // Payments of one order serialize on the order row
        let total: Option<Decimal> =
            sqlx::query_scalar("SELECT total_amount FROM orders WHERE id = $1 FOR UPDATE")
                .bind(payment.order_id)
                .fetch_optional(&mut *tx)
                .await?;
        let total = total.ok_or_else(|| StoreError::Missing(format!("orders {}", payment.order_id)))?;

        let holding: Vec<&str> = PaymentStatus::ALL
            .iter()
            .filter(|status| status.holds_funds())
            .map(|status| status.as_str())
            .collect();
        let held: Decimal = sqlx::query_scalar(
            "SELECT COALESCE(SUM(amount), 0) FROM payments WHERE order_id = $1 AND status = ANY($2)",
        )
        .bind(payment.order_id)
        .bind(holding.as_slice())
        .fetch_one(&mut *tx)
        .await?;

        if held + payment.amount > total {
            return Err(StoreError::Rejected(format!(
                "order {} has {} of {} paid; {} does not fit",
                payment.order_id, held, total, payment.amount
            )));
        }

        let sql = format!(
            "INSERT INTO payments ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
            PAYMENT_COLUMNS
        );
        sqlx::query(&sql)
            .bind(payment.id)
            .bind(payment.order_id)
            .bind(payment.user_id)
            .bind(payment.amount)
            .bind(payment.status.as_str())
            .bind(payment.payment_type.as_str())
            .bind(payment.payment_method.as_str())
            .bind(&payment.transaction_id)
            .bind(payment.payment_date)
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::from_write(e, &format!("orders {}", payment.order_id)))?;

        tx.commit().await?;
        Ok(())
    }

    async fn find_payment(&self, id: Uuid) -> Result<Option<Payment>, StoreError> {
        let sql = format!("SELECT {} FROM payments WHERE id = $1", PAYMENT_COLUMNS);
        let row: Option<PaymentRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Payment::try_from).transpose()
    }

    async fn payments_for_order(&self, order_id: Uuid) -> Result<Vec<Payment>, StoreError> {
        let sql = format!(
            "SELECT {} FROM payments WHERE order_id = $1 ORDER BY payment_date, id",
            PAYMENT_COLUMNS
        );
        let rows: Vec<PaymentRow> = sqlx::query_as(&sql)
            .bind(order_id)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(Payment::try_from).collect()
    }

    async fn update_payment_status(
        &self,
        id: Uuid,
        expected: PaymentStatus,
        next: PaymentStatus,
    ) -> Result<Payment, StoreError> {
        let sql = format!(
            "UPDATE payments SET status = $3 WHERE id = $1 AND status = $2 RETURNING {}",
            PAYMENT_COLUMNS
        );
        let row: Option<PaymentRow> = sqlx::query_as(&sql)
            .bind(id)
            .bind(expected.as_str())
            .bind(next.as_str())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Payment::try_from(row),
            None => Err(self.write_missed("payments", id).await),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::payment::PaymentMethod;

    #[test]
    fn test_decode_rejects_unknown_status() {
        let result: Result<OrderStatus, _> = decode("orders.status", "LOST");
        assert!(matches!(result, Err(StoreError::Corrupt(msg)) if msg.contains("orders.status")));
    }

    #[test]
    fn test_decode_reads_stored_text() {
        let status: OrderStatus = decode("orders.status", "SHIPPED").unwrap();
        assert_eq!(status, OrderStatus::Shipped);
        let method: PaymentMethod = decode("payments.payment_method", "CASH").unwrap();
        assert_eq!(method, PaymentMethod::Cash);
    }

    #[test]
    fn test_contains_pattern_escapes_wildcards() {
        assert_eq!(contains_pattern("lamp"), "%lamp%");
        assert_eq!(contains_pattern("50%_off"), "%50\\%\\_off%");
        assert_eq!(contains_pattern("a\\b"), "%a\\\\b%");
    }

    #[test]
    fn test_product_row_carries_owner() {
        let owner = Uuid::new_v4();
        let row = ProductRow {
            id: Uuid::new_v4(),
            name: "Desk Lamp".to_string(),
            description: None,
            category: Some("Home".to_string()),
            price: Decimal::new(1999, 2),
            available_quantity: 3,
            status: "ACTIVE".to_string(),
            owner_id: Some(owner),
            created_at: Utc::now(),
        };
        let product = Product::try_from(row).unwrap();
        assert_eq!(product.owner_id, Some(owner));
        assert_eq!(product.status, crate::domain::catalog::ProductStatus::Active);
    }

    #[test]
    fn test_order_row_keeps_line_order() {
        let now = Utc::now();
        let order_id = Uuid::new_v4();
        let line = |quantity: i32| OrderItemRow {
            id: Uuid::new_v4(),
            order_id,
            product_id: Uuid::new_v4(),
            quantity,
            unit_price: Decimal::new(100, 2),
            total_price: Decimal::new(100, 2) * Decimal::from(quantity),
            created_at: now,
        };
        let row = OrderRow {
            id: order_id,
            order_number: "ORD-1234abcd".to_string(),
            status: "PENDING".to_string(),
            total_amount: Decimal::new(300, 2),
            user_id: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
        };

        let order = row.into_order(vec![line(1), line(2)]).unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.items.iter().map(|l| l.quantity).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(order.items[1].total_price, Decimal::new(200, 2));
    }
}
