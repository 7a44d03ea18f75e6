use sqlx::PgPool;

// ============================================================================
// Schema Bootstrap
// ============================================================================
//
// Idempotent DDL run at start-up. Postgres prepares one statement per
// query, so each statement is executed on its own.
//
// ============================================================================

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id UUID PRIMARY KEY,
        username VARCHAR(50) NOT NULL UNIQUE,
        email VARCHAR(255) NOT NULL UNIQUE,
        first_name VARCHAR(100),
        last_name VARCHAR(100),
        created_at TIMESTAMPTZ NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS products (
        id UUID PRIMARY KEY,
        name VARCHAR(255) NOT NULL,
        description TEXT,
        category VARCHAR(100),
        price NUMERIC(12, 2) NOT NULL CHECK (price >= 0),
        available_quantity INTEGER NOT NULL CHECK (available_quantity >= 0),
        status VARCHAR(20) NOT NULL,
        owner_id UUID REFERENCES users (id),
        created_at TIMESTAMPTZ NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_products_owner ON products (owner_id)",
    "CREATE INDEX IF NOT EXISTS idx_products_category ON products (LOWER(category))",
    r#"
    CREATE TABLE IF NOT EXISTS product_ratings (
        id UUID PRIMARY KEY,
        product_id UUID NOT NULL REFERENCES products (id) ON DELETE CASCADE,
        user_id UUID NOT NULL REFERENCES users (id),
        stars SMALLINT NOT NULL CHECK (stars BETWEEN 1 AND 5),
        created_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL,
        UNIQUE (product_id, user_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS orders (
        id UUID PRIMARY KEY,
        order_number VARCHAR(20) NOT NULL UNIQUE,
        status VARCHAR(20) NOT NULL,
        total_amount NUMERIC(14, 2) NOT NULL,
        user_id UUID NOT NULL REFERENCES users (id),
        created_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_orders_user_created ON orders (user_id, created_at DESC)",
    r#"
    CREATE TABLE IF NOT EXISTS order_items (
        id UUID PRIMARY KEY,
        order_id UUID NOT NULL REFERENCES orders (id) ON DELETE CASCADE,
        position INTEGER NOT NULL,
        product_id UUID NOT NULL REFERENCES products (id),
        quantity INTEGER NOT NULL CHECK (quantity >= 1),
        unit_price NUMERIC(12, 2) NOT NULL,
        total_price NUMERIC(14, 2) NOT NULL,
        created_at TIMESTAMPTZ NOT NULL,
        UNIQUE (order_id, position)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS payments (
        id UUID PRIMARY KEY,
        order_id UUID NOT NULL REFERENCES orders (id) ON DELETE CASCADE,
        user_id UUID NOT NULL REFERENCES users (id),
        amount NUMERIC(14, 2) NOT NULL CHECK (amount >= 0),
        status VARCHAR(20) NOT NULL,
        payment_type VARCHAR(20) NOT NULL,
        payment_method VARCHAR(20) NOT NULL,
        transaction_id VARCHAR(100),
        payment_date TIMESTAMPTZ NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_payments_order ON payments (order_id, payment_date)",
];

/// Create tables and indexes that do not exist yet.
pub async fn ensure_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    tracing::info!(statements = SCHEMA.len(), "Database schema ready");
    Ok(())
}
