use crate::utils::IsTransient;

// ============================================================================
// Persistence Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A compare-and-set write found the row in a different state than expected
    #[error("Record was modified concurrently: {0}")]
    Conflict(String),

    /// The row targeted by a write no longer exists
    #[error("Record not found: {0}")]
    Missing(String),

    #[error("Duplicate record: {0}")]
    Duplicate(String),

    /// The write broke a column limit or a check constraint
    #[error("Rejected by storage: {0}")]
    Rejected(String),

    /// A stored value could not be mapped back into the domain
    #[error("Corrupt record: {0}")]
    Corrupt(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Postgres SQLSTATE codes worth retrying: serialization_failure, deadlock_detected
const RETRYABLE_SQLSTATES: [&str; 2] = ["40001", "40P01"];

const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";

/// string_data_right_truncation, numeric_value_out_of_range, check_violation
const REJECTED_SQLSTATES: [&str; 3] = ["22001", "22003", "23514"];

impl StoreError {
    /// Map a sqlx write error: unique violations become `Duplicate`, a
    /// vanished parent row becomes `Missing`, values the columns cannot
    /// hold become `Rejected`.
    pub fn from_write(error: sqlx::Error, what: &str) -> Self {
        if let sqlx::Error::Database(db) = &error {
            match db.code().as_deref() {
                Some(UNIQUE_VIOLATION) => return StoreError::Duplicate(what.to_string()),
                Some(FOREIGN_KEY_VIOLATION) => return StoreError::Missing(what.to_string()),
                Some(code) if REJECTED_SQLSTATES.contains(&code) => {
                    return StoreError::Rejected(format!("{}: {}", what, db.message()))
                }
                _ => {}
            }
        }
        StoreError::Database(error)
    }
}

impl IsTransient for StoreError {
    fn is_transient(&self) -> bool {
        match self {
            StoreError::Conflict(_) => true,
            StoreError::Database(sqlx::Error::Database(db)) => db
                .code()
                .map(|code| RETRYABLE_SQLSTATES.contains(&&*code))
                .unwrap_or(false),
            StoreError::Database(sqlx::Error::PoolTimedOut) => true,
            _ => false,
        }
    }
}
