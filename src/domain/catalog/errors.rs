use uuid::Uuid;

use crate::domain::errors::ErrorKind;
use crate::store::StoreError;

// ============================================================================
// Catalog Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Product not found: {0}")]
    ProductNotFound(Uuid),

    #[error("Already registered: {0}")]
    AlreadyExists(String),

    #[error("Invalid user: {0}")]
    InvalidUser(String),

    #[error("Invalid product: {0}")]
    InvalidProduct(String),

    #[error("Stars must be between 1 and 5, got {0}")]
    InvalidRating(i32),

    #[error(transparent)]
    Storage(#[from] StoreError),
}

impl CatalogError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CatalogError::UserNotFound(_) | CatalogError::ProductNotFound(_) => ErrorKind::NotFound,
            CatalogError::AlreadyExists(_) => ErrorKind::Conflict,
            CatalogError::InvalidUser(_)
            | CatalogError::InvalidProduct(_)
            | CatalogError::InvalidRating(_) => ErrorKind::InvalidRequest,
            CatalogError::Storage(StoreError::Duplicate(_)) => ErrorKind::Conflict,
            CatalogError::Storage(StoreError::Rejected(_)) => ErrorKind::InvalidRequest,
            CatalogError::Storage(_) => ErrorKind::Internal,
        }
    }
}
