// ============================================================================
// Catalog Domain - users, products and ratings
// ============================================================================

pub mod entities;
pub mod errors;
pub mod rating;
pub mod service;

pub use entities::*;
pub use errors::*;
pub use rating::*;
pub use service::*;
