// ============================================================================
// Domain Layer - Business Logic
// ============================================================================
//
// Each area has its own subdirectory with:
// - Value objects / entities
// - Commands
// - Errors
// - Aggregate implementation
// - Command handler (or service)
//
// Persistence is reached only through the store::MarketStore trait.
//
// ============================================================================

pub mod errors;
pub mod lifecycle;

pub mod catalog;
pub mod order;
pub mod payment;
