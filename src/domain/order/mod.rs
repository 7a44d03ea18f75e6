// ============================================================================
// Order Domain - Business Logic for Orders
// ============================================================================
//
// This module contains ALL Order-specific code:
// - Value objects (OrderLineRequest, OrderStatus and its transition table)
// - Commands (PlaceOrder, ChangeStatus) and the cancellation policy
// - Errors (OrderError enum)
// - Aggregate (Order, OrderLine, the pure placement algorithm)
// - Command Handler (OrderCommandHandler)
//
// ============================================================================

pub mod value_objects;
pub mod commands;
pub mod errors;
pub mod aggregate;
pub mod command_handler;

// Re-export for convenience
pub use value_objects::*;
pub use commands::*;
pub use errors::*;
pub use aggregate::*;
pub use command_handler::*;
