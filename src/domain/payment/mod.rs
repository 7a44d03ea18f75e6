// ============================================================================
// Payment Domain
// ============================================================================
//
// Payments recorded against orders, with their own status lifecycle:
// PENDING -> COMPLETED | FAILED, COMPLETED -> REFUNDED.
//
// ============================================================================

pub mod value_objects;
pub mod commands;
pub mod errors;
pub mod aggregate;
pub mod command_handler;

pub use value_objects::*;
pub use commands::*;
pub use errors::*;
pub use aggregate::*;
pub use command_handler::*;
