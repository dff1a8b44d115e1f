//! Shared domain types for rsvpd
//!
//! This crate defines:
//! - The Room and Reservation entities and the reservation status enum
//! - The interval overlap rule used for conflict detection
//! - Field-scoped validation for submission requests
//! - The collaborator contract for principal/role facts

mod interval;
mod principal;
mod types;
mod validation;

pub use interval::*;
pub use principal::*;
pub use types::*;
pub use validation::*;
