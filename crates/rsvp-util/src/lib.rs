//! Shared utilities for rsvpd
//!
//! This crate provides:
//! - ID types (RoomId, ReservationId, PrincipalId)
//! - Time utilities (UTC clock with mock support for development)
//! - Default paths for config and data directories

mod ids;
mod paths;
mod time;

pub use ids::*;
pub use paths::*;
pub use time::*;
