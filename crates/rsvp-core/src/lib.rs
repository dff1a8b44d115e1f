//! Reservation scheduling engine for rsvpd
//!
//! Provides:
//! - `SchedulingEngine`: submission, approval, rejection and cancellation
//!   of reservations, with the no-double-booking gate on approval
//! - `Reaper`: the background loop that cancels stale Pending reservations
//! - `SchedulingError`: the failure taxonomy shared by both

mod engine;
mod error;
mod reaper;

pub use engine::*;
pub use error::*;
pub use reaper::*;
