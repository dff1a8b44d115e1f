//! Scheduling error taxonomy

use rsvp_api::{ConflictInfo, FieldError, ReservationStatus};
use rsvp_store::StoreError;
use rsvp_util::ReservationId;
use thiserror::Error;

/// Errors produced by the scheduling engine
#[derive(Debug, Error)]
pub enum SchedulingError {
    #[error("Validation failed: {}", join_fields(.0))]
    Validation(Vec<FieldError>),

    #[error("Schedule conflict with {0}")]
    Conflict(ConflictInfo),

    #[error("Operation not permitted for this principal")]
    Forbidden,

    #[error("No transition defined from status '{from}'")]
    InvalidTransition { from: ReservationStatus },

    #[error("Reservation is already closed or over")]
    AlreadyTerminal,

    #[error("Reservation not found: {0}")]
    NotFound(ReservationId),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

fn join_fields(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

pub type SchedulingResult<T> = Result<T, SchedulingError>;
