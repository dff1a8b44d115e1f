//! Audit record types

use chrono::{DateTime, Utc};
use rsvp_util::{ReservationId, RoomId};
use serde::{Deserialize, Serialize};

/// Types of audit records
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditKind {
    /// Service started
    ServiceStarted,

    /// Service stopped
    ServiceStopped,

    /// Reservation submitted and persisted as Pending
    ReservationSubmitted {
        reservation_id: ReservationId,
        room_id: RoomId,
    },

    /// Reservation approved by a manager
    ReservationApproved { reservation_id: ReservationId },

    /// Approval refused because of a collision with an approved reservation
    ApprovalDenied {
        reservation_id: ReservationId,
        conflicting_id: ReservationId,
    },

    /// Reservation rejected by a manager
    ReservationRejected { reservation_id: ReservationId },

    /// Reservation cancelled by its creator
    ReservationCancelled { reservation_id: ReservationId },

    /// Stale Pending reservations auto-cancelled by the reaper
    StalePendingSwept { count: usize },
}

/// Full audit record with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Unique record ID
    pub id: i64,

    /// Record timestamp
    pub timestamp: DateTime<Utc>,

    /// Record type and details
    pub kind: AuditKind,
}

impl AuditRecord {
    pub fn new(kind: AuditKind) -> Self {
        Self {
            id: 0, // Will be set by store
            timestamp: rsvp_util::now(),
            kind,
        }
    }
}
