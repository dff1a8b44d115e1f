//! Shared types for the rsvpd domain

use chrono::{DateTime, Utc};
use rsvp_util::{PrincipalId, ReservationId, RoomId, format_instant};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a reservation.
///
/// Pending is the initial state. Rejected and Cancelled are terminal:
/// no transition is defined out of either.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    Pending,
    Approved,
    Rejected,
    Cancelled,
}

impl ReservationStatus {
    /// Integer code used in storage (stable, matches historical data)
    pub fn code(&self) -> i64 {
        match self {
            ReservationStatus::Pending => 0,
            ReservationStatus::Approved => 1,
            ReservationStatus::Rejected => 2,
            ReservationStatus::Cancelled => 3,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(ReservationStatus::Pending),
            1 => Some(ReservationStatus::Approved),
            2 => Some(ReservationStatus::Rejected),
            3 => Some(ReservationStatus::Cancelled),
            _ => None,
        }
    }

    /// Whether this status admits no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ReservationStatus::Rejected | ReservationStatus::Cancelled
        )
    }
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ReservationStatus::Pending => "pending",
            ReservationStatus::Approved => "approved",
            ReservationStatus::Rejected => "rejected",
            ReservationStatus::Cancelled => "cancelled",
        };
        write!(f, "{}", s)
    }
}

/// A bookable room. Rooms are referenced by reservations, never owned by them;
/// deactivating a room stops new bookings but keeps its history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub id: RoomId,
    pub name: String,
    pub capacity: u32,
    pub location: Option<String>,
    pub equipment: Option<String>,
    pub active: bool,
}

impl Room {
    /// Display label combining location and name, for operator-facing output
    pub fn label(&self) -> String {
        match self.location.as_deref() {
            Some(loc) if !loc.is_empty() => format!("{} / {}", loc, self.name),
            _ => self.name.clone(),
        }
    }
}

/// Fields for creating a room; the store assigns the identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRoom {
    pub name: String,
    pub capacity: u32,
    pub location: Option<String>,
    pub equipment: Option<String>,
}

/// A time-bounded booking of a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: ReservationId,
    pub room_id: RoomId,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub title: String,
    pub notes: Option<String>,
    /// Nullable: the creator's account may be deleted after the fact
    pub created_by: Option<PrincipalId>,
    pub status: ReservationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Reservation {
    /// Build a new Pending reservation from a validated submission.
    pub fn new(
        room_id: RoomId,
        start_at: DateTime<Utc>,
        end_at: DateTime<Utc>,
        title: String,
        notes: Option<String>,
        created_by: PrincipalId,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: ReservationId::new(),
            room_id,
            start_at,
            end_at,
            title,
            notes,
            created_by: Some(created_by),
            status: ReservationStatus::Pending,
            created_at: now,
            updated_at: None,
        }
    }
}

/// A reservation submission, as received from the surrounding controllers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitRequest {
    pub room_id: RoomId,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub title: String,
    pub notes: Option<String>,
}

/// Identity and window of an approved reservation that blocks another one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictInfo {
    pub reservation_id: ReservationId,
    pub title: String,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
}

impl From<&Reservation> for ConflictInfo {
    fn from(r: &Reservation) -> Self {
        Self {
            reservation_id: r.id.clone(),
            title: r.title.clone(),
            start_at: r.start_at,
            end_at: r.end_at,
        }
    }
}

impl fmt::Display for ConflictInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "'{}' ({} - {})",
            self.title,
            format_instant(&self.start_at),
            format_instant(&self.end_at)
        )
    }
}

/// Attachment metadata. The bytes live in external file storage; the core
/// only records the association with a reservation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentMeta {
    pub id: i64,
    pub reservation_id: ReservationId,
    pub original_file_name: String,
    pub stored_file_name: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub uploaded_by: Option<PrincipalId>,
    pub uploaded_at: DateTime<Utc>,
}
