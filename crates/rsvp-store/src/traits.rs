//! Store trait definitions

use chrono::{DateTime, Utc};
use rsvp_api::{AttachmentMeta, NewRoom, Reservation, Room};
use rsvp_util::{ReservationId, RoomId};

use crate::{AuditRecord, StoreResult};

/// Main store trait.
///
/// Every call commits atomically; the engine relies on that plus its own
/// per-room serialization for the no-double-booking invariant.
pub trait Store: Send + Sync {
    // Room directory

    /// Create a room; the store assigns the identity.
    /// Fails when another room already holds the same (location, name) pair.
    fn add_room(&self, room: &NewRoom) -> StoreResult<Room>;

    /// Look up a room by ID
    fn get_room(&self, id: RoomId) -> StoreResult<Option<Room>>;

    /// List all rooms, ordered by location then name
    fn list_rooms(&self) -> StoreResult<Vec<Room>>;

    /// Flip a room's active flag. Inactive rooms keep their history.
    fn set_room_active(&self, id: RoomId, active: bool) -> StoreResult<()>;

    // Reservations

    /// Persist a newly created reservation
    fn insert_reservation(&self, reservation: &Reservation) -> StoreResult<()>;

    /// Load a reservation by ID
    fn load_reservation(&self, id: &ReservationId) -> StoreResult<Option<Reservation>>;

    /// Write back a mutated reservation (status/updated_at changes)
    fn save_reservation(&self, reservation: &Reservation) -> StoreResult<()>;

    /// All Approved reservations for the room whose window overlaps the
    /// given one, ordered by start instant ascending. `exclude` omits a
    /// reservation from the scan (used when re-checking at approval time).
    fn query_approved_overlapping(
        &self,
        room_id: RoomId,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
        exclude: Option<&ReservationId>,
    ) -> StoreResult<Vec<Reservation>>;

    /// All Pending reservations created strictly before the threshold
    fn query_pending_older_than(
        &self,
        threshold: DateTime<Utc>,
    ) -> StoreResult<Vec<Reservation>>;

    /// Cancel every Pending reservation created strictly before the
    /// threshold, stamping all of them with the same `now`. Runs in one
    /// transaction so the whole batch advances together. Returns the IDs
    /// of the cancelled reservations; an empty result is normal.
    fn sweep_stale_pending(
        &self,
        threshold: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> StoreResult<Vec<ReservationId>>;

    // Attachment metadata

    /// Record attachment metadata; returns the assigned ID.
    /// The reservation must exist.
    fn add_attachment(&self, attachment: &AttachmentMeta) -> StoreResult<i64>;

    /// List attachment metadata for a reservation, newest first
    fn list_attachments(&self, reservation_id: &ReservationId)
        -> StoreResult<Vec<AttachmentMeta>>;

    // Audit log

    /// Append an audit record
    fn append_audit(&self, record: AuditRecord) -> StoreResult<()>;

    /// Get recent audit records, newest first
    fn recent_audits(&self, limit: usize) -> StoreResult<Vec<AuditRecord>>;

    // Health

    /// Check if the store is healthy
    fn is_healthy(&self) -> bool;
}
