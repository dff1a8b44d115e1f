//! SQLite-based store implementation

use chrono::{DateTime, Utc};
use rsvp_api::{AttachmentMeta, NewRoom, Reservation, ReservationStatus, Room, overlaps};
use rsvp_util::{PrincipalId, ReservationId, RoomId};
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, warn};

use crate::{AuditRecord, Store, StoreError, StoreResult};

/// SQLite-based store
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create a store at the given path
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory store (for testing)
    pub fn in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();

        conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;

            -- Room directory. The empty string stands in for "no location"
            -- so the (location, name) uniqueness holds for unlocated rooms.
            CREATE TABLE IF NOT EXISTS rooms (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                capacity INTEGER NOT NULL,
                location TEXT NOT NULL DEFAULT '',
                equipment TEXT,
                active INTEGER NOT NULL DEFAULT 1,
                UNIQUE (location, name)
            );

            -- Reservations. Instants are RFC 3339 UTC strings; with a fixed
            -- offset their lexicographic order is chronological.
            CREATE TABLE IF NOT EXISTS reservations (
                id TEXT PRIMARY KEY,
                room_id INTEGER NOT NULL REFERENCES rooms(id),
                start_at TEXT NOT NULL,
                end_at TEXT NOT NULL,
                title TEXT NOT NULL,
                notes TEXT,
                created_by TEXT,
                status INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT,
                CHECK (start_at < end_at)
            );

            -- Attachment metadata (bytes live in external file storage)
            CREATE TABLE IF NOT EXISTS attachments (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                reservation_id TEXT NOT NULL REFERENCES reservations(id),
                original_file_name TEXT NOT NULL,
                stored_file_name TEXT NOT NULL,
                content_type TEXT NOT NULL,
                size_bytes INTEGER NOT NULL,
                uploaded_by TEXT,
                uploaded_at TEXT NOT NULL
            );

            -- Audit log (append-only)
            CREATE TABLE IF NOT EXISTS audit_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                record_json TEXT NOT NULL
            );

            -- Indexes
            CREATE INDEX IF NOT EXISTS idx_reservations_room_status
                ON reservations(room_id, status);
            CREATE INDEX IF NOT EXISTS idx_reservations_status_created
                ON reservations(status, created_at);
            CREATE INDEX IF NOT EXISTS idx_attachments_reservation
                ON attachments(reservation_id);
            CREATE INDEX IF NOT EXISTS idx_audit_timestamp
                ON audit_log(timestamp);
            "#,
        )?;

        debug!("Store schema initialized");
        Ok(())
    }
}

fn to_stored(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn from_stored(s: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Serialization(format!("bad timestamp '{}': {}", s, e)))
}

fn room_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Room> {
    let location: String = row.get(3)?;
    Ok(Room {
        id: RoomId::new(row.get(0)?),
        name: row.get(1)?,
        capacity: row.get::<_, i64>(2)? as u32,
        location: if location.is_empty() {
            None
        } else {
            Some(location)
        },
        equipment: row.get(4)?,
        active: row.get::<_, i64>(5)? != 0,
    })
}

type ReservationRow = (
    String,         // id
    i64,            // room_id
    String,         // start_at
    String,         // end_at
    String,         // title
    Option<String>, // notes
    Option<String>, // created_by
    i64,            // status
    String,         // created_at
    Option<String>, // updated_at
);

const RESERVATION_COLUMNS: &str =
    "id, room_id, start_at, end_at, title, notes, created_by, status, created_at, updated_at";

fn reservation_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ReservationRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
        row.get(8)?,
        row.get(9)?,
    ))
}

fn reservation_from_row(row: ReservationRow) -> StoreResult<Reservation> {
    let (id, room_id, start_at, end_at, title, notes, created_by, status, created_at, updated_at) =
        row;

    let id = ReservationId::parse(&id)
        .map_err(|e| StoreError::Serialization(format!("bad reservation id '{}': {}", id, e)))?;
    let status = ReservationStatus::from_code(status)
        .ok_or_else(|| StoreError::Serialization(format!("unknown status code {}", status)))?;

    Ok(Reservation {
        id,
        room_id: RoomId::new(room_id),
        start_at: from_stored(&start_at)?,
        end_at: from_stored(&end_at)?,
        title,
        notes,
        created_by: created_by.map(PrincipalId::new),
        status,
        created_at: from_stored(&created_at)?,
        updated_at: updated_at.as_deref().map(from_stored).transpose()?,
    })
}

impl Store for SqliteStore {
    fn add_room(&self, room: &NewRoom) -> StoreResult<Room> {
        let conn = self.conn.lock().unwrap();

        conn.execute(
            "INSERT INTO rooms (name, capacity, location, equipment, active)
             VALUES (?, ?, ?, ?, 1)",
            params![
                room.name,
                room.capacity as i64,
                room.location.as_deref().unwrap_or(""),
                room.equipment,
            ],
        )?;

        let id = conn.last_insert_rowid();
        debug!(room_id = id, name = %room.name, "Room added");

        Ok(Room {
            id: RoomId::new(id),
            name: room.name.clone(),
            capacity: room.capacity,
            location: room.location.clone(),
            equipment: room.equipment.clone(),
            active: true,
        })
    }

    fn get_room(&self, id: RoomId) -> StoreResult<Option<Room>> {
        let conn = self.conn.lock().unwrap();

        let room = conn
            .query_row(
                "SELECT id, name, capacity, location, equipment, active
                 FROM rooms WHERE id = ?",
                [id.get()],
                room_from_row,
            )
            .optional()?;

        Ok(room)
    }

    fn list_rooms(&self) -> StoreResult<Vec<Room>> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn.prepare(
            "SELECT id, name, capacity, location, equipment, active
             FROM rooms ORDER BY location, name",
        )?;
        let rooms = stmt
            .query_map([], room_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rooms)
    }

    fn set_room_active(&self, id: RoomId, active: bool) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();

        let changed = conn.execute(
            "UPDATE rooms SET active = ? WHERE id = ?",
            params![active as i64, id.get()],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(format!("room {}", id)));
        }

        debug!(room_id = %id, active, "Room active flag updated");
        Ok(())
    }

    fn insert_reservation(&self, reservation: &Reservation) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();

        conn.execute(
            "INSERT INTO reservations
             (id, room_id, start_at, end_at, title, notes, created_by, status, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                reservation.id.to_string(),
                reservation.room_id.get(),
                to_stored(&reservation.start_at),
                to_stored(&reservation.end_at),
                reservation.title,
                reservation.notes,
                reservation.created_by.as_ref().map(|p| p.as_str()),
                reservation.status.code(),
                to_stored(&reservation.created_at),
                reservation.updated_at.as_ref().map(to_stored),
            ],
        )?;

        debug!(reservation_id = %reservation.id, room_id = %reservation.room_id, "Reservation inserted");
        Ok(())
    }

    fn load_reservation(&self, id: &ReservationId) -> StoreResult<Option<Reservation>> {
        let conn = self.conn.lock().unwrap();

        let row = conn
            .query_row(
                &format!(
                    "SELECT {} FROM reservations WHERE id = ?",
                    RESERVATION_COLUMNS
                ),
                [id.to_string()],
                reservation_row,
            )
            .optional()?;

        row.map(reservation_from_row).transpose()
    }

    fn save_reservation(&self, reservation: &Reservation) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();

        let changed = conn.execute(
            "UPDATE reservations
             SET room_id = ?, start_at = ?, end_at = ?, title = ?, notes = ?,
                 created_by = ?, status = ?, updated_at = ?
             WHERE id = ?",
            params![
                reservation.room_id.get(),
                to_stored(&reservation.start_at),
                to_stored(&reservation.end_at),
                reservation.title,
                reservation.notes,
                reservation.created_by.as_ref().map(|p| p.as_str()),
                reservation.status.code(),
                reservation.updated_at.as_ref().map(to_stored),
                reservation.id.to_string(),
            ],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(format!(
                "reservation {}",
                reservation.id
            )));
        }

        debug!(reservation_id = %reservation.id, status = %reservation.status, "Reservation saved");
        Ok(())
    }

    fn query_approved_overlapping(
        &self,
        room_id: RoomId,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
        exclude: Option<&ReservationId>,
    ) -> StoreResult<Vec<Reservation>> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM reservations WHERE room_id = ? AND status = ?",
            RESERVATION_COLUMNS
        ))?;
        let rows = stmt
            .query_map(
                params![room_id.get(), ReservationStatus::Approved.code()],
                reservation_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;

        // The overlap rule lives in one place (rsvp_api::overlaps); the SQL
        // only narrows to the room's approved set via the index.
        let mut matches = Vec::new();
        for row in rows {
            let reservation = reservation_from_row(row)?;
            if let Some(excluded) = exclude {
                if &reservation.id == excluded {
                    continue;
                }
            }
            if overlaps(
                reservation.start_at,
                reservation.end_at,
                window_start,
                window_end,
            ) {
                matches.push(reservation);
            }
        }
        matches.sort_by_key(|r| r.start_at);

        Ok(matches)
    }

    fn query_pending_older_than(
        &self,
        threshold: DateTime<Utc>,
    ) -> StoreResult<Vec<Reservation>> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM reservations
             WHERE status = ? AND created_at < ?
             ORDER BY created_at",
            RESERVATION_COLUMNS
        ))?;
        let rows = stmt
            .query_map(
                params![ReservationStatus::Pending.code(), to_stored(&threshold)],
                reservation_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter().map(reservation_from_row).collect()
    }

    fn sweep_stale_pending(
        &self,
        threshold: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> StoreResult<Vec<ReservationId>> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        let ids: Vec<String> = {
            let mut stmt = tx.prepare(
                "SELECT id FROM reservations WHERE status = ? AND created_at < ?",
            )?;
            let rows = stmt.query_map(
                params![ReservationStatus::Pending.code(), to_stored(&threshold)],
                |row| row.get(0),
            )?;
            rows.collect::<Result<Vec<_>, _>>()?
        };

        // One shared `now` for the whole batch; committed atomically so the
        // threshold cannot shift mid-sweep.
        for id in &ids {
            tx.execute(
                "UPDATE reservations SET status = ?, updated_at = ? WHERE id = ?",
                params![ReservationStatus::Cancelled.code(), to_stored(&now), id],
            )?;
        }

        tx.commit()?;

        ids.iter()
            .map(|id| {
                ReservationId::parse(id).map_err(|e| {
                    StoreError::Serialization(format!("bad reservation id '{}': {}", id, e))
                })
            })
            .collect()
    }

    fn add_attachment(&self, attachment: &AttachmentMeta) -> StoreResult<i64> {
        let conn = self.conn.lock().unwrap();

        conn.execute(
            "INSERT INTO attachments
             (reservation_id, original_file_name, stored_file_name, content_type,
              size_bytes, uploaded_by, uploaded_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
            params![
                attachment.reservation_id.to_string(),
                attachment.original_file_name,
                attachment.stored_file_name,
                attachment.content_type,
                attachment.size_bytes,
                attachment.uploaded_by.as_ref().map(|p| p.as_str()),
                to_stored(&attachment.uploaded_at),
            ],
        )?;

        let id = conn.last_insert_rowid();
        debug!(attachment_id = id, reservation_id = %attachment.reservation_id, "Attachment recorded");
        Ok(id)
    }

    fn list_attachments(
        &self,
        reservation_id: &ReservationId,
    ) -> StoreResult<Vec<AttachmentMeta>> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn.prepare(
            "SELECT id, reservation_id, original_file_name, stored_file_name,
                    content_type, size_bytes, uploaded_by, uploaded_at
             FROM attachments WHERE reservation_id = ?
             ORDER BY uploaded_at DESC, id DESC",
        )?;
        let rows = stmt
            .query_map([reservation_id.to_string()], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, i64>(5)?,
                    row.get::<_, Option<String>>(6)?,
                    row.get::<_, String>(7)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(
                |(id, rid, original, stored, content_type, size, uploaded_by, uploaded_at)| {
                    Ok(AttachmentMeta {
                        id,
                        reservation_id: ReservationId::parse(&rid).map_err(|e| {
                            StoreError::Serialization(format!(
                                "bad reservation id '{}': {}",
                                rid, e
                            ))
                        })?,
                        original_file_name: original,
                        stored_file_name: stored,
                        content_type,
                        size_bytes: size,
                        uploaded_by: uploaded_by.map(PrincipalId::new),
                        uploaded_at: from_stored(&uploaded_at)?,
                    })
                },
            )
            .collect()
    }

    fn append_audit(&self, mut record: AuditRecord) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        let record_json = serde_json::to_string(&record.kind)?;

        conn.execute(
            "INSERT INTO audit_log (timestamp, record_json) VALUES (?, ?)",
            params![to_stored(&record.timestamp), record_json],
        )?;

        record.id = conn.last_insert_rowid();
        debug!(record_id = record.id, "Audit record appended");

        Ok(())
    }

    fn recent_audits(&self, limit: usize) -> StoreResult<Vec<AuditRecord>> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn.prepare(
            "SELECT id, timestamp, record_json FROM audit_log ORDER BY id DESC LIMIT ?",
        )?;
        let rows = stmt
            .query_map([limit as i64], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut records = Vec::new();
        for (id, timestamp_str, record_json) in rows {
            let timestamp = from_stored(&timestamp_str).unwrap_or_else(|_| rsvp_util::now());
            let kind = serde_json::from_str(&record_json)?;
            records.push(AuditRecord {
                id,
                timestamp,
                kind,
            });
        }

        Ok(records)
    }

    fn is_healthy(&self) -> bool {
        match self.conn.lock() {
            Ok(conn) => conn.query_row("SELECT 1", [], |_| Ok(())).is_ok(),
            Err(_) => {
                warn!("Store lock poisoned");
                false
            }
        }
    }
}
