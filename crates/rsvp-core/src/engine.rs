//! The scheduling engine
//!
//! All lifecycle decisions go through here: submission, approval,
//! rejection, cancellation. The engine takes `now` explicitly so tests
//! can pin the clock; the daemon passes `rsvp_util::now()`.

use chrono::{DateTime, Utc};
use rsvp_api::{
    ConflictInfo, PrincipalFacts, Reservation, ReservationStatus, SubmitRequest,
    validate_submission,
};
use rsvp_config::EngineSettings;
use rsvp_store::{AuditKind, AuditRecord, Store};
use rsvp_util::{PrincipalId, ReservationId, RoomId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

use crate::{SchedulingError, SchedulingResult};

/// The reservation scheduling engine.
///
/// Approval is the only transition that can violate the one-approved-
/// reservation-per-window invariant, so the check-then-act sequence in
/// [`approve`](Self::approve) is serialized per room through a lock table.
/// Every other operation touches a single reservation and relies on the
/// store's per-call atomicity.
pub struct SchedulingEngine {
    store: Arc<dyn Store>,
    principals: Arc<dyn PrincipalFacts>,
    settings: EngineSettings,
    room_locks: Mutex<HashMap<RoomId, Arc<Mutex<()>>>>,
}

impl SchedulingEngine {
    pub fn new(
        store: Arc<dyn Store>,
        principals: Arc<dyn PrincipalFacts>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            store,
            principals,
            settings,
            room_locks: Mutex::new(HashMap::new()),
        }
    }

    fn room_lock(&self, room_id: RoomId) -> Arc<Mutex<()>> {
        let mut locks = self.room_locks.lock().unwrap();
        locks.entry(room_id).or_default().clone()
    }

    /// Submit a reservation request. On success the reservation is
    /// persisted as Pending and returned.
    ///
    /// The request is validated against the room directory and the clock,
    /// then checked against Approved reservations for the room. A collision
    /// with an Approved reservation fails before anything is persisted;
    /// collisions with other Pending requests are allowed, they race at
    /// approval time instead.
    pub fn submit(
        &self,
        request: &SubmitRequest,
        requester: &PrincipalId,
        now: DateTime<Utc>,
    ) -> SchedulingResult<Reservation> {
        let room = self.store.get_room(request.room_id)?;
        let errors = validate_submission(room.as_ref(), request, now, self.settings.start_grace);
        if !errors.is_empty() {
            debug!(room_id = %request.room_id, errors = errors.len(), "Submission failed validation");
            return Err(SchedulingError::Validation(errors));
        }

        if let Some(existing) = self
            .store
            .query_approved_overlapping(request.room_id, request.start_at, request.end_at, None)?
            .into_iter()
            .next()
        {
            let conflict = ConflictInfo::from(&existing);
            info!(room_id = %request.room_id, conflicting_id = %conflict.reservation_id,
                "Submission refused: window already booked");
            return Err(SchedulingError::Conflict(conflict));
        }

        let reservation = Reservation::new(
            request.room_id,
            request.start_at,
            request.end_at,
            request.title.clone(),
            request.notes.clone(),
            requester.clone(),
            now,
        );
        self.store.insert_reservation(&reservation)?;

        info!(reservation_id = %reservation.id, room_id = %reservation.room_id,
            requester = %requester, "Reservation submitted");
        let _ = self
            .store
            .append_audit(AuditRecord::new(AuditKind::ReservationSubmitted {
                reservation_id: reservation.id.clone(),
                room_id: reservation.room_id,
            }));

        Ok(reservation)
    }

    /// Approve a Pending reservation. Manager role required.
    ///
    /// The overlap check is re-run here, under the room lock, against the
    /// Approved set as it exists at this instant. Approving an already
    /// Approved reservation is a no-op success.
    pub fn approve(
        &self,
        id: &ReservationId,
        principal: &PrincipalId,
        now: DateTime<Utc>,
    ) -> SchedulingResult<Reservation> {
        if !self.principals.has_manager_role(principal) {
            return Err(SchedulingError::Forbidden);
        }

        let reservation = self
            .store
            .load_reservation(id)?
            .ok_or_else(|| SchedulingError::NotFound(id.clone()))?;

        let lock = self.room_lock(reservation.room_id);
        let _guard = lock.lock().unwrap();

        // Reload under the lock; a concurrent approval for the same room
        // may have landed since the first read.
        let mut reservation = self
            .store
            .load_reservation(id)?
            .ok_or_else(|| SchedulingError::NotFound(id.clone()))?;

        match reservation.status {
            ReservationStatus::Approved => {
                debug!(reservation_id = %id, "Already approved, nothing to do");
                return Ok(reservation);
            }
            ReservationStatus::Pending => {}
            from => return Err(SchedulingError::InvalidTransition { from }),
        }

        if let Some(existing) = self
            .store
            .query_approved_overlapping(
                reservation.room_id,
                reservation.start_at,
                reservation.end_at,
                Some(id),
            )?
            .into_iter()
            .next()
        {
            let conflict = ConflictInfo::from(&existing);
            warn!(reservation_id = %id, conflicting_id = %conflict.reservation_id,
                "Approval denied: window already booked");
            let _ = self
                .store
                .append_audit(AuditRecord::new(AuditKind::ApprovalDenied {
                    reservation_id: id.clone(),
                    conflicting_id: conflict.reservation_id.clone(),
                }));
            return Err(SchedulingError::Conflict(conflict));
        }

        reservation.status = ReservationStatus::Approved;
        reservation.updated_at = Some(now);
        self.store.save_reservation(&reservation)?;

        info!(reservation_id = %id, room_id = %reservation.room_id,
            approver = %principal, "Reservation approved");
        let _ = self
            .store
            .append_audit(AuditRecord::new(AuditKind::ReservationApproved {
                reservation_id: id.clone(),
            }));

        Ok(reservation)
    }

    /// Reject a Pending reservation. Manager role required; no overlap
    /// check. Rejecting an already Rejected reservation is a no-op success.
    pub fn reject(
        &self,
        id: &ReservationId,
        principal: &PrincipalId,
        now: DateTime<Utc>,
    ) -> SchedulingResult<Reservation> {
        if !self.principals.has_manager_role(principal) {
            return Err(SchedulingError::Forbidden);
        }

        let mut reservation = self
            .store
            .load_reservation(id)?
            .ok_or_else(|| SchedulingError::NotFound(id.clone()))?;

        match reservation.status {
            ReservationStatus::Rejected => {
                debug!(reservation_id = %id, "Already rejected, nothing to do");
                return Ok(reservation);
            }
            ReservationStatus::Pending => {}
            from => return Err(SchedulingError::InvalidTransition { from }),
        }

        reservation.status = ReservationStatus::Rejected;
        reservation.updated_at = Some(now);
        self.store.save_reservation(&reservation)?;

        info!(reservation_id = %id, approver = %principal, "Reservation rejected");
        let _ = self
            .store
            .append_audit(AuditRecord::new(AuditKind::ReservationRejected {
                reservation_id: id.clone(),
            }));

        Ok(reservation)
    }

    /// Cancel a reservation. Only its creator may cancel, and only while
    /// the reservation is still open (not Rejected or Cancelled) and not
    /// yet over (`end_at > now`).
    pub fn cancel(
        &self,
        id: &ReservationId,
        principal: &PrincipalId,
        now: DateTime<Utc>,
    ) -> SchedulingResult<Reservation> {
        let mut reservation = self
            .store
            .load_reservation(id)?
            .ok_or_else(|| SchedulingError::NotFound(id.clone()))?;

        // A missing creator reference means nobody holds cancel rights
        if reservation.created_by.as_ref() != Some(principal) {
            return Err(SchedulingError::Forbidden);
        }

        if reservation.status.is_terminal() || reservation.end_at <= now {
            return Err(SchedulingError::AlreadyTerminal);
        }

        reservation.status = ReservationStatus::Cancelled;
        reservation.updated_at = Some(now);
        self.store.save_reservation(&reservation)?;

        info!(reservation_id = %id, creator = %principal, "Reservation cancelled");
        let _ = self
            .store
            .append_audit(AuditRecord::new(AuditKind::ReservationCancelled {
                reservation_id: id.clone(),
            }));

        Ok(reservation)
    }

    /// All Approved reservations for the room whose window overlaps the
    /// given one, ordered by start instant ascending.
    pub fn list_conflicts(
        &self,
        room_id: RoomId,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
        exclude: Option<&ReservationId>,
    ) -> SchedulingResult<Vec<Reservation>> {
        Ok(self
            .store
            .query_approved_overlapping(room_id, window_start, window_end, exclude)?)
    }

    /// Load a reservation by ID
    pub fn get_reservation(&self, id: &ReservationId) -> SchedulingResult<Reservation> {
        self.store
            .load_reservation(id)?
            .ok_or_else(|| SchedulingError::NotFound(id.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rsvp_api::{NewRoom, Room, StaticPrincipalFacts};
    use rsvp_store::SqliteStore;

    const MANAGER: &str = "mgr";
    const ALICE: &str = "alice";
    const BOB: &str = "bob";

    fn base_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap()
    }

    fn setup() -> (SchedulingEngine, Arc<SqliteStore>, Room) {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let room = store
            .add_room(&NewRoom {
                name: "A-101".into(),
                capacity: 12,
                location: Some("North wing".into()),
                equipment: None,
            })
            .unwrap();
        let facts = StaticPrincipalFacts::new([PrincipalId::new(MANAGER)]);
        let engine = SchedulingEngine::new(
            store.clone(),
            Arc::new(facts),
            EngineSettings::default(),
        );
        (engine, store, room)
    }

    fn request(room_id: RoomId, start_min: i64, end_min: i64, now: DateTime<Utc>) -> SubmitRequest {
        SubmitRequest {
            room_id,
            start_at: now + chrono::Duration::minutes(start_min),
            end_at: now + chrono::Duration::minutes(end_min),
            title: "Meeting".into(),
            notes: None,
        }
    }

    #[test]
    fn submit_persists_pending() {
        let (engine, store, room) = setup();
        let now = base_now();

        let reservation = engine
            .submit(&request(room.id, 60, 120, now), &PrincipalId::new(ALICE), now)
            .unwrap();

        assert_eq!(reservation.status, ReservationStatus::Pending);
        assert_eq!(reservation.created_by, Some(PrincipalId::new(ALICE)));

        let loaded = store.load_reservation(&reservation.id).unwrap().unwrap();
        assert_eq!(loaded, reservation);
    }

    #[test]
    fn submit_collects_validation_errors() {
        let (engine, _store, _room) = setup();
        let now = base_now();

        let mut req = request(RoomId::new(9999), 60, 120, now);
        req.title = "".into();

        let err = engine
            .submit(&req, &PrincipalId::new(ALICE), now)
            .unwrap_err();
        match err {
            SchedulingError::Validation(errors) => {
                assert!(errors.iter().any(|e| e.field == "room_id"));
                assert!(errors.iter().any(|e| e.field == "title"));
            }
            other => panic!("expected Validation, got {other:?}"),
        }
    }

    #[test]
    fn submit_refuses_window_held_by_approved() {
        let (engine, _store, room) = setup();
        let now = base_now();
        let alice = PrincipalId::new(ALICE);
        let manager = PrincipalId::new(MANAGER);

        let held = engine.submit(&request(room.id, 60, 120, now), &alice, now).unwrap();
        engine.approve(&held.id, &manager, now).unwrap();

        let err = engine
            .submit(&request(room.id, 90, 150, now), &alice, now)
            .unwrap_err();
        match err {
            SchedulingError::Conflict(info) => assert_eq!(info.reservation_id, held.id),
            other => panic!("expected Conflict, got {other:?}"),
        }

        // Adjacent window is fine
        engine.submit(&request(room.id, 120, 180, now), &alice, now).unwrap();
    }

    #[test]
    fn submit_allows_pending_collisions() {
        let (engine, _store, room) = setup();
        let now = base_now();
        let alice = PrincipalId::new(ALICE);

        engine.submit(&request(room.id, 60, 120, now), &alice, now).unwrap();
        engine.submit(&request(room.id, 60, 120, now), &alice, now).unwrap();
    }

    #[test]
    fn approve_requires_manager_role() {
        let (engine, _store, room) = setup();
        let now = base_now();
        let alice = PrincipalId::new(ALICE);

        let reservation = engine.submit(&request(room.id, 60, 120, now), &alice, now).unwrap();
        let err = engine.approve(&reservation.id, &alice, now).unwrap_err();
        assert!(matches!(err, SchedulingError::Forbidden));
    }

    #[test]
    fn approve_missing_is_not_found() {
        let (engine, _store, _room) = setup();
        let id = ReservationId::new();
        let err = engine
            .approve(&id, &PrincipalId::new(MANAGER), base_now())
            .unwrap_err();
        assert!(matches!(err, SchedulingError::NotFound(found) if found == id));
    }

    #[test]
    fn approve_sets_status_and_stamp() {
        let (engine, store, room) = setup();
        let now = base_now();
        let later = now + chrono::Duration::minutes(5);

        let reservation = engine
            .submit(&request(room.id, 60, 120, now), &PrincipalId::new(ALICE), now)
            .unwrap();
        let approved = engine
            .approve(&reservation.id, &PrincipalId::new(MANAGER), later)
            .unwrap();

        assert_eq!(approved.status, ReservationStatus::Approved);
        assert_eq!(approved.updated_at, Some(later));

        let loaded = store.load_reservation(&reservation.id).unwrap().unwrap();
        assert_eq!(loaded.status, ReservationStatus::Approved);
    }

    #[test]
    fn approve_is_idempotent() {
        let (engine, _store, room) = setup();
        let now = base_now();
        let manager = PrincipalId::new(MANAGER);

        let reservation = engine
            .submit(&request(room.id, 60, 120, now), &PrincipalId::new(ALICE), now)
            .unwrap();
        let first = engine.approve(&reservation.id, &manager, now).unwrap();
        let second = engine
            .approve(&reservation.id, &manager, now + chrono::Duration::minutes(10))
            .unwrap();

        assert_eq!(second.status, ReservationStatus::Approved);
        // The second call changes nothing
        assert_eq!(second.updated_at, first.updated_at);
    }

    #[test]
    fn two_pending_one_slot_first_approval_wins() {
        let (engine, store, room) = setup();
        let now = base_now();
        let alice = PrincipalId::new(ALICE);
        let manager = PrincipalId::new(MANAGER);

        // X [10:00, 11:00), Y [10:30, 11:30)
        let x = engine.submit(&request(room.id, 60, 120, now), &alice, now).unwrap();
        let y = engine.submit(&request(room.id, 90, 150, now), &alice, now).unwrap();

        engine.approve(&x.id, &manager, now).unwrap();

        let err = engine.approve(&y.id, &manager, now).unwrap_err();
        match err {
            SchedulingError::Conflict(info) => assert_eq!(info.reservation_id, x.id),
            other => panic!("expected Conflict, got {other:?}"),
        }

        // The denied reservation is untouched
        let loaded = store.load_reservation(&y.id).unwrap().unwrap();
        assert_eq!(loaded.status, ReservationStatus::Pending);
        assert!(loaded.updated_at.is_none());
    }

    #[test]
    fn adjacent_windows_both_approve() {
        let (engine, _store, room) = setup();
        let now = base_now();
        let alice = PrincipalId::new(ALICE);
        let manager = PrincipalId::new(MANAGER);

        let x = engine.submit(&request(room.id, 60, 120, now), &alice, now).unwrap();
        let y = engine.submit(&request(room.id, 120, 180, now), &alice, now).unwrap();

        engine.approve(&x.id, &manager, now).unwrap();
        engine.approve(&y.id, &manager, now).unwrap();
    }

    #[test]
    fn approve_from_terminal_is_invalid_transition() {
        let (engine, _store, room) = setup();
        let now = base_now();
        let manager = PrincipalId::new(MANAGER);

        let reservation = engine
            .submit(&request(room.id, 60, 120, now), &PrincipalId::new(ALICE), now)
            .unwrap();
        engine.reject(&reservation.id, &manager, now).unwrap();

        let err = engine.approve(&reservation.id, &manager, now).unwrap_err();
        assert!(matches!(
            err,
            SchedulingError::InvalidTransition {
                from: ReservationStatus::Rejected
            }
        ));
    }

    #[test]
    fn reject_moves_pending_to_rejected() {
        let (engine, store, room) = setup();
        let now = base_now();
        let manager = PrincipalId::new(MANAGER);

        let reservation = engine
            .submit(&request(room.id, 60, 120, now), &PrincipalId::new(ALICE), now)
            .unwrap();
        let rejected = engine.reject(&reservation.id, &manager, now).unwrap();
        assert_eq!(rejected.status, ReservationStatus::Rejected);
        assert_eq!(rejected.updated_at, Some(now));

        // Idempotent
        engine.reject(&reservation.id, &manager, now).unwrap();

        let loaded = store.load_reservation(&reservation.id).unwrap().unwrap();
        assert_eq!(loaded.status, ReservationStatus::Rejected);
    }

    #[test]
    fn reject_requires_manager_and_pending() {
        let (engine, _store, room) = setup();
        let now = base_now();
        let alice = PrincipalId::new(ALICE);
        let manager = PrincipalId::new(MANAGER);

        let reservation = engine.submit(&request(room.id, 60, 120, now), &alice, now).unwrap();

        let err = engine.reject(&reservation.id, &alice, now).unwrap_err();
        assert!(matches!(err, SchedulingError::Forbidden));

        engine.approve(&reservation.id, &manager, now).unwrap();
        let err = engine.reject(&reservation.id, &manager, now).unwrap_err();
        assert!(matches!(
            err,
            SchedulingError::InvalidTransition {
                from: ReservationStatus::Approved
            }
        ));
    }

    #[test]
    fn cancel_by_creator_succeeds() {
        let (engine, store, room) = setup();
        let now = base_now();
        let alice = PrincipalId::new(ALICE);
        let manager = PrincipalId::new(MANAGER);

        // Pending cancels
        let pending = engine.submit(&request(room.id, 60, 120, now), &alice, now).unwrap();
        let cancelled = engine.cancel(&pending.id, &alice, now).unwrap();
        assert_eq!(cancelled.status, ReservationStatus::Cancelled);

        // Approved cancels too
        let approved = engine.submit(&request(room.id, 60, 120, now), &alice, now).unwrap();
        engine.approve(&approved.id, &manager, now).unwrap();
        engine.cancel(&approved.id, &alice, now).unwrap();

        let loaded = store.load_reservation(&approved.id).unwrap().unwrap();
        assert_eq!(loaded.status, ReservationStatus::Cancelled);
    }

    #[test]
    fn cancel_by_non_creator_is_forbidden() {
        let (engine, _store, room) = setup();
        let now = base_now();

        let reservation = engine
            .submit(&request(room.id, 60, 120, now), &PrincipalId::new(ALICE), now)
            .unwrap();

        // Not even a manager may cancel someone else's reservation
        for other in [BOB, MANAGER] {
            let err = engine
                .cancel(&reservation.id, &PrincipalId::new(other), now)
                .unwrap_err();
            assert!(matches!(err, SchedulingError::Forbidden));
        }
    }

    #[test]
    fn cancel_terminal_or_over_is_already_terminal() {
        let (engine, _store, room) = setup();
        let now = base_now();
        let alice = PrincipalId::new(ALICE);

        let cancelled = engine.submit(&request(room.id, 60, 120, now), &alice, now).unwrap();
        engine.cancel(&cancelled.id, &alice, now).unwrap();
        let err = engine.cancel(&cancelled.id, &alice, now).unwrap_err();
        assert!(matches!(err, SchedulingError::AlreadyTerminal));

        // A reservation whose window has passed cannot be cancelled
        let over = engine.submit(&request(room.id, 60, 120, now), &alice, now).unwrap();
        let after_end = now + chrono::Duration::minutes(120);
        let err = engine.cancel(&over.id, &alice, after_end).unwrap_err();
        assert!(matches!(err, SchedulingError::AlreadyTerminal));
    }

    #[test]
    fn cancel_missing_is_not_found() {
        let (engine, _store, _room) = setup();
        let err = engine
            .cancel(&ReservationId::new(), &PrincipalId::new(ALICE), base_now())
            .unwrap_err();
        assert!(matches!(err, SchedulingError::NotFound(_)));
    }

    #[test]
    fn list_conflicts_reports_approved_only() {
        let (engine, _store, room) = setup();
        let now = base_now();
        let alice = PrincipalId::new(ALICE);
        let manager = PrincipalId::new(MANAGER);

        let approved = engine.submit(&request(room.id, 60, 120, now), &alice, now).unwrap();
        engine.approve(&approved.id, &manager, now).unwrap();
        engine.submit(&request(room.id, 60, 120, now), &alice, now).unwrap();

        let conflicts = engine
            .list_conflicts(
                room.id,
                now,
                now + chrono::Duration::minutes(180),
                None,
            )
            .unwrap();
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].id, approved.id);
    }

    #[test]
    fn decisions_are_audited() {
        let (engine, store, room) = setup();
        let now = base_now();
        let alice = PrincipalId::new(ALICE);
        let manager = PrincipalId::new(MANAGER);

        let x = engine.submit(&request(room.id, 60, 120, now), &alice, now).unwrap();
        let y = engine.submit(&request(room.id, 90, 150, now), &alice, now).unwrap();
        engine.approve(&x.id, &manager, now).unwrap();
        let _ = engine.approve(&y.id, &manager, now);

        let kinds: Vec<_> = store
            .recent_audits(10)
            .unwrap()
            .into_iter()
            .map(|r| r.kind)
            .collect();
        assert!(kinds.iter().any(|k| matches!(k, AuditKind::ReservationSubmitted { .. })));
        assert!(kinds.iter().any(|k| matches!(k, AuditKind::ReservationApproved { .. })));
        assert!(kinds.iter().any(|k| matches!(k, AuditKind::ApprovalDenied { .. })));
    }
}
