//! Submission validation
//!
//! Validation is a standalone function returning the full list of
//! field-scoped errors, decoupled from storage. The engine rejects a
//! submission when the list is non-empty.

use crate::{Room, SubmitRequest};
use chrono::{DateTime, Utc};
use std::fmt;
use std::time::Duration;

/// Maximum title length, in characters
pub const TITLE_MAX_LEN: usize = 200;

/// Maximum notes length, in characters
pub const NOTES_MAX_LEN: usize = 4000;

/// A validation failure scoped to a single input field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a submission against the room directory entry and the clock.
///
/// `start_grace` is the clock-skew tolerance for "start must be in the
/// future": a start instant up to that far in the past is still accepted.
pub fn validate_submission(
    room: Option<&Room>,
    request: &SubmitRequest,
    now: DateTime<Utc>,
    start_grace: Duration,
) -> Vec<FieldError> {
    let mut errors = Vec::new();

    match room {
        None => {
            errors.push(FieldError::new("room_id", "selected room does not exist"));
        }
        Some(room) if !room.active => {
            errors.push(FieldError::new(
                "room_id",
                "room is inactive and does not accept new reservations",
            ));
        }
        Some(_) => {}
    }

    if request.title.trim().is_empty() {
        errors.push(FieldError::new("title", "title is required"));
    } else if request.title.chars().count() > TITLE_MAX_LEN {
        errors.push(FieldError::new(
            "title",
            format!("title may be at most {} characters", TITLE_MAX_LEN),
        ));
    }

    if let Some(notes) = &request.notes {
        if notes.chars().count() > NOTES_MAX_LEN {
            errors.push(FieldError::new(
                "notes",
                format!("notes may be at most {} characters", NOTES_MAX_LEN),
            ));
        }
    }

    if request.start_at >= request.end_at {
        errors.push(FieldError::new(
            "start_at",
            "start must be strictly before end",
        ));
    }

    let grace = chrono::Duration::from_std(start_grace).unwrap_or_else(|_| chrono::Duration::zero());
    if request.start_at < now - grace {
        errors.push(FieldError::new("start_at", "start must be in the future"));
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use rsvp_util::RoomId;
    use chrono::TimeZone;

    fn test_room(active: bool) -> Room {
        Room {
            id: RoomId::new(1),
            name: "A-101".into(),
            capacity: 10,
            location: None,
            equipment: None,
            active,
        }
    }

    fn base_request(now: DateTime<Utc>) -> SubmitRequest {
        SubmitRequest {
            room_id: RoomId::new(1),
            start_at: now + chrono::Duration::hours(1),
            end_at: now + chrono::Duration::hours(2),
            title: "Planning".into(),
            notes: None,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    const GRACE: Duration = Duration::from_secs(60);

    #[test]
    fn valid_request_has_no_errors() {
        let room = test_room(true);
        let errors = validate_submission(Some(&room), &base_request(now()), now(), GRACE);
        assert!(errors.is_empty());
    }

    #[test]
    fn missing_room_is_an_error() {
        let errors = validate_submission(None, &base_request(now()), now(), GRACE);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "room_id");
    }

    #[test]
    fn inactive_room_is_an_error() {
        let room = test_room(false);
        let errors = validate_submission(Some(&room), &base_request(now()), now(), GRACE);
        assert!(errors.iter().any(|e| e.field == "room_id"));
    }

    #[test]
    fn empty_title_is_an_error() {
        let room = test_room(true);
        let mut req = base_request(now());
        req.title = "   ".into();
        let errors = validate_submission(Some(&room), &req, now(), GRACE);
        assert!(errors.iter().any(|e| e.field == "title"));
    }

    #[test]
    fn overlong_title_and_notes_are_errors() {
        let room = test_room(true);
        let mut req = base_request(now());
        req.title = "x".repeat(TITLE_MAX_LEN + 1);
        req.notes = Some("y".repeat(NOTES_MAX_LEN + 1));
        let errors = validate_submission(Some(&room), &req, now(), GRACE);
        assert!(errors.iter().any(|e| e.field == "title"));
        assert!(errors.iter().any(|e| e.field == "notes"));
    }

    #[test]
    fn inverted_and_degenerate_intervals_are_errors() {
        let room = test_room(true);
        let mut req = base_request(now());
        req.end_at = req.start_at;
        let errors = validate_submission(Some(&room), &req, now(), GRACE);
        assert!(errors.iter().any(|e| e.field == "start_at"));

        req.end_at = req.start_at - chrono::Duration::minutes(30);
        let errors = validate_submission(Some(&room), &req, now(), GRACE);
        assert!(errors.iter().any(|e| e.field == "start_at"));
    }

    #[test]
    fn past_start_is_an_error_beyond_grace() {
        let room = test_room(true);
        let now = now();

        // 30 seconds in the past: within the one-minute grace, accepted
        let mut req = base_request(now);
        req.start_at = now - chrono::Duration::seconds(30);
        req.end_at = now + chrono::Duration::hours(1);
        assert!(validate_submission(Some(&room), &req, now, GRACE).is_empty());

        // 2 minutes in the past: rejected
        req.start_at = now - chrono::Duration::minutes(2);
        let errors = validate_submission(Some(&room), &req, now, GRACE);
        assert!(errors.iter().any(|e| e.field == "start_at"));
    }

    #[test]
    fn multiple_errors_are_collected() {
        let mut req = base_request(now());
        req.title = "".into();
        req.end_at = req.start_at;
        let errors = validate_submission(None, &req, now(), GRACE);
        assert!(errors.len() >= 3);
    }
}
