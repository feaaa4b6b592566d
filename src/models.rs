use std::collections::HashMap;
use std::path::PathBuf;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc, Weekday};
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    pub api: ApiConfig,
    #[serde(default)]
    pub account: Option<Account>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ApiConfig {
    pub base_url: String,
    /// Campus timezone used to materialise recurring windows into dates.
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

fn default_timezone() -> String {
    "Europe/Warsaw".to_string()
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Account {
    pub login: String,
    pub password: String,
}

/// A lecturer's recurring weekly availability window.
///
/// The backend has drifted between field names over time
/// (`capacity`/`max_attendees`, `location`/`meeting_location`,
/// `active`/`is_active`), so decoding accepts all spellings. A missing
/// capacity decodes to 0, which conservatively excludes the window from
/// any availability computation.
#[derive(Debug, Clone, Deserialize)]
pub struct AvailabilityWindow {
    pub id: i64,
    #[serde(alias = "weekday", deserialize_with = "de_weekday")]
    pub day: Weekday,
    #[serde(deserialize_with = "de_time")]
    pub start_time: NaiveTime,
    #[serde(deserialize_with = "de_time")]
    pub end_time: NaiveTime,
    #[serde(default, alias = "max_attendees")]
    pub capacity: u32,
    #[serde(default, alias = "meeting_location")]
    pub location: Option<String>,
    #[serde(default, alias = "is_active")]
    pub active: bool,
}

/// A one-off exception removing bookability from an otherwise open range.
#[derive(Debug, Clone, Deserialize)]
pub struct BlockedInterval {
    pub id: i64,
    pub date: NaiveDate,
    #[serde(deserialize_with = "de_time")]
    pub start_time: NaiveTime,
    #[serde(deserialize_with = "de_time")]
    pub end_time: NaiveTime,
    #[serde(default)]
    pub reason: Option<String>,
}

/// A concrete bookable occurrence as served by the public slots endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct OpenSlot {
    pub id: i64,
    #[serde(deserialize_with = "de_datetime")]
    pub start_time: DateTime<Utc>,
    #[serde(deserialize_with = "de_datetime")]
    pub end_time: DateTime<Utc>,
    #[serde(default, alias = "lecturer_details")]
    pub lecturer: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default, alias = "meeting_location")]
    pub location: Option<String>,
    #[serde(default, alias = "max_attendees")]
    pub capacity: u32,
    #[serde(default)]
    pub reservations_count: u32,
    #[serde(default, alias = "is_active")]
    pub active: bool,
}

impl OpenSlot {
    pub fn remaining(&self) -> u32 {
        self.capacity.saturating_sub(self.reservations_count)
    }
}

/// Reservation lifecycle status. Owned by the backend; the client only
/// renders it and offers the legal transition actions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReservationStatus {
    Pending,
    Accepted,
    Rejected,
    Cancelled,
    Completed,
    NoShowStudent,
    NoShowLecturer,
    /// Anything the backend sends that we do not recognise. Treated as
    /// occupying capacity and terminal, so no actions are offered on it.
    Unknown(String),
}

impl ReservationStatus {
    /// Parse the spellings observed across backend versions:
    /// `Pending`, `pending`, `Confirmed` (legacy name for accepted),
    /// `No-Show Student`, `no_show_student`, ...
    pub fn parse(raw: &str) -> Self {
        let norm: String = raw
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_lowercase();
        match norm.as_str() {
            "pending" => Self::Pending,
            "accepted" | "confirmed" => Self::Accepted,
            "rejected" => Self::Rejected,
            "cancelled" | "canceled" => Self::Cancelled,
            "completed" => Self::Completed,
            "noshowstudent" => Self::NoShowStudent,
            "noshowlecturer" => Self::NoShowLecturer,
            _ => Self::Unknown(raw.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::Cancelled => "cancelled",
            Self::Completed => "completed",
            Self::NoShowStudent => "no_show_student",
            Self::NoShowLecturer => "no_show_lecturer",
            Self::Unknown(raw) => raw,
        }
    }

    /// Whether the reservation still occupies a seat in its occurrence.
    /// Everything except cancelled and rejected counts.
    pub fn counts_against_capacity(&self) -> bool {
        !matches!(self, Self::Cancelled | Self::Rejected)
    }

    /// Terminal states get no further actions.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending | Self::Accepted)
    }

    /// Transitions the lecturer may request from this state.
    pub fn lecturer_actions(&self) -> &'static [&'static str] {
        match self {
            Self::Pending => &["accept", "reject"],
            Self::Accepted => &["completed", "cancelled", "no_show_student", "no_show_lecturer"],
            _ => &[],
        }
    }

    /// Students may withdraw a reservation until it reaches a terminal state.
    pub fn student_can_cancel(&self) -> bool {
        matches!(self, Self::Pending | Self::Accepted)
    }
}

impl std::fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ReservationStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::parse(&raw))
    }
}

/// A student's booking of one occurrence. The lecturer endpoints nest the
/// slot details, the student ones sometimes flatten start/end onto the
/// reservation itself; both shapes decode.
#[derive(Debug, Clone, Deserialize)]
pub struct Reservation {
    pub id: i64,
    #[serde(default)]
    pub slot: Option<OpenSlot>,
    #[serde(default, deserialize_with = "de_opt_datetime")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "de_opt_datetime")]
    pub end_time: Option<DateTime<Utc>>,
    pub status: ReservationStatus,
    #[serde(default)]
    pub student_name: Option<String>,
    #[serde(default)]
    pub student_email: Option<String>,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub student_notes: Option<String>,
    #[serde(default)]
    pub lecturer_notes: Option<String>,
    #[serde(default, alias = "student_attachment")]
    pub student_attachment_url: Option<String>,
    #[serde(default, alias = "lecturer_attachment")]
    pub lecturer_attachment_url: Option<String>,
    #[serde(default)]
    pub rejection_reason: Option<String>,
    #[serde(default, deserialize_with = "de_opt_datetime")]
    pub booked_at: Option<DateTime<Utc>>,
}

impl Reservation {
    pub fn slot_id(&self) -> Option<i64> {
        self.slot.as_ref().map(|s| s.id)
    }

    pub fn start(&self) -> Option<DateTime<Utc>> {
        self.start_time.or_else(|| self.slot.as_ref().map(|s| s.start_time))
    }
}

/// Fields for creating or replacing a window. Deactivation sends the same
/// payload with `active = false`; windows are never hard-deleted, so
/// historical reservations keep a valid reference.
#[derive(Debug, Clone)]
pub struct WindowDraft {
    pub day: Weekday,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub capacity: u32,
    pub location: Option<String>,
    pub active: bool,
}

impl From<&AvailabilityWindow> for WindowDraft {
    fn from(w: &AvailabilityWindow) -> Self {
        Self {
            day: w.day,
            start_time: w.start_time,
            end_time: w.end_time,
            capacity: w.capacity,
            location: w.location.clone(),
            active: w.active,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BlockDraft {
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub reason: Option<String>,
}

/// Fields for self-service account creation.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
}

#[derive(Debug, Clone, Default)]
pub struct NewReservation {
    pub slot_id: i64,
    pub topic: Option<String>,
    pub student_notes: Option<String>,
    pub attachment: Option<PathBuf>,
}

/// One entry of a user's weekly class timetable. The `time` field is an
/// opaque label ("08:00 - 09:30"); the backend never computes with it.
#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleItem {
    pub id: i64,
    pub subject: String,
    #[serde(alias = "weekday", deserialize_with = "de_weekday")]
    pub day: Weekday,
    pub time: String,
    #[serde(default)]
    pub location: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ScheduleItemDraft {
    pub subject: String,
    pub day: Weekday,
    pub time: String,
    pub location: Option<String>,
}

/// Which account collection an admin operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountKind {
    Lecturer,
    Student,
}

impl AccountKind {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "lecturer" | "lecturers" => Some(Self::Lecturer),
            "student" | "students" => Some(Self::Student),
            _ => None,
        }
    }

    /// URL path segment under `/api/admin/`.
    pub fn segment(&self) -> &'static str {
        match self {
            Self::Lecturer => "lecturers",
            Self::Student => "students",
        }
    }
}

/// Platform-wide counters served to administrators.
#[derive(Debug, Clone, Deserialize)]
pub struct AdminStats {
    #[serde(default)]
    pub active_users: u32,
    #[serde(default)]
    pub total_lecturers: u32,
    #[serde(default)]
    pub total_reservations: u32,
    #[serde(default)]
    pub average_rating: f64,
}

/// A lecturer or student account as the admin endpoints serve it. The
/// per-role activity counter differs by collection, so both are optional.
#[derive(Debug, Clone, Deserialize)]
pub struct AdminUser {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub consultations_count: Option<u32>,
    #[serde(default)]
    pub reservations_count: Option<u32>,
}

/// Per-status counts over a fetched reservation list.
pub fn status_counts(reservations: &[Reservation]) -> HashMap<&str, usize> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for r in reservations {
        *counts.entry(r.status.as_str()).or_default() += 1;
    }
    counts
}

/// Parse a weekday name as typed in the CLI or served by the backend.
/// Older backend rows store the Polish labels the original forms sent.
pub fn parse_weekday(day: &str) -> Option<Weekday> {
    let norm = day.trim().to_lowercase();
    match norm.as_str() {
        "monday" | "mon" | "poniedziałek" | "poniedzialek" => Some(Weekday::Mon),
        "tuesday" | "tue" | "wtorek" => Some(Weekday::Tue),
        "wednesday" | "wed" | "środa" | "sroda" => Some(Weekday::Wed),
        "thursday" | "thu" | "czwartek" => Some(Weekday::Thu),
        "friday" | "fri" | "piątek" | "piatek" => Some(Weekday::Fri),
        "saturday" | "sat" | "sobota" => Some(Weekday::Sat),
        "sunday" | "sun" | "niedziela" => Some(Weekday::Sun),
        _ => None,
    }
}

pub fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

fn de_weekday<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Weekday, D::Error> {
    let raw = String::deserialize(deserializer)?;
    parse_weekday(&raw).ok_or_else(|| de::Error::custom(format!("unknown weekday: {raw}")))
}

/// Wall-clock times arrive as "10:00" or "10:00:00" depending on the
/// serializer version.
pub fn parse_time(raw: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(raw, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
        .ok()
}

fn de_time<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
    let raw = String::deserialize(deserializer)?;
    parse_time(&raw).ok_or_else(|| de::Error::custom(format!("unparseable time: {raw}")))
}

/// Timestamps arrive as RFC 3339 with an offset, or naive when the
/// backend runs without timezone support; naive values are read as UTC.
fn parse_datetime(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .map(|ndt| ndt.and_utc())
}

fn de_datetime<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
    let raw = String::deserialize(deserializer)?;
    parse_datetime(&raw).ok_or_else(|| de::Error::custom(format!("unparseable timestamp: {raw}")))
}

fn de_opt_datetime<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<DateTime<Utc>>, D::Error> {
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw {
        Some(s) if !s.is_empty() => parse_datetime(&s)
            .map(Some)
            .ok_or_else(|| de::Error::custom(format!("unparseable timestamp: {s}"))),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn window_decodes_current_field_names() {
        let w: AvailabilityWindow = serde_json::from_value(serde_json::json!({
            "id": 7,
            "day": "Monday",
            "start_time": "10:00",
            "end_time": "11:00",
            "capacity": 2,
            "location": "B5 / 410",
            "active": true,
        }))
        .unwrap();
        assert_eq!(w.day, Weekday::Mon);
        assert_eq!(w.start_time, NaiveTime::from_hms_opt(10, 0, 0).unwrap());
        assert_eq!(w.capacity, 2);
        assert!(w.active);
    }

    #[test]
    fn window_decodes_legacy_field_names() {
        let w: AvailabilityWindow = serde_json::from_value(serde_json::json!({
            "id": 7,
            "weekday": "Poniedziałek",
            "start_time": "10:00:00",
            "end_time": "11:00:00",
            "max_attendees": 5,
            "meeting_location": "B5 / 410",
            "is_active": false,
        }))
        .unwrap();
        assert_eq!(w.day, Weekday::Mon);
        assert_eq!(w.capacity, 5);
        assert_eq!(w.location.as_deref(), Some("B5 / 410"));
        assert!(!w.active);
    }

    #[test]
    fn missing_capacity_and_active_decode_conservatively() {
        let w: AvailabilityWindow = serde_json::from_value(serde_json::json!({
            "id": 1,
            "day": "Friday",
            "start_time": "08:00",
            "end_time": "09:00",
        }))
        .unwrap();
        assert_eq!(w.capacity, 0);
        assert!(!w.active);
    }

    #[test]
    fn status_parses_observed_spellings() {
        assert_eq!(ReservationStatus::parse("Pending"), ReservationStatus::Pending);
        assert_eq!(ReservationStatus::parse("Confirmed"), ReservationStatus::Accepted);
        assert_eq!(ReservationStatus::parse("accepted"), ReservationStatus::Accepted);
        assert_eq!(
            ReservationStatus::parse("No-Show Student"),
            ReservationStatus::NoShowStudent
        );
        assert_eq!(
            ReservationStatus::parse("no_show_lecturer"),
            ReservationStatus::NoShowLecturer
        );
        assert!(matches!(
            ReservationStatus::parse("Archived"),
            ReservationStatus::Unknown(_)
        ));
    }

    #[test]
    fn terminal_states_offer_no_actions() {
        for status in [
            ReservationStatus::Rejected,
            ReservationStatus::Cancelled,
            ReservationStatus::Completed,
            ReservationStatus::NoShowStudent,
            ReservationStatus::NoShowLecturer,
            ReservationStatus::Unknown("archived".into()),
        ] {
            assert!(status.is_terminal());
            assert!(status.lecturer_actions().is_empty());
            assert!(!status.student_can_cancel());
        }
        assert_eq!(
            ReservationStatus::Pending.lecturer_actions(),
            &["accept", "reject"]
        );
        assert!(ReservationStatus::Accepted.student_can_cancel());
    }

    #[test]
    fn cancelled_and_rejected_free_their_seat() {
        assert!(!ReservationStatus::Cancelled.counts_against_capacity());
        assert!(!ReservationStatus::Rejected.counts_against_capacity());
        assert!(ReservationStatus::Pending.counts_against_capacity());
        assert!(ReservationStatus::Accepted.counts_against_capacity());
        assert!(ReservationStatus::Unknown("archived".into()).counts_against_capacity());
    }

    #[test]
    fn reservation_decodes_nested_slot() {
        let r: Reservation = serde_json::from_value(serde_json::json!({
            "id": 12,
            "slot": {
                "id": 7,
                "start_time": "2026-01-05T10:00:00+01:00",
                "end_time": "2026-01-05T11:00:00+01:00",
                "lecturer_details": "dr. Maria Lewandowska",
                "max_attendees": 2,
                "reservations_count": 1,
                "is_active": true
            },
            "status": "pending",
            "student_name": "Jan Kowalski",
            "rejection_reason": null
        }))
        .unwrap();
        assert_eq!(r.slot_id(), Some(7));
        let expected = Utc.with_ymd_and_hms(2026, 1, 5, 9, 0, 0).unwrap();
        assert_eq!(r.start(), Some(expected));
        assert_eq!(r.status, ReservationStatus::Pending);
    }

    #[test]
    fn schedule_item_decodes_polish_weekday() {
        let item: ScheduleItem = serde_json::from_value(serde_json::json!({
            "id": 4,
            "subject": "Analiza matematyczna",
            "day": "Środa",
            "time": "08:00 - 09:30",
        }))
        .unwrap();
        assert_eq!(item.day, Weekday::Wed);
        assert_eq!(item.time, "08:00 - 09:30");
        assert_eq!(item.location, None);
    }

    #[test]
    fn account_kind_parses_both_forms() {
        assert_eq!(AccountKind::parse("lecturer"), Some(AccountKind::Lecturer));
        assert_eq!(AccountKind::parse("Students"), Some(AccountKind::Student));
        assert_eq!(AccountKind::parse("admin"), None);
        assert_eq!(AccountKind::Lecturer.segment(), "lecturers");
        assert_eq!(AccountKind::Student.segment(), "students");
    }

    #[test]
    fn admin_user_tolerates_missing_counters() {
        let u: AdminUser = serde_json::from_value(serde_json::json!({
            "id": 9,
            "username": "jkowalski",
            "email": "jkowalski@agh.edu.pl",
            "is_active": true,
            "reservations_count": 3,
        }))
        .unwrap();
        assert!(u.is_active);
        assert_eq!(u.reservations_count, Some(3));
        assert_eq!(u.consultations_count, None);
        assert_eq!(u.department, None);
    }

    #[test]
    fn naive_timestamps_decode_as_utc() {
        let slot: OpenSlot = serde_json::from_value(serde_json::json!({
            "id": 3,
            "start_time": "2026-03-02T09:00:00",
            "end_time": "2026-03-02T09:30:00",
        }))
        .unwrap();
        assert_eq!(slot.start_time, Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap());
    }
}
