use axum::extract::State;
use axum::response::Html;
use chrono::Utc;

use super::views::{render_error_page, render_page};
use super::AppState;
use crate::availability;
use crate::models::{weekday_name, ReservationStatus};

pub(super) struct Stats {
    pub(super) windows: usize,
    pub(super) blocked: usize,
    pub(super) accepted: usize,
    pub(super) total_capacity: u32,
}

pub(super) struct WindowRow {
    pub(super) day: String,
    pub(super) time: String,
    pub(super) capacity: String,
    pub(super) location: String,
}

pub(super) struct BlockedRow {
    pub(super) date: String,
    pub(super) time: String,
    pub(super) reason: String,
}

pub(super) struct ReservationRow {
    pub(super) when: String,
    pub(super) student: String,
    pub(super) topic: String,
    pub(super) status: String,
    pub(super) actions: String,
}

pub(super) struct OccurrenceRow {
    pub(super) when: String,
    pub(super) location: String,
    pub(super) capacity: String,
}

/// The three collections are fetched concurrently and independently;
/// there is no transactional snapshot, and a reservation referencing a
/// window missing from this fetch is simply not counted.
pub(crate) async fn dashboard_handler(State(state): State<AppState>) -> Html<String> {
    let (windows, blocked, reservations) = tokio::join!(
        state.client.list_windows(),
        state.client.list_blocked(),
        state.client.list_lecturer_reservations(None),
    );

    let (windows, blocked, reservations) = match (windows, blocked, reservations) {
        (Ok(w), Ok(b), Ok(r)) => (w, b, r),
        (Err(e), _, _) | (_, Err(e), _) | (_, _, Err(e)) => {
            return Html(render_error_page(&format!("Failed to load calendar: {e}")));
        }
    };

    let stats = Stats {
        windows: windows.len(),
        blocked: blocked.len(),
        accepted: reservations
            .iter()
            .filter(|r| r.status == ReservationStatus::Accepted)
            .count(),
        total_capacity: windows.iter().map(|w| w.capacity).sum(),
    };

    let window_rows: Vec<WindowRow> = windows
        .iter()
        .map(|w| WindowRow {
            day: weekday_name(w.day).to_string(),
            time: format!("{} - {}", w.start_time.format("%H:%M"), w.end_time.format("%H:%M")),
            capacity: w.capacity.to_string(),
            location: w.location.clone().unwrap_or_default(),
        })
        .collect();

    let blocked_rows: Vec<BlockedRow> = blocked
        .iter()
        .map(|b| BlockedRow {
            date: b.date.to_string(),
            time: format!("{} - {}", b.start_time.format("%H:%M"), b.end_time.format("%H:%M")),
            reason: b.reason.clone().unwrap_or_default(),
        })
        .collect();

    let reservation_rows: Vec<ReservationRow> = reservations
        .iter()
        .map(|r| ReservationRow {
            when: r
                .start()
                .map(|s| s.with_timezone(&state.tz).format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_else(|| "?".to_string()),
            student: r.student_name.clone().unwrap_or_else(|| "?".to_string()),
            topic: r.topic.clone().unwrap_or_default(),
            status: r.status.to_string(),
            actions: r.status.lecturer_actions().join(", "),
        })
        .collect();

    let occurrences =
        availability::derive_occurrences(&windows, &blocked, &reservations, Utc::now(), state.tz);
    let occurrence_rows: Vec<OccurrenceRow> = occurrences
        .iter()
        .map(|o| OccurrenceRow {
            when: format!(
                "{} - {}",
                o.start.with_timezone(&state.tz).format("%Y-%m-%d %H:%M"),
                o.end.with_timezone(&state.tz).format("%H:%M"),
            ),
            location: o.location.clone().unwrap_or_default(),
            capacity: format!("{} of {} free", o.remaining(), o.capacity),
        })
        .collect();

    Html(render_page(
        &stats,
        &window_rows,
        &blocked_rows,
        &reservation_rows,
        &occurrence_rows,
    ))
}
