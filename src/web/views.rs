use chrono::Local;
use leptos::prelude::*;

use super::dashboard::{BlockedRow, OccurrenceRow, ReservationRow, Stats, WindowRow};

const STYLE: &str = include_str!("../style.css");

pub(super) fn render_page(
    stats: &Stats,
    windows: &[WindowRow],
    blocked: &[BlockedRow],
    reservations: &[ReservationRow],
    occurrences: &[OccurrenceRow],
) -> String {
    let stats_html = render_stats(stats);
    let windows_html = render_windows_table(windows);
    let blocked_html = render_blocked_table(blocked);
    let reservations_html = render_reservations_table(reservations);
    let occurrences_html = render_occurrences_table(occurrences);
    let now = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();

    view! {
        <html lang="en">
            <head>
                <meta charset="utf-8" />
                <meta name="viewport" content="width=device-width, initial-scale=1" />
                <title>"Consultation Calendar"</title>
                <style>{STYLE}</style>
            </head>
            <body>
                <h1>"Consultation Calendar"</h1>
                <p class="timestamp">"Updated: " {now}</p>
                <div inner_html=stats_html />
                <section>
                    <h2>"Open occurrences"</h2>
                    <div inner_html=occurrences_html />
                </section>
                <section>
                    <h2>"Availability windows"</h2>
                    <div inner_html=windows_html />
                </section>
                <section>
                    <h2>"Blocked intervals"</h2>
                    <div inner_html=blocked_html />
                </section>
                <section>
                    <h2>"Reservations"</h2>
                    <div inner_html=reservations_html />
                </section>
            </body>
        </html>
    }
    .to_html()
}

pub(super) fn render_error_page(message: &str) -> String {
    let message = message.to_string();
    view! {
        <html lang="en">
            <head>
                <meta charset="utf-8" />
                <title>"Consultation Calendar"</title>
                <style>{STYLE}</style>
            </head>
            <body>
                <h1>"Consultation Calendar"</h1>
                <div class="error">{message}</div>
            </body>
        </html>
    }
    .to_html()
}

fn render_stats(stats: &Stats) -> String {
    let windows = stats.windows.to_string();
    let blocked = stats.blocked.to_string();
    let accepted = stats.accepted.to_string();
    let capacity = stats.total_capacity.to_string();
    view! {
        <div class="stats">
            <div class="stat"><span class="value">{windows}</span>" windows"</div>
            <div class="stat"><span class="value">{blocked}</span>" blocked"</div>
            <div class="stat"><span class="value">{accepted}</span>" accepted"</div>
            <div class="stat"><span class="value">{capacity}</span>" total capacity"</div>
        </div>
    }
    .to_html()
}

fn render_windows_table(windows: &[WindowRow]) -> String {
    if windows.is_empty() {
        return view! { <p class="empty">"No availability windows."</p> }.to_html();
    }

    let rows_html: String = windows
        .iter()
        .map(|w| {
            let day = w.day.clone();
            let time = w.time.clone();
            let capacity = w.capacity.clone();
            let location = w.location.clone();
            view! {
                <tr>
                    <td>{day}</td>
                    <td>{time}</td>
                    <td class="capacity">{capacity}</td>
                    <td>{location}</td>
                </tr>
            }
            .to_html()
        })
        .collect();

    view! {
        <table>
            <thead>
                <tr><th>"Day"</th><th>"Time"</th><th>"Capacity"</th><th>"Location"</th></tr>
            </thead>
            <tbody inner_html=rows_html />
        </table>
    }
    .to_html()
}

fn render_blocked_table(blocked: &[BlockedRow]) -> String {
    if blocked.is_empty() {
        return view! { <p class="empty">"No blocked intervals."</p> }.to_html();
    }

    let rows_html: String = blocked
        .iter()
        .map(|b| {
            let date = b.date.clone();
            let time = b.time.clone();
            let reason = b.reason.clone();
            view! {
                <tr>
                    <td>{date}</td>
                    <td>{time}</td>
                    <td>{reason}</td>
                </tr>
            }
            .to_html()
        })
        .collect();

    view! {
        <table>
            <thead>
                <tr><th>"Date"</th><th>"Time"</th><th>"Reason"</th></tr>
            </thead>
            <tbody inner_html=rows_html />
        </table>
    }
    .to_html()
}

fn render_reservations_table(reservations: &[ReservationRow]) -> String {
    if reservations.is_empty() {
        return view! { <p class="empty">"No reservations."</p> }.to_html();
    }

    let rows_html: String = reservations
        .iter()
        .map(|r| {
            let when = r.when.clone();
            let student = r.student.clone();
            let topic = r.topic.clone();
            let status = r.status.clone();
            let actions = r.actions.clone();
            let css = match r.status.as_str() {
                "accepted" => "status-accepted",
                "pending" => "status-pending",
                "rejected" | "cancelled" => "status-closed",
                _ => "status-done",
            }
            .to_string();
            view! {
                <tr>
                    <td>{when}</td>
                    <td>{student}</td>
                    <td>{topic}</td>
                    <td class=css>{status}</td>
                    <td class="actions">{actions}</td>
                </tr>
            }
            .to_html()
        })
        .collect();

    view! {
        <table>
            <thead>
                <tr>
                    <th>"When"</th>
                    <th>"Student"</th>
                    <th>"Topic"</th>
                    <th>"Status"</th>
                    <th>"Actions"</th>
                </tr>
            </thead>
            <tbody inner_html=rows_html />
        </table>
    }
    .to_html()
}

fn render_occurrences_table(occurrences: &[OccurrenceRow]) -> String {
    if occurrences.is_empty() {
        return view! { <p class="empty">"Nothing bookable right now."</p> }.to_html();
    }

    let rows_html: String = occurrences
        .iter()
        .map(|o| {
            let when = o.when.clone();
            let location = o.location.clone();
            let capacity = o.capacity.clone();
            view! {
                <tr>
                    <td>{when}</td>
                    <td>{location}</td>
                    <td class="capacity available">{capacity}</td>
                </tr>
            }
            .to_html()
        })
        .collect();

    view! {
        <table>
            <thead>
                <tr><th>"When"</th><th>"Location"</th><th>"Capacity"</th></tr>
            </thead>
            <tbody inner_html=rows_html />
        </table>
    }
    .to_html()
}
