use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::{NaiveDate, Utc};
use tracing::info;

use crate::availability;
use crate::client::ApiClient;
use crate::models::{
    parse_time, parse_weekday, status_counts, weekday_name, Account, AccountKind, BlockDraft,
    Config, NewAccount, NewReservation, Reservation, ScheduleItemDraft, WindowDraft,
};
use crate::session;

/// Resolve login/password from CLI flags or the account in config
pub fn resolve_credentials<'a>(
    user_flag: &'a Option<String>,
    pass_flag: &'a Option<String>,
    account: Option<&'a Account>,
) -> Result<(&'a str, &'a str)> {
    let login = match user_flag {
        Some(u) => u.as_str(),
        None => account
            .map(|a| a.login.as_str())
            .ok_or_else(|| anyhow::anyhow!("No account in config and no --user provided"))?,
    };
    let pass = match pass_flag {
        Some(p) => p.as_str(),
        None => account
            .map(|a| a.password.as_str())
            .ok_or_else(|| anyhow::anyhow!("No account in config and no --password provided"))?,
    };
    Ok((login, pass))
}

/// Build a client carrying the stored session token, if any.
pub fn client_with_session(cfg: &Config, config_path: &Path) -> Result<ApiClient> {
    let mut client = ApiClient::new(&cfg.api.base_url)?;
    if let Some(sess) = session::load(config_path)? {
        client.set_token(&sess.token);
    }
    Ok(client)
}

pub async fn run_login(
    cfg: &Config,
    config_path: &Path,
    user: &Option<String>,
    password: &Option<String>,
) -> Result<()> {
    let (login, pass) = resolve_credentials(user, password, cfg.account.as_ref())?;
    let mut client = ApiClient::new(&cfg.api.base_url)?;
    let tokens = client.login(login, pass).await?;

    session::save(
        config_path,
        &session::Session {
            token: tokens.access.clone(),
            refresh: tokens.refresh,
        },
    )?;

    match session::token_claims(&tokens.access) {
        Some(claims) => {
            let role = claims.get("role").and_then(|v| v.as_str()).unwrap_or("?");
            println!("Logged in as {login} ({role}).");
        }
        None => println!("Logged in as {login}."),
    }
    Ok(())
}

pub async fn run_register(cfg: &Config, new: &NewAccount) -> Result<()> {
    let client = ApiClient::new(&cfg.api.base_url)?;
    let resp = client.register(new).await?;
    let email = resp
        .get("email")
        .and_then(|v| v.as_str())
        .unwrap_or(&new.email);
    println!("Account {email} created — log in with `consult login`.");
    Ok(())
}

/// Exchange the stored refresh token for a fresh access token.
pub async fn run_refresh(cfg: &Config, config_path: &Path) -> Result<()> {
    let Some(sess) = session::load(config_path)? else {
        bail!("Not logged in");
    };
    let Some(refresh) = sess.refresh else {
        bail!("No refresh token stored — log in again");
    };

    let mut client = ApiClient::new(&cfg.api.base_url)?;
    let tokens = client.refresh(&refresh).await?;
    session::save(
        config_path,
        &session::Session {
            token: tokens.access,
            refresh: tokens.refresh.or(Some(refresh)),
        },
    )?;
    println!("Session refreshed.");
    Ok(())
}

pub fn run_logout(config_path: &Path) -> Result<()> {
    session::clear(config_path)?;
    println!("Session cleared.");
    Ok(())
}

pub fn run_whoami(config_path: &Path) -> Result<()> {
    match session::load(config_path)? {
        Some(sess) => match session::token_claims(&sess.token) {
            Some(claims) => {
                println!("{}", serde_json::to_string_pretty(&claims)?);
            }
            None => println!("A session token is stored but its payload is not readable."),
        },
        None => println!("Not logged in."),
    }
    Ok(())
}

// ---- student ------------------------------------------------------------

pub async fn run_slots(cfg: &Config, config_path: &Path, lecturer: Option<i64>) -> Result<()> {
    let client = client_with_session(cfg, config_path)?;
    let tz = cfg.tz()?;

    let slots = client.public_slots(lecturer).await?;
    let open = availability::filter_open_slots(&slots, Utc::now());

    if open.is_empty() {
        println!("No bookable slots right now.");
        return Ok(());
    }

    println!("Bookable slots:\n");
    for s in &open {
        let start = s.start_time.with_timezone(&tz);
        let end = s.end_time.with_timezone(&tz);
        print!(
            "  [{}] {} - {} — {}",
            s.id,
            start.format("%Y-%m-%d %H:%M"),
            end.format("%H:%M"),
            s.lecturer.as_deref().unwrap_or("?"),
        );
        if let Some(ref subject) = s.subject {
            if !subject.is_empty() {
                print!(" ({subject})");
            }
        }
        if let Some(ref loc) = s.location {
            if !loc.is_empty() {
                print!(" @ {loc}");
            }
        }
        println!(" ({} of {} free)", s.remaining(), s.capacity);
    }
    Ok(())
}

pub async fn run_book(cfg: &Config, config_path: &Path, new: NewReservation) -> Result<()> {
    let client = client_with_session(cfg, config_path)?;
    let reservation = client.create_reservation(&new).await?;
    println!(
        "Reservation {} created (status: {}).",
        reservation.id, reservation.status
    );
    Ok(())
}

pub async fn run_cancel(cfg: &Config, config_path: &Path, id: i64) -> Result<()> {
    let client = client_with_session(cfg, config_path)?;
    client.cancel_reservation(id).await?;
    println!("Reservation {id} cancelled.");
    Ok(())
}

pub async fn run_my_reservations(cfg: &Config, config_path: &Path) -> Result<()> {
    let client = client_with_session(cfg, config_path)?;
    let tz = cfg.tz()?;
    let reservations = client.list_my_reservations().await?;

    if reservations.is_empty() {
        println!("No reservations.");
        return Ok(());
    }

    println!("Your reservations:\n");
    for r in &reservations {
        print_reservation(r, &tz, false);
    }
    Ok(())
}

// ---- lecturer: windows ---------------------------------------------------

pub async fn run_windows(cfg: &Config, config_path: &Path) -> Result<()> {
    let client = client_with_session(cfg, config_path)?;
    let windows = client.list_windows().await?;

    if windows.is_empty() {
        println!("No availability windows.");
        return Ok(());
    }

    println!("Availability windows:\n");
    for w in &windows {
        print!(
            "  [{}] {} {} - {}, capacity {}",
            w.id,
            weekday_name(w.day),
            w.start_time.format("%H:%M"),
            w.end_time.format("%H:%M"),
            w.capacity,
        );
        if let Some(ref loc) = w.location {
            if !loc.is_empty() {
                print!(" @ {loc}");
            }
        }
        if !w.active {
            print!(" (inactive)");
        }
        println!();
    }
    Ok(())
}

fn window_draft(day: &str, start: &str, end: &str, capacity: u32, location: &Option<String>) -> Result<WindowDraft> {
    let day = parse_weekday(day).with_context(|| format!("Unknown weekday: {day}"))?;
    let start_time = parse_time(start).with_context(|| format!("Unparseable time: {start}"))?;
    let end_time = parse_time(end).with_context(|| format!("Unparseable time: {end}"))?;
    if end_time <= start_time {
        bail!("Window must end after it starts");
    }
    Ok(WindowDraft {
        day,
        start_time,
        end_time,
        capacity,
        location: location.clone(),
        active: true,
    })
}

pub async fn run_add_window(
    cfg: &Config,
    config_path: &Path,
    day: &str,
    start: &str,
    end: &str,
    capacity: u32,
    location: &Option<String>,
) -> Result<()> {
    let client = client_with_session(cfg, config_path)?;
    let draft = window_draft(day, start, end, capacity, location)?;
    let window = client.create_window(&draft).await?;
    println!(
        "Window {} created: {} {} - {}.",
        window.id,
        weekday_name(window.day),
        window.start_time.format("%H:%M"),
        window.end_time.format("%H:%M"),
    );
    Ok(())
}

pub async fn run_edit_window(
    cfg: &Config,
    config_path: &Path,
    id: i64,
    day: &str,
    start: &str,
    end: &str,
    capacity: u32,
    location: &Option<String>,
) -> Result<()> {
    let client = client_with_session(cfg, config_path)?;
    let draft = window_draft(day, start, end, capacity, location)?;
    let window = client.update_window(id, &draft).await?;
    println!("Window {} updated.", window.id);
    Ok(())
}

pub async fn run_remove_window(cfg: &Config, config_path: &Path, id: i64) -> Result<()> {
    let client = client_with_session(cfg, config_path)?;
    let windows = client.list_windows().await?;
    match windows.iter().find(|w| w.id == id) {
        Some(w) => {
            client.deactivate_window(id, &w.into()).await?;
            println!("Window {id} deactivated.");
        }
        None => {
            // Already gone or already inactive; either way there is
            // nothing left to do.
            println!("Window {id} is not among your active windows.");
        }
    }
    Ok(())
}

// ---- lecturer: blocked intervals ----------------------------------------

pub async fn run_blocked(cfg: &Config, config_path: &Path) -> Result<()> {
    let client = client_with_session(cfg, config_path)?;
    let blocked = client.list_blocked().await?;

    if blocked.is_empty() {
        println!("No blocked intervals.");
        return Ok(());
    }

    println!("Blocked intervals:\n");
    for b in &blocked {
        print!(
            "  [{}] {} {} - {}",
            b.id,
            b.date,
            b.start_time.format("%H:%M"),
            b.end_time.format("%H:%M"),
        );
        if let Some(ref reason) = b.reason {
            if !reason.is_empty() {
                print!(" — {reason}");
            }
        }
        println!();
    }
    Ok(())
}

fn block_draft(date: &str, start: &str, end: &str, reason: &Option<String>) -> Result<BlockDraft> {
    let date = NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .with_context(|| format!("Unparseable date (expected YYYY-MM-DD): {date}"))?;
    let start_time = parse_time(start).with_context(|| format!("Unparseable time: {start}"))?;
    let end_time = parse_time(end).with_context(|| format!("Unparseable time: {end}"))?;
    if end_time <= start_time {
        bail!("Blocked interval must end after it starts");
    }
    Ok(BlockDraft {
        date,
        start_time,
        end_time,
        reason: reason.clone(),
    })
}

pub async fn run_block(
    cfg: &Config,
    config_path: &Path,
    date: &str,
    start: &str,
    end: &str,
    reason: &Option<String>,
) -> Result<()> {
    let client = client_with_session(cfg, config_path)?;
    let draft = block_draft(date, start, end, reason)?;
    let blocked = client.create_blocked(&draft).await?;
    println!(
        "Blocked {} {} - {} (id {}).",
        blocked.date,
        blocked.start_time.format("%H:%M"),
        blocked.end_time.format("%H:%M"),
        blocked.id,
    );
    Ok(())
}

pub async fn run_edit_block(
    cfg: &Config,
    config_path: &Path,
    id: i64,
    date: &str,
    start: &str,
    end: &str,
    reason: &Option<String>,
) -> Result<()> {
    let client = client_with_session(cfg, config_path)?;
    let draft = block_draft(date, start, end, reason)?;
    let blocked = client.update_blocked(id, &draft).await?;
    println!("Blocked interval {} updated.", blocked.id);
    Ok(())
}

pub async fn run_unblock(cfg: &Config, config_path: &Path, id: i64) -> Result<()> {
    let client = client_with_session(cfg, config_path)?;
    client.delete_blocked(id).await?;
    println!("Blocked interval {id} removed.");
    Ok(())
}

// ---- lecturer: reservations ----------------------------------------------

pub async fn run_reservations(
    cfg: &Config,
    config_path: &Path,
    status: &Option<String>,
) -> Result<()> {
    let client = client_with_session(cfg, config_path)?;
    let tz = cfg.tz()?;
    let reservations = client
        .list_lecturer_reservations(status.as_deref())
        .await?;

    if reservations.is_empty() {
        println!("No reservations.");
        return Ok(());
    }

    let counts = status_counts(&reservations);
    let summary: Vec<String> = ["pending", "accepted", "rejected", "cancelled", "completed"]
        .iter()
        .filter_map(|s| counts.get(s).map(|n| format!("{n} {s}")))
        .collect();
    println!("{} reservations ({}):\n", reservations.len(), summary.join(", "));

    for r in &reservations {
        print_reservation(r, &tz, true);
    }
    Ok(())
}

fn print_reservation(r: &Reservation, tz: &chrono_tz::Tz, lecturer_view: bool) {
    print!("  [{}]", r.id);
    if let Some(start) = r.start() {
        print!(" {}", start.with_timezone(tz).format("%Y-%m-%d %H:%M"));
        let end = r.end_time.or_else(|| r.slot.as_ref().map(|s| s.end_time));
        if let Some(end) = end {
            print!(" - {}", end.with_timezone(tz).format("%H:%M"));
        }
    }
    if lecturer_view {
        if let Some(ref name) = r.student_name {
            print!(" — {name}");
        }
        if let Some(ref email) = r.student_email {
            print!(" <{email}>");
        }
    } else if let Some(ref slot) = r.slot {
        if let Some(ref lecturer) = slot.lecturer {
            print!(" — {lecturer}");
        }
    }
    print!(" [{}]", r.status);
    if let Some(ref topic) = r.topic {
        if !topic.is_empty() {
            print!(" \"{topic}\"");
        }
    }
    if let Some(ref reason) = r.rejection_reason {
        if !reason.is_empty() {
            print!(" (rejected: {reason})");
        }
    }
    let actions = if lecturer_view {
        r.status.lecturer_actions().join(", ")
    } else if r.status.student_can_cancel() {
        "cancel".to_string()
    } else {
        String::new()
    };
    if !actions.is_empty() {
        print!("  [actions: {actions}]");
    } else if r.status.is_terminal() {
        print!("  [final]");
    }
    println!();

    let notes = if lecturer_view {
        r.student_notes.as_deref()
    } else {
        r.lecturer_notes.as_deref()
    };
    if let Some(notes) = notes.filter(|n| !n.is_empty()) {
        println!("      notes: {notes}");
    }
    let attachment = if lecturer_view {
        r.student_attachment_url.as_deref()
    } else {
        r.lecturer_attachment_url.as_deref()
    };
    if let Some(url) = attachment.filter(|u| !u.is_empty()) {
        println!("      attachment: {url}");
    }
    if lecturer_view {
        if let Some(booked_at) = r.booked_at {
            println!("      booked {}", booked_at.with_timezone(tz).format("%Y-%m-%d %H:%M"));
        }
    }
}

pub async fn run_accept(cfg: &Config, config_path: &Path, id: i64) -> Result<()> {
    let client = client_with_session(cfg, config_path)?;
    let updated = client.accept_reservation(id).await?;
    println!("Reservation {} is now {}.", updated.id, updated.status);
    Ok(())
}

pub async fn run_reject(cfg: &Config, config_path: &Path, id: i64, reason: &str) -> Result<()> {
    let client = client_with_session(cfg, config_path)?;
    let updated = client.reject_reservation(id, reason).await?;
    println!("Reservation {} is now {}.", updated.id, updated.status);
    Ok(())
}

pub async fn run_mark(cfg: &Config, config_path: &Path, id: i64, status: &str) -> Result<()> {
    let client = client_with_session(cfg, config_path)?;
    let updated = client.update_reservation_status(id, status).await?;
    println!("Reservation {} is now {}.", updated.id, updated.status);
    Ok(())
}

// ---- schedule items ------------------------------------------------------

pub async fn run_my_schedule(cfg: &Config, config_path: &Path) -> Result<()> {
    let client = client_with_session(cfg, config_path)?;
    let items = client.list_schedule().await?;

    if items.is_empty() {
        println!("Your timetable is empty.");
        return Ok(());
    }

    println!("Your timetable:\n");
    for item in &items {
        print!(
            "  [{}] {} {} — {}",
            item.id,
            weekday_name(item.day),
            item.time,
            item.subject,
        );
        if let Some(ref loc) = item.location {
            if !loc.is_empty() {
                print!(" @ {loc}");
            }
        }
        println!();
    }
    Ok(())
}

fn schedule_item_draft(
    subject: &str,
    day: &str,
    time: &str,
    location: &Option<String>,
) -> Result<ScheduleItemDraft> {
    let day = parse_weekday(day).with_context(|| format!("Unknown weekday: {day}"))?;
    if subject.trim().is_empty() {
        bail!("Subject must not be empty");
    }
    Ok(ScheduleItemDraft {
        subject: subject.to_string(),
        day,
        time: time.to_string(),
        location: location.clone(),
    })
}

pub async fn run_add_class(
    cfg: &Config,
    config_path: &Path,
    subject: &str,
    day: &str,
    time: &str,
    location: &Option<String>,
) -> Result<()> {
    let client = client_with_session(cfg, config_path)?;
    let draft = schedule_item_draft(subject, day, time, location)?;
    let item = client.create_schedule_item(&draft).await?;
    println!(
        "Class {} added: {} {} — {}.",
        item.id,
        weekday_name(item.day),
        item.time,
        item.subject,
    );
    Ok(())
}

pub async fn run_edit_class(
    cfg: &Config,
    config_path: &Path,
    id: i64,
    subject: &str,
    day: &str,
    time: &str,
    location: &Option<String>,
) -> Result<()> {
    let client = client_with_session(cfg, config_path)?;
    let draft = schedule_item_draft(subject, day, time, location)?;
    let item = client.update_schedule_item(id, &draft).await?;
    println!("Class {} updated.", item.id);
    Ok(())
}

pub async fn run_remove_class(cfg: &Config, config_path: &Path, id: i64) -> Result<()> {
    let client = client_with_session(cfg, config_path)?;
    client.delete_schedule_item(id).await?;
    println!("Class {id} removed.");
    Ok(())
}

// ---- admin ---------------------------------------------------------------

pub fn parse_account_kind(raw: &str) -> Result<AccountKind> {
    AccountKind::parse(raw)
        .ok_or_else(|| anyhow::anyhow!("Unknown account kind (expected lecturer or student): {raw}"))
}

pub async fn run_admin_stats(cfg: &Config, config_path: &Path) -> Result<()> {
    let client = client_with_session(cfg, config_path)?;
    let stats = client.admin_stats().await?;
    println!("Active users:       {}", stats.active_users);
    println!("Lecturers:          {}", stats.total_lecturers);
    println!("Reservations:       {}", stats.total_reservations);
    println!("Average rating:     {:.1}", stats.average_rating);
    Ok(())
}

pub async fn run_admin_users(cfg: &Config, config_path: &Path, kind: AccountKind) -> Result<()> {
    let client = client_with_session(cfg, config_path)?;
    let users = client.admin_users(kind).await?;

    if users.is_empty() {
        println!("No {}.", kind.segment());
        return Ok(());
    }

    println!("{} accounts:\n", users.len());
    for u in &users {
        print!("  [{}] {} <{}>", u.id, u.username, u.email);
        let name = format!("{} {}", u.first_name, u.last_name);
        if !name.trim().is_empty() {
            print!(" — {}", name.trim());
        }
        if let Some(ref dept) = u.department {
            if !dept.is_empty() {
                print!(", {dept}");
            }
        }
        if let Some(n) = u.consultations_count {
            print!(", {n} consultations");
        }
        if let Some(n) = u.reservations_count {
            print!(", {n} reservations");
        }
        if !u.is_active {
            print!(" (suspended)");
        }
        println!();
    }
    Ok(())
}

pub async fn run_admin_toggle(
    cfg: &Config,
    config_path: &Path,
    kind: AccountKind,
    id: i64,
) -> Result<()> {
    let client = client_with_session(cfg, config_path)?;
    let user = client.admin_toggle_status(kind, id).await?;
    let state = if user.is_active { "active" } else { "suspended" };
    println!("Account {} ({}) is now {state}.", user.id, user.username);
    Ok(())
}

pub async fn run_admin_remove(
    cfg: &Config,
    config_path: &Path,
    kind: AccountKind,
    id: i64,
) -> Result<()> {
    let client = client_with_session(cfg, config_path)?;
    client.admin_delete_user(kind, id).await?;
    println!("Account {id} deleted.");
    Ok(())
}

// ---- export / import -----------------------------------------------------

pub async fn run_export(cfg: &Config, config_path: &Path, out: &Option<std::path::PathBuf>) -> Result<()> {
    let client = client_with_session(cfg, config_path)?;
    let bytes = client.export_schedule_csv().await?;

    let path = match out {
        Some(p) => p.clone(),
        None => std::path::PathBuf::from(format!(
            "schedule-{}.csv",
            Utc::now().format("%Y-%m-%d")
        )),
    };
    std::fs::write(&path, &bytes)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    println!("Exported {} bytes to {}.", bytes.len(), path.display());
    Ok(())
}

/// Ships the file to the matching import endpoint by extension: .csv to
/// the timetable upload, .ics to the calendar upload, .json (an array of
/// window records) to the bulk window import. The file content itself is
/// parsed server-side.
pub async fn run_import(cfg: &Config, config_path: &Path, file: &Path) -> Result<()> {
    let client = client_with_session(cfg, config_path)?;
    let ext = file
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    let resp = match ext.as_str() {
        "csv" => client.upload_schedule_csv(file).await?,
        "ics" => client.upload_schedule_ics(file).await?,
        "json" => {
            let content = std::fs::read_to_string(file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let windows: serde_json::Value = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse {}", file.display()))?;
            client.bulk_create_windows(&windows).await?
        }
        _ => client.import_schedule(file).await?,
    };

    if let Some(msg) = resp.get("message").and_then(|v| v.as_str()) {
        println!("{msg}");
    } else {
        println!("Import finished.");
    }
    if let Some(errors) = resp.get("errors").and_then(|v| v.as_array()) {
        for e in errors {
            println!("  ! {}", e.as_str().unwrap_or("?"));
        }
    }
    info!("Imported {}", file.display());
    Ok(())
}
