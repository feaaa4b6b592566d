use std::path::Path;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::ApiError;
use crate::models::{
    weekday_name, AccountKind, AdminStats, AdminUser, AvailabilityWindow, BlockDraft,
    BlockedInterval, NewAccount, NewReservation, OpenSlot, Reservation, ScheduleItem,
    ScheduleItemDraft, WindowDraft,
};

/// Typed wrapper around the booking backend's REST API. Holds the bearer
/// token and attaches it to every non-public request; all payloads are
/// decoded into canonical model types at this boundary.
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginTokens {
    #[serde(alias = "token")]
    pub access: String,
    #[serde(default)]
    pub refresh: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        let http = Client::builder().build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
        })
    }

    pub fn set_token(&mut self, token: &str) {
        self.token = Some(token.to_string());
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if let Some(ref token) = self.token {
            if let Ok(val) = HeaderValue::from_str(&format!("Bearer {token}")) {
                headers.insert(AUTHORIZATION, val);
            }
        }
        headers
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http.request(method, self.url(path)).headers(self.headers())
    }

    /// Decode a JSON response, mapping non-success statuses into the
    /// error taxonomy first.
    async fn expect_json<T: DeserializeOwned>(resp: Response) -> Result<T, ApiError> {
        let status = resp.status();
        let text = resp.text().await?;
        debug!("response (status {}): {}", status, text);
        if !status.is_success() {
            return Err(ApiError::from_response(status, &text));
        }
        serde_json::from_str(&text).map_err(|_| ApiError::Unexpected {
            status: status.as_u16(),
            body: text.chars().take(500).collect(),
        })
    }

    async fn expect_ok(resp: Response) -> Result<(), ApiError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        let text = resp.text().await?;
        debug!("response (status {}): {}", status, text);
        Err(ApiError::from_response(status, &text))
    }

    // ---- session -------------------------------------------------------

    pub async fn login(&mut self, email: &str, password: &str) -> Result<LoginTokens, ApiError> {
        let resp = self
            .request(Method::POST, "/api/users/login/")
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await?;
        let tokens: LoginTokens = Self::expect_json(resp).await?;
        self.token = Some(tokens.access.clone());
        info!("Logged in as {}", email);
        Ok(tokens)
    }

    /// Self-service registration creates student accounts; lecturer
    /// accounts are provisioned by administrators.
    pub async fn register(&self, new: &NewAccount) -> Result<serde_json::Value, ApiError> {
        let resp = self
            .request(Method::POST, "/api/users/register/")
            .json(&serde_json::json!({
                "username": new.username,
                "email": new.email,
                "first_name": new.first_name,
                "last_name": new.last_name,
                "password": new.password,
                "password2": new.password,
                "role": "student",
            }))
            .send()
            .await?;
        Self::expect_json(resp).await
    }

    pub async fn refresh(&mut self, refresh_token: &str) -> Result<LoginTokens, ApiError> {
        let resp = self
            .request(Method::POST, "/api/users/token/refresh/")
            .json(&serde_json::json!({ "refresh": refresh_token }))
            .send()
            .await?;
        let tokens: LoginTokens = Self::expect_json(resp).await?;
        self.token = Some(tokens.access.clone());
        Ok(tokens)
    }

    // ---- availability windows ------------------------------------------

    pub async fn list_windows(&self) -> Result<Vec<AvailabilityWindow>, ApiError> {
        let resp = self
            .request(Method::GET, "/api/schedules/calendar/time-windows/")
            .send()
            .await?;
        Self::expect_json(resp).await
    }

    pub async fn create_window(&self, draft: &WindowDraft) -> Result<AvailabilityWindow, ApiError> {
        let resp = self
            .request(Method::POST, "/api/schedules/calendar/time-windows/")
            .json(&window_payload(draft))
            .send()
            .await?;
        Self::expect_json(resp).await
    }

    pub async fn update_window(
        &self,
        id: i64,
        draft: &WindowDraft,
    ) -> Result<AvailabilityWindow, ApiError> {
        let resp = self
            .request(Method::PUT, &format!("/api/schedules/calendar/time-windows/{id}/"))
            .json(&window_payload(draft))
            .send()
            .await?;
        Self::expect_json(resp).await
    }

    /// Soft-deactivation: the window is switched off, never hard-deleted,
    /// so reservations that already reference it stay valid. A 404 means
    /// the window is already gone and counts as success.
    pub async fn deactivate_window(&self, id: i64, draft: &WindowDraft) -> Result<(), ApiError> {
        let mut off = draft.clone();
        off.active = false;
        gone_is_ok(self.update_window(id, &off).await)
    }

    pub async fn bulk_create_windows(
        &self,
        windows: &serde_json::Value,
    ) -> Result<serde_json::Value, ApiError> {
        let resp = self
            .request(Method::POST, "/api/schedules/calendar/time-windows/bulk_create/")
            .json(windows)
            .send()
            .await?;
        Self::expect_json(resp).await
    }

    // ---- blocked intervals ---------------------------------------------

    pub async fn list_blocked(&self) -> Result<Vec<BlockedInterval>, ApiError> {
        let resp = self
            .request(Method::GET, "/api/schedules/calendar/blocked-times/")
            .send()
            .await?;
        Self::expect_json(resp).await
    }

    pub async fn create_blocked(&self, draft: &BlockDraft) -> Result<BlockedInterval, ApiError> {
        let resp = self
            .request(Method::POST, "/api/schedules/calendar/blocked-times/")
            .json(&block_payload(draft))
            .send()
            .await?;
        Self::expect_json(resp).await
    }

    pub async fn update_blocked(
        &self,
        id: i64,
        draft: &BlockDraft,
    ) -> Result<BlockedInterval, ApiError> {
        let resp = self
            .request(Method::PUT, &format!("/api/schedules/calendar/blocked-times/{id}/"))
            .json(&block_payload(draft))
            .send()
            .await?;
        Self::expect_json(resp).await
    }

    pub async fn delete_blocked(&self, id: i64) -> Result<(), ApiError> {
        let resp = self
            .request(Method::DELETE, &format!("/api/schedules/calendar/blocked-times/{id}/"))
            .send()
            .await?;
        gone_is_ok(Self::expect_ok(resp).await)
    }

    // ---- public slots ---------------------------------------------------

    pub async fn public_slots(&self, lecturer_id: Option<i64>) -> Result<Vec<OpenSlot>, ApiError> {
        let mut req = self.request(Method::GET, "/api/schedules/public-available-slots/");
        if let Some(id) = lecturer_id {
            req = req.query(&[("lecturer_id", id)]);
        }
        let resp = req.send().await?;
        Self::expect_json(resp).await
    }

    // ---- reservations: student -----------------------------------------

    /// With an attachment the body goes out as multipart (no JSON
    /// content-type, so the boundary is generated correctly); without one
    /// a plain JSON body is enough.
    pub async fn create_reservation(&self, new: &NewReservation) -> Result<Reservation, ApiError> {
        let resp = if let Some(ref path) = new.attachment {
            let form = reservation_form(new, path).await?;
            self.request(Method::POST, "/api/reservations/student/")
                .multipart(form)
                .send()
                .await?
        } else {
            self.request(Method::POST, "/api/reservations/student/")
                .json(&serde_json::json!({
                    "slot_id": new.slot_id,
                    "topic": new.topic.as_deref().unwrap_or(""),
                    "student_notes": new.student_notes.as_deref().unwrap_or(""),
                }))
                .send()
                .await?
        };
        Self::expect_json(resp).await
    }

    pub async fn list_my_reservations(&self) -> Result<Vec<Reservation>, ApiError> {
        let resp = self
            .request(Method::GET, "/api/reservations/student/")
            .send()
            .await?;
        Self::expect_json(resp).await
    }

    pub async fn cancel_reservation(&self, id: i64) -> Result<(), ApiError> {
        let resp = self
            .request(Method::POST, &format!("/api/reservations/student/{id}/cancel/"))
            .send()
            .await?;
        Self::expect_ok(resp).await
    }

    // ---- reservations: lecturer ----------------------------------------

    pub async fn list_lecturer_reservations(
        &self,
        status: Option<&str>,
    ) -> Result<Vec<Reservation>, ApiError> {
        let mut req = self.request(Method::GET, "/api/reservations/lecturer/");
        if let Some(status) = status {
            req = req.query(&[("status", status)]);
        }
        let resp = req.send().await?;
        Self::expect_json(resp).await
    }

    pub async fn accept_reservation(&self, id: i64) -> Result<Reservation, ApiError> {
        let resp = self
            .request(Method::POST, &format!("/api/reservations/lecturer/{id}/accept/"))
            .send()
            .await?;
        Self::expect_json(resp).await
    }

    pub async fn reject_reservation(&self, id: i64, reason: &str) -> Result<Reservation, ApiError> {
        let resp = self
            .request(Method::POST, &format!("/api/reservations/lecturer/{id}/reject/"))
            .json(&serde_json::json!({ "rejection_reason": reason }))
            .send()
            .await?;
        Self::expect_json(resp).await
    }

    pub async fn update_reservation_status(
        &self,
        id: i64,
        status: &str,
    ) -> Result<Reservation, ApiError> {
        let resp = self
            .request(Method::POST, &format!("/api/reservations/lecturer/{id}/update_status/"))
            .json(&serde_json::json!({ "status": status }))
            .send()
            .await?;
        Self::expect_json(resp).await
    }

    // ---- schedule items -------------------------------------------------

    pub async fn list_schedule(&self) -> Result<Vec<ScheduleItem>, ApiError> {
        let resp = self
            .request(Method::GET, "/api/schedules/schedule/")
            .send()
            .await?;
        Self::expect_json(resp).await
    }

    pub async fn create_schedule_item(
        &self,
        draft: &ScheduleItemDraft,
    ) -> Result<ScheduleItem, ApiError> {
        let resp = self
            .request(Method::POST, "/api/schedules/schedule/")
            .json(&schedule_item_payload(draft))
            .send()
            .await?;
        Self::expect_json(resp).await
    }

    pub async fn update_schedule_item(
        &self,
        id: i64,
        draft: &ScheduleItemDraft,
    ) -> Result<ScheduleItem, ApiError> {
        let resp = self
            .request(Method::PATCH, &format!("/api/schedules/schedule/{id}/"))
            .json(&schedule_item_payload(draft))
            .send()
            .await?;
        Self::expect_json(resp).await
    }

    pub async fn delete_schedule_item(&self, id: i64) -> Result<(), ApiError> {
        let resp = self
            .request(Method::DELETE, &format!("/api/schedules/schedule/{id}/"))
            .send()
            .await?;
        gone_is_ok(Self::expect_ok(resp).await)
    }

    // ---- admin -----------------------------------------------------------

    pub async fn admin_stats(&self) -> Result<AdminStats, ApiError> {
        let resp = self.request(Method::GET, "/api/admin/stats/").send().await?;
        Self::expect_json(resp).await
    }

    pub async fn admin_users(&self, kind: AccountKind) -> Result<Vec<AdminUser>, ApiError> {
        let resp = self
            .request(Method::GET, &format!("/api/admin/{}/", kind.segment()))
            .send()
            .await?;
        Self::expect_json(resp).await
    }

    /// Flips the account between active and suspended; the backend
    /// returns the updated record.
    pub async fn admin_toggle_status(
        &self,
        kind: AccountKind,
        id: i64,
    ) -> Result<AdminUser, ApiError> {
        let resp = self
            .request(
                Method::PATCH,
                &format!("/api/admin/{}/{id}/toggle-status/", kind.segment()),
            )
            .send()
            .await?;
        Self::expect_json(resp).await
    }

    pub async fn admin_delete_user(&self, kind: AccountKind, id: i64) -> Result<(), ApiError> {
        let resp = self
            .request(
                Method::DELETE,
                &format!("/api/admin/{}/{id}/", kind.segment()),
            )
            .send()
            .await?;
        gone_is_ok(Self::expect_ok(resp).await)
    }

    // ---- schedule export / import --------------------------------------

    pub async fn export_schedule_csv(&self) -> Result<Vec<u8>, ApiError> {
        let resp = self
            .request(Method::GET, "/api/schedules/export/")
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await?;
            return Err(ApiError::from_response(status, &text));
        }
        Ok(resp.bytes().await?.to_vec())
    }

    pub async fn import_schedule(&self, file: &Path) -> Result<serde_json::Value, ApiError> {
        self.upload(file, "/api/schedules/import/").await
    }

    pub async fn upload_schedule_csv(&self, file: &Path) -> Result<serde_json::Value, ApiError> {
        self.upload(file, "/api/schedules/schedule/upload/").await
    }

    pub async fn upload_schedule_ics(&self, file: &Path) -> Result<serde_json::Value, ApiError> {
        self.upload(file, "/api/schedules/schedule/upload-ics/").await
    }

    async fn upload(&self, file: &Path, path: &str) -> Result<serde_json::Value, ApiError> {
        let form = file_form(file).await?;
        let resp = self
            .request(Method::POST, path)
            .multipart(form)
            .send()
            .await?;
        Self::expect_json(resp).await
    }
}

/// Deleting or deactivating a resource that is already gone counts as
/// success: it is absent either way and the caller refreshes afterwards.
fn gone_is_ok<T>(result: Result<T, ApiError>) -> Result<(), ApiError> {
    match result {
        Ok(_) => Ok(()),
        Err(ApiError::NotFound) => Ok(()),
        Err(e) => Err(e),
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".to_string())
}

async fn file_form(path: &Path) -> Result<reqwest::multipart::Form, ApiError> {
    let bytes = tokio::fs::read(path).await?;
    let part = reqwest::multipart::Part::bytes(bytes).file_name(file_name(path));
    Ok(reqwest::multipart::Form::new().part("file", part))
}

async fn reservation_form(
    new: &NewReservation,
    attachment: &Path,
) -> Result<reqwest::multipart::Form, ApiError> {
    let bytes = tokio::fs::read(attachment).await?;
    let part = reqwest::multipart::Part::bytes(bytes).file_name(file_name(attachment));
    let mut form = reqwest::multipart::Form::new()
        .text("slot_id", new.slot_id.to_string())
        .part("student_attachment", part);
    if let Some(ref topic) = new.topic {
        form = form.text("topic", topic.clone());
    }
    if let Some(ref notes) = new.student_notes {
        form = form.text("student_notes", notes.clone());
    }
    Ok(form)
}

fn window_payload(draft: &WindowDraft) -> serde_json::Value {
    serde_json::json!({
        "day": weekday_name(draft.day),
        "start_time": draft.start_time.format("%H:%M").to_string(),
        "end_time": draft.end_time.format("%H:%M").to_string(),
        "capacity": draft.capacity,
        "location": draft.location.as_deref().unwrap_or(""),
        "active": draft.active,
        "is_recurring": true,
    })
}

fn schedule_item_payload(draft: &ScheduleItemDraft) -> serde_json::Value {
    serde_json::json!({
        "subject": draft.subject,
        "day": weekday_name(draft.day),
        "time": draft.time,
        "location": draft.location.as_deref().unwrap_or(""),
    })
}

fn block_payload(draft: &BlockDraft) -> serde_json::Value {
    serde_json::json!({
        "date": draft.date.format("%Y-%m-%d").to_string(),
        "start_time": draft.start_time.format("%H:%M").to_string(),
        "end_time": draft.end_time.format("%H:%M").to_string(),
        "reason": draft.reason.as_deref().unwrap_or(""),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime, Weekday};

    #[test]
    fn window_payload_round_trips_through_the_canonical_type() {
        let draft = WindowDraft {
            day: Weekday::Mon,
            start_time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(11, 0, 0).unwrap(),
            capacity: 2,
            location: Some("B5 / 410".into()),
            active: true,
        };
        let mut payload = window_payload(&draft);
        payload["id"] = serde_json::json!(1);
        let decoded: AvailabilityWindow = serde_json::from_value(payload).unwrap();
        assert_eq!(decoded.day, draft.day);
        assert_eq!(decoded.start_time, draft.start_time);
        assert_eq!(decoded.end_time, draft.end_time);
        assert_eq!(decoded.capacity, draft.capacity);
        assert_eq!(decoded.location, draft.location);
        assert!(decoded.active);
    }

    #[test]
    fn block_payload_uses_iso_dates_and_short_times() {
        let draft = BlockDraft {
            date: NaiveDate::from_ymd_opt(2026, 1, 12).unwrap(),
            start_time: NaiveTime::from_hms_opt(10, 30, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
            reason: None,
        };
        let payload = block_payload(&draft);
        assert_eq!(payload["date"], "2026-01-12");
        assert_eq!(payload["start_time"], "10:30");
        assert_eq!(payload["end_time"], "12:00");
    }

    #[test]
    fn schedule_item_payload_round_trips_through_the_canonical_type() {
        let draft = ScheduleItemDraft {
            subject: "Analiza matematyczna".into(),
            day: Weekday::Wed,
            time: "08:00 - 09:30".into(),
            location: None,
        };
        let mut payload = schedule_item_payload(&draft);
        payload["id"] = serde_json::json!(4);
        let decoded: ScheduleItem = serde_json::from_value(payload).unwrap();
        assert_eq!(decoded.subject, draft.subject);
        assert_eq!(decoded.day, draft.day);
        assert_eq!(decoded.time, draft.time);
    }

    #[test]
    fn already_gone_resources_count_as_deleted() {
        assert!(gone_is_ok::<()>(Err(ApiError::NotFound)).is_ok());
        assert!(gone_is_ok(Ok(7)).is_ok());
        assert!(matches!(
            gone_is_ok::<()>(Err(ApiError::Unauthorized)),
            Err(ApiError::Unauthorized)
        ));
        assert!(matches!(
            gone_is_ok::<()>(Err(ApiError::Validation("in use".into()))),
            Err(ApiError::Validation(_))
        ));
    }

    #[test]
    fn base_url_trailing_slash_is_normalised() {
        let client = ApiClient::new("http://localhost:8000/").unwrap();
        assert_eq!(
            client.url("/api/schedules/export/"),
            "http://localhost:8000/api/schedules/export/"
        );
    }
}
