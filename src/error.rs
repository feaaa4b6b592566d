use thiserror::Error;

/// Failure taxonomy for backend calls: transport, validation (4xx with a
/// field-level payload), expired session (401), stale reference (404),
/// and undecodable bodies.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("{0}")]
    Validation(String),

    #[error("session expired or not logged in")]
    Unauthorized,

    #[error("resource not found")]
    NotFound,

    #[error("could not read attachment: {0}")]
    Io(#[from] std::io::Error),

    #[error("unexpected response (status {status}): {body}")]
    Unexpected { status: u16, body: String },
}

impl ApiError {
    /// Classify a non-success response. The human-readable message is
    /// pulled out of the JSON error payload when one is present and
    /// surfaced verbatim.
    pub fn from_response(status: reqwest::StatusCode, body: &str) -> Self {
        match status.as_u16() {
            401 => Self::Unauthorized,
            404 => Self::NotFound,
            400..=499 => Self::Validation(extract_message(body).unwrap_or_else(|| body.to_string())),
            code => Self::Unexpected {
                status: code,
                body: body.chars().take(500).collect(),
            },
        }
    }
}

/// Pull a displayable message out of an error payload. The backend sends
/// either `{"detail": "..."}`, `{"status": "..."}` or a field-error map
/// like `{"slot_id": ["This slot is inactive."]}`.
pub fn extract_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    let obj = value.as_object()?;

    for key in ["detail", "status", "message"] {
        if let Some(msg) = obj.get(key).and_then(|v| v.as_str()) {
            return Some(msg.to_string());
        }
    }

    // First field error, prefixed with its field name.
    for (field, errors) in obj {
        let msg = match errors {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Array(arr) => {
                arr.first().and_then(|v| v.as_str()).map(str::to_string)
            }
            _ => None,
        };
        if let Some(msg) = msg {
            return Some(format!("{field}: {msg}"));
        }
    }
    None
}

/// True when the error chain bottoms out in an expired session. The CLI
/// uses this to clear the stored token before reporting the failure.
pub fn is_unauthorized(err: &anyhow::Error) -> bool {
    err.chain()
        .any(|cause| matches!(cause.downcast_ref::<ApiError>(), Some(ApiError::Unauthorized)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_detail_message() {
        let body = r#"{"detail": "Nie masz uprawnień do anulowania tej rezerwacji."}"#;
        assert_eq!(
            extract_message(body).as_deref(),
            Some("Nie masz uprawnień do anulowania tej rezerwacji.")
        );
    }

    #[test]
    fn extracts_first_field_error() {
        let body = r#"{"slot_id": ["Ten slot jest nieaktywny."]}"#;
        assert_eq!(
            extract_message(body).as_deref(),
            Some("slot_id: Ten slot jest nieaktywny.")
        );
    }

    #[test]
    fn non_json_bodies_yield_nothing() {
        assert_eq!(extract_message("<html>502</html>"), None);
    }

    #[test]
    fn statuses_map_to_variants() {
        use reqwest::StatusCode;
        assert!(matches!(
            ApiError::from_response(StatusCode::UNAUTHORIZED, ""),
            ApiError::Unauthorized
        ));
        assert!(matches!(
            ApiError::from_response(StatusCode::NOT_FOUND, ""),
            ApiError::NotFound
        ));
        assert!(matches!(
            ApiError::from_response(StatusCode::BAD_REQUEST, r#"{"detail":"bad"}"#),
            ApiError::Validation(msg) if msg == "bad"
        ));
        assert!(matches!(
            ApiError::from_response(StatusCode::BAD_GATEWAY, "oops"),
            ApiError::Unexpected { status: 502, .. }
        ));
    }
}
