use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use base64::prelude::*;
use serde::{Deserialize, Serialize};

/// The one piece of shared mutable state the client keeps: the bearer
/// token, written at login, read by every invocation, cleared at logout
/// and whenever the backend answers 401.
#[derive(Debug, Deserialize, Serialize)]
pub struct Session {
    pub token: String,
    #[serde(default)]
    pub refresh: Option<String>,
}

/// Sessions live next to the config file.
pub fn session_path(config_path: &Path) -> PathBuf {
    config_path
        .parent()
        .unwrap_or(Path::new("."))
        .join("session.json")
}

pub fn load(config_path: &Path) -> Result<Option<Session>> {
    let path = session_path(config_path);
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let session: Session = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(Some(session))
}

pub fn save(config_path: &Path, session: &Session) -> Result<()> {
    let path = session_path(config_path);
    let content = serde_json::to_string_pretty(session)?;
    std::fs::write(&path, content).with_context(|| format!("Failed to write {}", path.display()))
}

pub fn clear(config_path: &Path) -> Result<()> {
    let path = session_path(config_path);
    if path.exists() {
        std::fs::remove_file(&path)
            .with_context(|| format!("Failed to remove {}", path.display()))?;
    }
    Ok(())
}

/// Decode the JWT payload without verifying it — good enough to show
/// who the token belongs to. Verification is the backend's job.
pub fn token_claims(token: &str) -> Option<serde_json::Value> {
    let payload = token.split('.').nth(1)?;
    let bytes = BASE64_URL_SAFE_NO_PAD.decode(payload).ok()?;
    serde_json::from_slice(&bytes).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claims_decode_from_unsigned_token() {
        let payload = BASE64_URL_SAFE_NO_PAD
            .encode(r#"{"user_id": 42, "role": "lecturer", "email": "m.lewandowska@agh.edu.pl"}"#);
        let token = format!("eyJhbGciOiJIUzI1NiJ9.{payload}.sig");
        let claims = token_claims(&token).unwrap();
        assert_eq!(claims["user_id"], 42);
        assert_eq!(claims["role"], "lecturer");
    }

    #[test]
    fn garbage_tokens_decode_to_none() {
        assert!(token_claims("not-a-jwt").is_none());
        assert!(token_claims("a.%%%.c").is_none());
    }
}
