use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::ValidationErrors;

static EMAIL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email pattern")
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub email: String,
    #[serde(with = "time::serde::rfc3339")]
    pub signed_in_at: OffsetDateTime,
}

/// "Is there a signed-in operator" and "sign out", as seen by the dashboard.
pub trait SessionProvider {
    fn current(&self) -> Result<Option<Session>>;

    fn sign_out(&self) -> Result<()>;
}

/// Session persisted as JSON in the state directory.
#[derive(Debug, Clone)]
pub struct SessionFile {
    path: PathBuf,
}

impl SessionFile {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn sign_in(&self, email: &str) -> Result<Session> {
        let email = validate_email(email)?;
        let session = Session {
            email,
            signed_in_at: OffsetDateTime::now_utc(),
        };
        let json = serde_json::to_vec_pretty(&session).context("serialising session")?;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating session dir {}", parent.display()))?;
        }
        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, &json)
            .with_context(|| format!("writing temporary session {}", tmp_path.display()))?;
        fs::rename(&tmp_path, &self.path)
            .with_context(|| format!("persisting session {}", self.path.display()))?;
        tracing::info!(email = %session.email, "operator signed in");
        Ok(session)
    }
}

impl SessionProvider for SessionFile {
    fn current(&self) -> Result<Option<Session>> {
        let raw = match fs::read(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("reading session {}", self.path.display()))
            }
        };
        match serde_json::from_slice::<Session>(&raw) {
            Ok(session) => Ok(Some(session)),
            Err(err) => {
                tracing::warn!(?err, path = %self.path.display(), "ignoring unreadable session file");
                Ok(None)
            }
        }
    }

    fn sign_out(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                tracing::info!("operator signed out");
                Ok(())
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => {
                Err(err).with_context(|| format!("removing session {}", self.path.display()))
            }
        }
    }
}

pub fn validate_email(raw: &str) -> Result<String, ValidationErrors> {
    let email = raw.trim();
    let mut errors = ValidationErrors::default();
    if email.is_empty() {
        errors.push("email", "Email is required");
    } else if !EMAIL_PATTERN.is_match(email) {
        errors.push("email", "Invalid email address");
    }
    errors.into_result()?;
    Ok(email.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn sign_in_then_out_round_trips_through_the_file() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let sessions = SessionFile::new(temp.path().join("state/session.json"));
        assert_eq!(sessions.current()?, None);

        let session = sessions.sign_in("  desk@clinic.example ")?;
        assert_eq!(session.email, "desk@clinic.example");
        assert_eq!(sessions.current()?.map(|s| s.email), Some(session.email));

        sessions.sign_out()?;
        assert_eq!(sessions.current()?, None);
        sessions.sign_out()?;
        Ok(())
    }

    #[test]
    fn rejects_missing_or_malformed_email() {
        assert_eq!(
            validate_email(" ").unwrap_err().for_field("email"),
            Some("Email is required")
        );
        assert_eq!(
            validate_email("desk@clinic").unwrap_err().for_field("email"),
            Some("Invalid email address")
        );
        assert!(validate_email("a@b.co").is_ok());
    }

    #[test]
    fn corrupt_session_file_counts_as_signed_out() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let path = temp.path().join("session.json");
        fs::write(&path, b"{not json")?;
        assert_eq!(SessionFile::new(path).current()?, None);
        Ok(())
    }
}
