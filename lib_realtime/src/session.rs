//! # Stored Session
//!
//! Read-only access to the session file the authentication flow persists:
//! the bearer token and the signed-in user's profile. This crate never writes
//! it; signing in and out belongs to the authentication collaborator.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::core::transport::Credential;

/// Directory under the platform data dir that holds the session file.
pub const APP_DIR: &str = "internship-marketplace";
pub const SESSION_FILE: &str = "session.json";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    /// `student` or `company`.
    #[serde(default)]
    pub role: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredSession {
    pub token: String,
    #[serde(default)]
    pub user: Option<UserProfile>,
}

impl StoredSession {
    /// `None` when the stored token is blank.
    pub fn credential(&self) -> Option<Credential> {
        Credential::new(self.token.clone())
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("could not read session file {}: {source}", path.display())]
    Io { path: PathBuf, source: std::io::Error },

    #[error("session file {} is not valid: {source}", path.display())]
    Parse { path: PathBuf, source: serde_json::Error },
}

pub struct SessionFile;

impl SessionFile {
    pub fn default_path() -> Option<PathBuf> {
        dirs::data_dir().map(|dir| dir.join(APP_DIR).join(SESSION_FILE))
    }

    /// `Ok(None)` when no session was ever stored.
    pub fn load(path: &Path) -> Result<Option<StoredSession>, SessionError> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                log::debug!("No session file at {}", path.display());
                return Ok(None);
            }
            Err(source) => return Err(SessionError::Io { path: path.to_path_buf(), source }),
        };

        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|source| SessionError::Parse { path: path.to_path_buf(), source })
    }
}
