//! Error taxonomy shared by every stage of a mirror run.
//!
//! Benign conditions (already cloned, already up to date, diverged mirror,
//! repository already exists) are never errors: they surface as outcome
//! variants on [`crate::mirror::MirrorOutcome`], [`crate::remote::PushOutcome`]
//! and [`crate::platform::EnsuredRepository`].

use std::path::PathBuf;
use thiserror::Error;

use crate::platform::Platform;

pub type Result<T, E = MirrorError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum MirrorError {
    /// Repository list or configuration file could not be accessed
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration file exists but is not valid YAML for [`crate::Config`]
    #[error("Failed to parse config file {}: {source}", path.display())]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// Malformed credential or configuration value
    #[error("Invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    /// Local mirror or platform resource is absent
    #[error("{what} not found: {name}")]
    NotFound { what: &'static str, name: String },

    /// Git transport or working-copy failure
    #[error("git {command} failed: {details}")]
    RemoteProtocol { command: String, details: String },

    /// Non-2xx or unexpected response from a platform API
    #[error("{platform} API error{}: {message}", status.map(|s| format!(" ({})", s)).unwrap_or_default())]
    PlatformApi {
        platform: Platform,
        status: Option<u16>,
        message: String,
    },

    /// A bounded wait was exhausted
    #[error("{operation} did not finish after {attempts} attempts")]
    Timeout { operation: String, attempts: u32 },
}

impl MirrorError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn platform(platform: Platform, status: Option<u16>, message: impl Into<String>) -> Self {
        Self::PlatformApi {
            platform,
            status,
            message: message.into(),
        }
    }

    /// Map a reqwest transport/decoding failure onto the platform that issued it
    pub fn http(platform: Platform, err: reqwest::Error) -> Self {
        Self::PlatformApi {
            platform,
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
        }
    }

    /// HTTP status carried by a platform error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::PlatformApi { status, .. } => *status,
            _ => None,
        }
    }
}
