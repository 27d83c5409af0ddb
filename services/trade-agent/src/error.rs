//! Error types for the trade agent

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Platform result code for a rejected password
pub const ERESULT_INVALID_PASSWORD: i32 = 5;

/// Error reported by a platform collaborator
///
/// `eresult` is the platform's numeric result code when the failure came from
/// the remote side; local failures carry `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{message}")]
pub struct PlatformError {
    pub eresult: Option<i32>,
    pub message: String,
}

impl PlatformError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            eresult: None,
            message: message.into(),
        }
    }

    pub fn with_eresult(eresult: i32, message: impl Into<String>) -> Self {
        Self {
            eresult: Some(eresult),
            message: message.into(),
        }
    }

    /// Whether the platform rejected the account credentials
    pub fn is_invalid_credentials(&self) -> bool {
        self.eresult == Some(ERESULT_INVALID_PASSWORD)
    }
}

/// Errors surfaced by the agent
#[derive(Debug, Error)]
pub enum AgentError {
    /// Missing or invalid configuration (credentials, secrets, settings)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Credentials rejected by the platform
    #[error("Authentication failed (eresult {eresult}): {message}")]
    Authentication { eresult: i32, message: String },

    /// Session lifecycle misuse (overlapping relogin, not logged in)
    #[error("Session error: {0}")]
    Session(String),

    /// Offer submission, fetch or cancel failure
    #[error("Trade offer error: {0}")]
    Offer(#[source] PlatformError),

    /// Confirmation fetch or respond failure
    #[error("Confirmation error: {0}")]
    Confirmation(#[source] PlatformError),

    /// Any other collaborator failure
    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    /// Settings could not be loaded
    #[error("Settings error: {0}")]
    Settings(#[from] config::ConfigError),

    /// Background task ended before reporting a result
    #[error("Task dropped before completion: {0}")]
    Dropped(String),
}

impl AgentError {
    /// Classify a collaborator logon failure
    pub fn from_logon(err: PlatformError) -> Self {
        match err.eresult {
            Some(code) if code == ERESULT_INVALID_PASSWORD => AgentError::Authentication {
                eresult: code,
                message: err.message,
            },
            _ => AgentError::Platform(err),
        }
    }
}

/// Result type for agent operations
pub type Result<T> = std::result::Result<T, AgentError>;
