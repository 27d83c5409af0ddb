//! Agent Configuration

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;

use crate::error::{AgentError, Result};

/// Environment variable prefix for settings overrides (`TRADE_AGENT__ACCOUNT__USERNAME`)
pub const ENV_PREFIX: &str = "TRADE_AGENT";

/// Raw login data as supplied by the operator
///
/// Every field is optional here; `Credentials::from_login_data` decides what is
/// required.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LoginData {
    pub username: Option<String>,
    pub password: Option<String>,
    pub shared_secret: Option<String>,
    pub identity_secret: Option<String>,
}

/// Validated account credentials
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    username: String,
    password: String,
    shared_secret: Option<String>,
    identity_secret: Option<String>,
}

impl Credentials {
    /// Build credentials, failing fast when username or password is missing
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self> {
        let username = username.into();
        let password = password.into();

        if username.trim().is_empty() || password.is_empty() {
            return Err(AgentError::Config(
                "username and password are required in login data".to_string(),
            ));
        }

        Ok(Self {
            username,
            password,
            shared_secret: None,
            identity_secret: None,
        })
    }

    /// Validate operator-supplied login data
    pub fn from_login_data(data: LoginData) -> Result<Self> {
        let (username, password) = match (data.username, data.password) {
            (Some(username), Some(password)) => (username, password),
            _ => {
                return Err(AgentError::Config(
                    "username and password are required in login data".to_string(),
                ))
            }
        };

        let mut credentials = Self::new(username, password)?;
        credentials.shared_secret = data.shared_secret.filter(|s| !s.is_empty());
        credentials.identity_secret = data.identity_secret.filter(|s| !s.is_empty());
        Ok(credentials)
    }

    pub fn with_shared_secret(mut self, secret: impl Into<String>) -> Self {
        self.shared_secret = Some(secret.into());
        self
    }

    pub fn with_identity_secret(mut self, secret: impl Into<String>) -> Self {
        self.identity_secret = Some(secret.into());
        self
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn shared_secret(&self) -> Option<&str> {
        self.shared_secret.as_deref()
    }

    pub fn identity_secret(&self) -> Option<&str> {
        self.identity_secret.as_deref()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("shared_secret", &self.shared_secret.as_ref().map(|_| "<redacted>"))
            .field("identity_secret", &self.identity_secret.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Trade offer manager settings, in seconds
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq)]
pub struct TradeOfferSettings {
    /// Cancel sent offers not acted on within this many seconds
    #[serde(default = "default_cancel_time_seconds")]
    pub cancel_time_seconds: u64,
    /// Cancel offers still pending mobile confirmation after this many seconds
    #[serde(default = "default_pending_cancel_time_seconds")]
    pub pending_cancel_time_seconds: u64,
    /// Outstanding offer count at which the oldest are cancelled
    #[serde(default = "default_cancel_outdated_count")]
    pub cancel_outdated_count: u64,
    /// Minimum age of an offer before the outstanding-count rule may cancel it
    #[serde(default = "default_cancel_if_threshold_seconds")]
    pub cancel_if_threshold_seconds: u64,
    /// Offer poll interval
    #[serde(default = "default_check_interval_seconds")]
    pub check_interval_seconds: u64,
    /// Delay before re-fetching confirmations after a failed fetch
    #[serde(default = "default_confirmations_retry_timeout_seconds")]
    pub confirmations_retry_timeout_seconds: u64,
}

impl Default for TradeOfferSettings {
    fn default() -> Self {
        Self {
            cancel_time_seconds: default_cancel_time_seconds(),
            pending_cancel_time_seconds: default_pending_cancel_time_seconds(),
            cancel_outdated_count: default_cancel_outdated_count(),
            cancel_if_threshold_seconds: default_cancel_if_threshold_seconds(),
            check_interval_seconds: default_check_interval_seconds(),
            confirmations_retry_timeout_seconds: default_confirmations_retry_timeout_seconds(),
        }
    }
}

impl TradeOfferSettings {
    /// Options handed to the trade offer manager at construction
    pub fn manager_options(&self) -> ManagerOptions {
        ManagerOptions {
            cancel_time: Duration::from_secs(self.cancel_time_seconds),
            pending_cancel_time: Duration::from_secs(self.pending_cancel_time_seconds),
            cancel_offer_count: self.cancel_outdated_count,
            cancel_offer_count_min_age: Duration::from_secs(self.cancel_if_threshold_seconds),
            poll_interval: Duration::from_secs(self.check_interval_seconds),
            language: "en".to_string(),
        }
    }

    pub fn confirmation_retry_delay(&self) -> Duration {
        Duration::from_secs(self.confirmations_retry_timeout_seconds)
    }
}

/// Trade offer manager construction options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagerOptions {
    pub cancel_time: Duration,
    pub pending_cancel_time: Duration,
    pub cancel_offer_count: u64,
    pub cancel_offer_count_min_age: Duration,
    pub poll_interval: Duration,
    pub language: String,
}

impl ManagerOptions {
    pub fn cancel_time_ms(&self) -> u128 {
        self.cancel_time.as_millis()
    }

    pub fn poll_interval_ms(&self) -> u128 {
        self.poll_interval.as_millis()
    }
}

/// Session timer periods
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq)]
pub struct AgentTimings {
    /// Confirmation checker poll period on the community client
    #[serde(default = "default_confirmation_poll_secs")]
    pub confirmation_poll_secs: u64,
    /// Busy watchdog period
    #[serde(default = "default_busy_decay_secs")]
    pub busy_decay_secs: u64,
    /// Forced relogin period
    #[serde(default = "default_relogin_interval_secs")]
    pub relogin_interval_secs: u64,
    /// Grace delay after requesting logoff
    #[serde(default = "default_logout_grace_secs")]
    pub logout_grace_secs: u64,
    /// How long a logon may wait for its web session before another
    /// login or relogin may take over
    #[serde(default = "default_login_timeout_secs")]
    pub login_timeout_secs: u64,
}

impl Default for AgentTimings {
    fn default() -> Self {
        Self {
            confirmation_poll_secs: default_confirmation_poll_secs(),
            busy_decay_secs: default_busy_decay_secs(),
            relogin_interval_secs: default_relogin_interval_secs(),
            logout_grace_secs: default_logout_grace_secs(),
            login_timeout_secs: default_login_timeout_secs(),
        }
    }
}

impl AgentTimings {
    pub fn confirmation_poll(&self) -> Duration {
        Duration::from_secs(self.confirmation_poll_secs)
    }

    pub fn busy_decay(&self) -> Duration {
        Duration::from_secs(self.busy_decay_secs)
    }

    pub fn relogin_interval(&self) -> Duration {
        Duration::from_secs(self.relogin_interval_secs)
    }

    pub fn logout_grace(&self) -> Duration {
        Duration::from_secs(self.logout_grace_secs)
    }

    pub fn login_timeout(&self) -> Duration {
        Duration::from_secs(self.login_timeout_secs)
    }

    /// Age after which an unfinished login or relogin counts as stale
    pub fn transition_timeout(&self) -> Duration {
        self.logout_grace() + self.login_timeout()
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct LoggingSettings {
    /// `tracing_subscriber::EnvFilter` directive
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Full agent settings, layered from an optional file and the environment
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Settings {
    #[serde(default)]
    pub account: LoginData,
    #[serde(default)]
    pub trade_offers: TradeOfferSettings,
    #[serde(default)]
    pub timings: AgentTimings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

impl Settings {
    /// Load settings from `path` (if it exists) and `TRADE_AGENT__*` variables
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(false));
        }

        let settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize::<Settings>()?;

        Ok(settings)
    }

    /// Validated credentials from the `account` section
    pub fn credentials(&self) -> Result<Credentials> {
        Credentials::from_login_data(self.account.clone())
    }
}

fn default_cancel_time_seconds() -> u64 { 300 }
fn default_pending_cancel_time_seconds() -> u64 { 120 }
fn default_cancel_outdated_count() -> u64 { 30 }
fn default_cancel_if_threshold_seconds() -> u64 { 600 }
fn default_check_interval_seconds() -> u64 { 10 }
fn default_confirmations_retry_timeout_seconds() -> u64 { 15 }
fn default_confirmation_poll_secs() -> u64 { 30 }
fn default_busy_decay_secs() -> u64 { 50 }
fn default_relogin_interval_secs() -> u64 { 60 * 60 }
fn default_logout_grace_secs() -> u64 { 5 }
fn default_login_timeout_secs() -> u64 { 60 }
fn default_log_level() -> String { "info".to_string() }
