//! Session Manager - login, web session, expiry recovery and forced relogin

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::agent::TradeAgent;
use crate::error::{AgentError, PlatformError, Result};
use crate::events::AgentEvent;
use crate::platform::{Cookies, LogonDetails, LogonRequest, SteamId};

/// Logon id sent with every logon request
pub const LOGON_ID: u32 = 100;

/// Poll mode handed to the community confirmation checker
pub const CONFIRMATION_POLL_MODE: &str = "identitySecret";

/// Session lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    LoggedOut,
    LoggingIn,
    LoggedIn,
    SessionExpired,
    /// Logout/login pair in progress
    Relogging,
}

impl SessionState {
    /// Whether a login or relogin is already underway
    pub fn is_transitioning(&self) -> bool {
        matches!(self, SessionState::LoggingIn | SessionState::Relogging)
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct SessionData {
    pub(crate) state: SessionState,
    pub(crate) session_id: Option<String>,
    pub(crate) cookies: Option<Cookies>,
    pub(crate) logged_in: bool,
    pub(crate) last_login: Option<DateTime<Utc>>,
    pub(crate) steam_id: Option<SteamId>,
    /// Set once `log_in` has been called; enables relogin from `LoggedOut`
    pub(crate) login_requested: bool,
    pub(crate) transition_started: Option<Instant>,
}

impl SessionData {
    fn begin(&mut self, state: SessionState) {
        self.state = state;
        self.transition_started = Some(Instant::now());
    }

    fn settle(&mut self, state: SessionState) {
        self.state = state;
        self.transition_started = None;
    }

    /// A login or relogin that started less than `stale_after` ago
    pub(crate) fn transition_in_progress(&self, stale_after: Duration) -> bool {
        self.state.is_transitioning()
            && self
                .transition_started
                .map_or(false, |started| started.elapsed() < stale_after)
    }
}

/// Point-in-time view of the session
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionStatus {
    pub state: SessionState,
    pub logged_in: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub steam_id: Option<SteamId>,
    pub has_session: bool,
    pub busy: bool,
}

impl TradeAgent {
    /// Submit a logon request
    ///
    /// Completion is signalled by `AgentEvent::LoggedOn` and, once the web
    /// session arrives, `AgentEvent::LoggedIn`.
    pub async fn log_in(&self) -> Result<()> {
        {
            let mut session = self.inner().session.write().await;
            if session.transition_in_progress(self.timings().transition_timeout()) {
                return Err(AgentError::Session(format!(
                    "cannot log in while {:?}",
                    session.state
                )));
            }
            if session.logged_in {
                return Err(AgentError::Session("already logged in".to_string()));
            }
            session.login_requested = true;
            session.begin(SessionState::LoggingIn);
        }

        self.submit_logon().await
    }

    /// Request logoff and wait out the grace delay
    pub async fn log_out(&self) {
        info!("Logging out");
        self.platform().account.log_off().await;
        tokio::time::sleep(self.timings().logout_grace()).await;

        let mut session = self.inner().session.write().await;
        session.logged_in = false;
        if session.state != SessionState::Relogging {
            session.settle(SessionState::LoggedOut);
        }
    }

    pub async fn status(&self) -> SessionStatus {
        let session = self.inner().session.read().await;
        SessionStatus {
            state: session.state,
            logged_in: session.logged_in,
            last_login: session.last_login,
            steam_id: session.steam_id,
            has_session: session.session_id.is_some() && session.cookies.is_some(),
            busy: self.is_busy(),
        }
    }

    pub async fn is_logged_in(&self) -> bool {
        self.inner().session.read().await.logged_in
    }

    /// Build the logon request, injecting a login code when a shared secret is set
    pub(crate) fn logon_request(&self) -> Result<LogonRequest> {
        let credentials = self.credentials();
        let two_factor_code = self.inner().codes.login_code()?;
        if two_factor_code.is_some() {
            self.platform()
                .account
                .set_option("promptSteamGuardCode", false);
        }

        Ok(LogonRequest {
            account_name: credentials.username().to_string(),
            password: credentials.password().to_string(),
            two_factor_code,
            remember_password: true,
            logon_id: LOGON_ID,
        })
    }

    /// Caller has already moved the state to `LoggingIn` or `Relogging`
    async fn submit_logon(&self) -> Result<()> {
        info!("Logging on with {}", self.credentials().username());

        let result = match self.logon_request() {
            Ok(request) => {
                self.inner().session.write().await.begin(SessionState::LoggingIn);
                self.platform()
                    .account
                    .log_on(request)
                    .await
                    .map_err(AgentError::from_logon)
            }
            Err(e) => Err(e),
        };

        if let Err(e) = &result {
            warn!("Logon failed: {}", e);
            let mut session = self.inner().session.write().await;
            session.settle(SessionState::LoggedOut);
            session.logged_in = false;
        }
        result
    }

    pub(crate) async fn handle_logged_on(&self, details: LogonDetails) {
        info!("Logged on as {}", details.steam_id);
        self.inner().session.write().await.steam_id = Some(details.steam_id);

        if let Err(e) = self.platform().account.set_persona_online().await {
            warn!("Failed to set persona online: {}", e);
        }
        self.events().emit(AgentEvent::LoggedOn(details));
    }

    /// Apply a web session; safe to run on every (re)login
    pub(crate) async fn handle_web_session(&self, session_id: String, cookies: Cookies) {
        let mut session = self.inner().session.write().await;
        if session.session_id.as_deref() != Some(session_id.as_str())
            || session.cookies.as_ref() != Some(&cookies)
        {
            debug!("Web session changed");
            session.session_id = Some(session_id);
            session.cookies = Some(cookies.clone());
        }

        if cookies.is_empty() {
            warn!("Web session without cookies, session not applied");
            if session.state.is_transitioning() {
                session.settle(SessionState::LoggedOut);
            }
            return;
        }

        let platform = self.platform();
        platform.community.set_cookies(&cookies);
        platform.trades.set_cookies(&cookies);

        session.logged_in = true;
        session.last_login = Some(Utc::now());
        session.settle(SessionState::LoggedIn);
        drop(session);

        if self.inner().relay.attach(platform, self.events()) {
            debug!("Event relay attached");
        }
        platform
            .community
            .start_confirmation_checker(self.timings().confirmation_poll(), CONFIRMATION_POLL_MODE);

        info!("Logged in with web session");
        self.events().emit(AgentEvent::LoggedIn);
    }

    pub(crate) async fn handle_account_error(&self, err: PlatformError) {
        {
            let mut session = self.inner().session.write().await;
            if session.state == SessionState::LoggingIn {
                session.settle(SessionState::LoggedOut);
            }
        }

        if err.is_invalid_credentials() {
            warn!("Incorrect credentials for {}: {}", self.credentials().username(), err);
            self.events().emit(AgentEvent::IncorrectCredentials(err));
        } else {
            debug!("Account session error: {:?}", err);
            self.events().emit(AgentEvent::Debug(err));
        }
    }

    /// Recover from an expired community session
    pub(crate) fn handle_session_expired(&self, reason: &str) {
        warn!("Community session expired: {}", reason);
        let agent = self.clone();
        tokio::spawn(async move {
            {
                let stale_after = agent.timings().transition_timeout();
                let mut session = agent.inner().session.write().await;
                if !session.transition_in_progress(stale_after) {
                    session.settle(SessionState::SessionExpired);
                }
            }
            if let Err(e) = agent.relogin(true).await {
                debug!("Session expiry recovery skipped: {}", e);
            }
        });
    }

    /// Forced refresh; skipped while offers or confirmations are in flight
    ///
    /// Returns whether a relogin was started.
    pub(crate) async fn idle_relogin_check(&self) -> bool {
        if self.is_busy() {
            debug!("Busy, deferring relogin to the next interval");
            return false;
        }

        {
            let session = self.inner().session.read().await;
            if !session.login_requested
                || session.transition_in_progress(self.timings().transition_timeout())
            {
                debug!("Idle relogin skipped in state {:?}", session.state);
                return false;
            }
        }

        info!("Idle relogin");
        let agent = self.clone();
        tokio::spawn(async move {
            if let Err(e) = agent.relogin(false).await {
                debug!("Idle relogin skipped: {}", e);
            }
        });
        true
    }

    /// Stop the confirmation checker, log out, log back in
    ///
    /// Rejects overlapping triggers while another transition is in progress.
    pub async fn relogin(&self, expired: bool) -> Result<()> {
        {
            let mut session = self.inner().session.write().await;
            if session.transition_in_progress(self.timings().transition_timeout()) {
                return Err(AgentError::Session(format!(
                    "relogin already in progress ({:?})",
                    session.state
                )));
            }
            if session.state.is_transitioning() {
                warn!("Taking over stale {:?}", session.state);
            }
            if !expired && !session.login_requested {
                return Err(AgentError::Session("log_in has not been called".to_string()));
            }
            session.begin(SessionState::Relogging);
        }

        self.platform().community.stop_confirmation_checker();
        self.log_out().await;
        self.submit_logon().await
    }
}
