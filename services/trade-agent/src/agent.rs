//! Trade Agent - root entity and event/timer loop

use std::future::Future;
use std::sync::{Arc, Mutex, Weak};
use tokio::sync::{broadcast, RwLock};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::busy::BusyTracker;
use crate::codes::{ConfirmationCodes, KeyGenerator, SteamGuard};
use crate::config::{AgentTimings, Credentials, LoginData, Settings, TradeOfferSettings};
use crate::error::{AgentError, Result};
use crate::events::{AgentEvent, EventBus};
use crate::platform::{AccountEvent, CommunityEvent, Platform};
use crate::relay::EventRelay;
use crate::session::SessionData;

pub(crate) struct AgentInner {
    pub(crate) credentials: Credentials,
    pub(crate) platform: Platform,
    pub(crate) codes: ConfirmationCodes,
    pub(crate) trade_offers: TradeOfferSettings,
    pub(crate) timings: AgentTimings,
    pub(crate) busy: BusyTracker,
    pub(crate) events: EventBus,
    pub(crate) session: RwLock<SessionData>,
    pub(crate) relay: EventRelay,
    receivers: Mutex<Option<Receivers>>,
}

/// Collaborator streams consumed by `TradeAgent::run`
struct Receivers {
    account: broadcast::Receiver<AccountEvent>,
    community: broadcast::Receiver<CommunityEvent>,
}

/// Automated account agent
///
/// Cheap to clone; all clones share the same session, busy tracker and event
/// bus.
#[derive(Clone)]
pub struct TradeAgent {
    inner: Arc<AgentInner>,
}

/// Non-owning reference used by deferred work
#[derive(Clone)]
pub struct WeakAgent {
    inner: Weak<AgentInner>,
}

impl WeakAgent {
    pub fn upgrade(&self) -> Option<TradeAgent> {
        self.inner.upgrade().map(|inner| TradeAgent { inner })
    }
}

/// Builder for `TradeAgent`
pub struct AgentBuilder {
    credentials: Credentials,
    platform: Platform,
    trade_offers: TradeOfferSettings,
    timings: AgentTimings,
    key_generator: Arc<dyn KeyGenerator>,
}

impl AgentBuilder {
    pub fn trade_offers(mut self, settings: TradeOfferSettings) -> Self {
        self.trade_offers = settings;
        self
    }

    pub fn timings(mut self, timings: AgentTimings) -> Self {
        self.timings = timings;
        self
    }

    pub fn key_generator(mut self, generator: Arc<dyn KeyGenerator>) -> Self {
        self.key_generator = generator;
        self
    }

    pub fn build(self) -> TradeAgent {
        self.platform
            .trades
            .configure(&self.trade_offers.manager_options());
        let receivers = Receivers {
            account: self.platform.account.subscribe(),
            community: self.platform.community.subscribe(),
        };
        let codes = ConfirmationCodes::new(self.key_generator, &self.credentials);

        TradeAgent {
            inner: Arc::new(AgentInner {
                credentials: self.credentials,
                platform: self.platform,
                codes,
                trade_offers: self.trade_offers,
                timings: self.timings,
                busy: BusyTracker::new(),
                events: EventBus::default(),
                session: RwLock::new(SessionData::default()),
                relay: EventRelay::new(),
                receivers: Mutex::new(Some(receivers)),
            }),
        }
    }
}

impl TradeAgent {
    pub fn builder(credentials: Credentials, platform: Platform) -> AgentBuilder {
        AgentBuilder {
            credentials,
            platform,
            trade_offers: TradeOfferSettings::default(),
            timings: AgentTimings::default(),
            key_generator: Arc::new(SteamGuard::new()),
        }
    }

    /// Validate login data and build an agent with default settings
    pub fn new(login_data: LoginData, platform: Platform) -> Result<Self> {
        let credentials = Credentials::from_login_data(login_data)?;
        Ok(Self::builder(credentials, platform).build())
    }

    /// Build an agent from loaded settings
    pub fn from_settings(settings: &Settings, platform: Platform) -> Result<Self> {
        Ok(Self::builder(settings.credentials()?, platform)
            .trade_offers(settings.trade_offers)
            .timings(settings.timings)
            .build())
    }

    pub fn downgrade(&self) -> WeakAgent {
        WeakAgent {
            inner: Arc::downgrade(&self.inner),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AgentEvent> {
        self.inner.events.subscribe()
    }

    pub fn is_busy(&self) -> bool {
        self.inner.busy.is_busy()
    }

    pub fn credentials(&self) -> &Credentials {
        &self.inner.credentials
    }

    pub fn timings(&self) -> &AgentTimings {
        &self.inner.timings
    }

    pub(crate) fn inner(&self) -> &AgentInner {
        &self.inner
    }

    pub(crate) fn busy(&self) -> &BusyTracker {
        &self.inner.busy
    }

    pub(crate) fn platform(&self) -> &Platform {
        &self.inner.platform
    }

    pub(crate) fn events(&self) -> &EventBus {
        &self.inner.events
    }

    /// Drive collaborator events and the session timers until `shutdown` resolves
    ///
    /// Start this before calling `log_in` so no session event is missed. Only
    /// one `run` may be active per agent.
    pub async fn run<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let receivers = self
            .inner
            .receivers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
            .ok_or_else(|| AgentError::Session("agent loop is already running".to_string()))?;
        let Receivers {
            mut account,
            mut community,
        } = receivers;

        let timings = self.inner.timings;
        info!(
            "Agent loop starting (busy decay {:?}, relogin every {:?})",
            timings.busy_decay(),
            timings.relogin_interval()
        );

        let mut decay_interval = interval_at(
            Instant::now() + timings.busy_decay(),
            timings.busy_decay(),
        );
        decay_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut relogin_interval = interval_at(
            Instant::now() + timings.relogin_interval(),
            timings.relogin_interval(),
        );
        relogin_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut community_open = true;
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Agent loop shutting down");
                    break;
                }
                event = account.recv() => match event {
                    Ok(event) => self.handle_account_event(event).await,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("Account event stream lagged, {} events dropped", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        error!("Account session closed its event stream");
                        break;
                    }
                },
                event = community.recv(), if community_open => match event {
                    Ok(CommunityEvent::SessionExpired(reason)) => {
                        self.handle_session_expired(&reason);
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("Community event stream lagged, {} events dropped", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        warn!("Community client closed its event stream");
                        community_open = false;
                    }
                },
                _ = decay_interval.tick() => {
                    if self.inner.busy.decay() {
                        debug!("Busy flag cleared by watchdog");
                    }
                }
                _ = relogin_interval.tick() => {
                    self.idle_relogin_check().await;
                }
            }
        }

        self.inner.relay.detach();
        Ok(())
    }

    async fn handle_account_event(&self, event: AccountEvent) {
        match event {
            AccountEvent::WebSession {
                session_id,
                cookies,
            } => self.handle_web_session(session_id, cookies).await,
            AccountEvent::LoggedOn(details) => self.handle_logged_on(details).await,
            AccountEvent::Error(err) => self.handle_account_error(err).await,
            // relayed by EventRelay once a session exists
            AccountEvent::FriendOrChatMessage { .. } => {}
        }
    }
}
