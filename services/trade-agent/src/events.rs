//! Agent event surface

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{error, info, trace, warn};

use crate::error::PlatformError;
use crate::platform::{LogonDetails, OfferState, SteamId, TradeOffer};

/// Default capacity of the agent event channel
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Events published by the agent
///
/// Consumers depend on these only, never on the collaborators that produced
/// them.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum AgentEvent {
    /// Web session established and cookies applied
    LoggedIn,
    LoggedOn(LogonDetails),
    IncorrectCredentials(PlatformError),
    Debug(PlatformError),
    FriendOrChatMessage {
        sender: SteamId,
        text: String,
        room: Option<SteamId>,
    },
    OfferChanged {
        offer: TradeOffer,
        old_state: OfferState,
    },
    NewOffer(TradeOffer),
    TradeofferSent(String),
    TradeofferSendError(PlatformError),
    Error {
        code: u16,
        msg: String,
    },
}

impl AgentEvent {
    pub fn name(&self) -> &'static str {
        match self {
            AgentEvent::LoggedIn => "loggedIn",
            AgentEvent::LoggedOn(_) => "loggedOn",
            AgentEvent::IncorrectCredentials(_) => "incorrectCredentials",
            AgentEvent::Debug(_) => "debug",
            AgentEvent::FriendOrChatMessage { .. } => "friendOrChatMessage",
            AgentEvent::OfferChanged { .. } => "offerChanged",
            AgentEvent::NewOffer(_) => "newOffer",
            AgentEvent::TradeofferSent(_) => "tradeofferSent",
            AgentEvent::TradeofferSendError(_) => "tradeofferSendError",
            AgentEvent::Error { .. } => "error",
        }
    }
}

/// Fire-and-forget broadcast of agent events
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<AgentEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publish an event; having no subscribers is not an error
    pub fn emit(&self, event: AgentEvent) {
        trace!(event = event.name(), "emit");
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AgentEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(EVENT_CHANNEL_CAPACITY)
    }
}

/// Log every event until the bus closes; returns how many were logged
///
/// A lagging receiver skips the dropped events and keeps going.
pub async fn log_events(mut rx: broadcast::Receiver<AgentEvent>) -> usize {
    let mut logged = 0;
    loop {
        match rx.recv().await {
            Ok(AgentEvent::IncorrectCredentials(e)) => error!("Incorrect credentials: {}", e),
            Ok(AgentEvent::Error { code, msg }) => warn!("Agent error {}: {}", code, msg),
            Ok(other) => info!("Event: {}", other.name()),
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!("Event logger lagged, {} events dropped", n);
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
        logged += 1;
    }
    logged
}
