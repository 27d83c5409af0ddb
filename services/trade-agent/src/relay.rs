//! Event Relay - forwards collaborator events onto the agent's event bus

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::events::{AgentEvent, EventBus};
use crate::platform::{AccountEvent, Platform, TradeEvent};

/// Relay tasks attached to the collaborators
///
/// Attached at most once; repeated web sessions reuse the running relay.
#[derive(Debug, Default)]
pub struct EventRelay {
    attached: AtomicBool,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl EventRelay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_attached(&self) -> bool {
        self.attached.load(Ordering::SeqCst)
    }

    /// Start relaying; returns false if already attached
    pub fn attach(&self, platform: &Platform, events: &EventBus) -> bool {
        if self
            .attached
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return false;
        }

        let account = tokio::spawn(relay_account(platform.account.subscribe(), events.clone()));
        let trades = tokio::spawn(relay_trades(platform.trades.subscribe(), events.clone()));

        self.lock_tasks().extend([account, trades]);
        true
    }

    /// Stop relaying; a later `attach` starts fresh
    pub fn detach(&self) {
        for task in self.lock_tasks().drain(..) {
            task.abort();
        }
        self.attached.store(false, Ordering::SeqCst);
    }

    fn lock_tasks(&self) -> std::sync::MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.tasks.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for EventRelay {
    fn drop(&mut self) {
        self.detach();
    }
}

async fn relay_account(mut rx: broadcast::Receiver<AccountEvent>, events: EventBus) {
    loop {
        match rx.recv().await {
            Ok(AccountEvent::FriendOrChatMessage { sender, text, room }) => {
                debug!("Message from {}", sender);
                events.emit(AgentEvent::FriendOrChatMessage { sender, text, room });
            }
            Ok(_) => {}
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!("Message relay lagged, {} events dropped", n);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

async fn relay_trades(mut rx: broadcast::Receiver<TradeEvent>, events: EventBus) {
    loop {
        match rx.recv().await {
            Ok(TradeEvent::SentOfferChanged { offer, old_state })
            | Ok(TradeEvent::ReceivedOfferChanged { offer, old_state }) => {
                debug!("Offer {:?} {} -> {}", offer.id, old_state, offer.state);
                events.emit(AgentEvent::OfferChanged { offer, old_state });
            }
            Ok(TradeEvent::NewOffer(offer)) => {
                events.emit(AgentEvent::NewOffer(offer));
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!("Offer relay lagged, {} events dropped", n);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
