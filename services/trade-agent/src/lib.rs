//! Trade Agent Library
//!
//! Automated account agent for the Steam trading platform: keeps an
//! authenticated session alive, relays inbound events, and creates, confirms
//! and cancels trade offers.

pub mod agent;
pub mod busy;
pub mod codes;
pub mod config;
pub mod confirmations;
pub mod error;
pub mod events;
pub mod offers;
pub mod paper;
pub mod platform;
pub mod relay;
pub mod session;


// Re-export main types for convenience
pub use agent::{AgentBuilder, TradeAgent, WeakAgent};
pub use busy::{BusyGuard, BusyTracker};
pub use codes::{ConfirmationCodes, KeyGenerator, SteamGuard};
pub use config::{AgentTimings, Credentials, LoginData, ManagerOptions, Settings, TradeOfferSettings};
pub use confirmations::ConfirmOutcome;
pub use error::{AgentError, PlatformError, Result};
pub use events::{log_events, AgentEvent, EventBus};
pub use offers::{normalize_items, NormalizedItem, OfferSubmission, PendingOffer, TradeItem};
pub use paper::PaperPlatform;
pub use platform::{
    AccountEvent, AccountSession, CommunityClient, CommunityEvent, Confirmation, EconItem,
    LogonDetails, LogonRequest, OfferHandle, OfferState, Platform, SteamId, TradeEvent,
    TradeOffer, TradeOfferManager,
};
pub use session::{SessionState, SessionStatus};
