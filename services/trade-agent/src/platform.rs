//! Platform collaborator contracts
//!
//! The agent never talks to the network itself. It drives these traits and
//! listens to the event streams they expose; `crate::paper` provides an
//! in-memory implementation of all of them.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

use crate::config::ManagerOptions;
use crate::error::PlatformError;
use crate::offers::NormalizedItem;

/// Result type for collaborator calls
pub type PlatformResult<T> = std::result::Result<T, PlatformError>;

/// 64-bit account identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SteamId(pub u64);

impl fmt::Display for SteamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SteamId {
    type Err = PlatformError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u64>()
            .map(SteamId)
            .map_err(|e| PlatformError::new(format!("Invalid SteamID '{}': {}", s, e)))
    }
}

/// Session cookies as `name=value` pairs
pub type Cookies = Vec<String>;

/// Logon request sent to the account session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogonRequest {
    pub account_name: String,
    pub password: String,
    pub two_factor_code: Option<String>,
    pub remember_password: bool,
    pub logon_id: u32,
}

/// Details delivered with a successful logon
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogonDetails {
    pub steam_id: SteamId,
    pub eresult: i32,
}

/// Trade offer state as reported by the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfferState {
    Invalid,
    Active,
    Accepted,
    Countered,
    Expired,
    Canceled,
    Declined,
    InvalidItems,
    CreatedNeedsConfirmation,
    CanceledBySecondFactor,
    InEscrow,
}

impl OfferState {
    /// Whether the offer can no longer change
    pub fn is_final(&self) -> bool {
        !matches!(
            self,
            OfferState::Active | OfferState::CreatedNeedsConfirmation | OfferState::InEscrow
        )
    }
}

impl fmt::Display for OfferState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OfferState::Invalid => "invalid",
            OfferState::Active => "active",
            OfferState::Accepted => "accepted",
            OfferState::Countered => "countered",
            OfferState::Expired => "expired",
            OfferState::Canceled => "canceled",
            OfferState::Declined => "declined",
            OfferState::InvalidItems => "invalid_items",
            OfferState::CreatedNeedsConfirmation => "created_needs_confirmation",
            OfferState::CanceledBySecondFactor => "canceled_by_second_factor",
            OfferState::InEscrow => "in_escrow",
        };
        write!(f, "{}", s)
    }
}

/// Point-in-time view of a trade offer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeOffer {
    /// Platform id, assigned once the offer has been sent
    pub id: Option<String>,
    pub partner: SteamId,
    pub state: OfferState,
    pub message: String,
    pub items_to_give: Vec<NormalizedItem>,
    pub items_to_receive: Vec<NormalizedItem>,
    pub is_our_offer: bool,
}

/// Item held in an inventory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EconItem {
    pub id: String,
    pub appid: u32,
    pub contextid: String,
    pub classid: String,
    pub amount: u64,
    pub name: String,
    pub tradable: bool,
}

/// Events from the account session
#[derive(Debug, Clone)]
pub enum AccountEvent {
    WebSession { session_id: String, cookies: Cookies },
    LoggedOn(LogonDetails),
    Error(PlatformError),
    FriendOrChatMessage { sender: SteamId, text: String, room: Option<SteamId> },
}

/// Events from the community web client
#[derive(Debug, Clone)]
pub enum CommunityEvent {
    SessionExpired(String),
}

/// Events from the trade offer manager
#[derive(Debug, Clone)]
pub enum TradeEvent {
    SentOfferChanged { offer: TradeOffer, old_state: OfferState },
    ReceivedOfferChanged { offer: TradeOffer, old_state: OfferState },
    NewOffer(TradeOffer),
}

/// Account session protocol (logon, persona, web session)
#[async_trait]
pub trait AccountSession: Send + Sync {
    async fn log_on(&self, request: LogonRequest) -> PlatformResult<()>;

    async fn log_off(&self);

    async fn set_persona_online(&self) -> PlatformResult<()>;

    fn set_option(&self, name: &str, value: bool);

    fn subscribe(&self) -> broadcast::Receiver<AccountEvent>;
}

/// Pending mobile confirmation
#[async_trait]
pub trait Confirmation: Send + Sync {
    fn id(&self) -> &str;

    /// Offer id this confirmation finalizes, if any
    fn creator(&self) -> Option<&str>;

    async fn respond(&self, time: u64, key: &str, accept: bool) -> PlatformResult<()>;
}

/// Community web client (cookies, confirmations)
#[async_trait]
pub trait CommunityClient: Send + Sync {
    fn set_cookies(&self, cookies: &[String]);

    fn start_confirmation_checker(&self, interval: Duration, poll_mode: &str);

    fn stop_confirmation_checker(&self);

    async fn get_confirmations(
        &self,
        time: u64,
        key: &str,
    ) -> PlatformResult<Vec<Arc<dyn Confirmation>>>;

    fn subscribe(&self) -> broadcast::Receiver<CommunityEvent>;
}

/// Draft or sent trade offer
#[async_trait]
pub trait OfferHandle: Send + Sync {
    fn id(&self) -> Option<String>;

    fn add_my_items(&self, items: Vec<NormalizedItem>);

    fn add_their_items(&self, items: Vec<NormalizedItem>);

    fn set_message(&self, message: &str);

    fn snapshot(&self) -> TradeOffer;

    /// Submit the offer; returns the platform status string
    async fn send(&self) -> PlatformResult<String>;

    async fn cancel(&self) -> PlatformResult<()>;
}

/// Trade offer manager
#[async_trait]
pub trait TradeOfferManager: Send + Sync {
    /// Apply construction options (cancel timers, poll interval, language)
    fn configure(&self, options: &ManagerOptions);

    fn set_cookies(&self, cookies: &[String]);

    fn create_offer(&self, recipient: SteamId, token: Option<&str>) -> Arc<dyn OfferHandle>;

    async fn load_inventory(
        &self,
        appid: u32,
        contextid: &str,
        tradable_only: bool,
    ) -> PlatformResult<Vec<EconItem>>;

    async fn load_user_inventory(
        &self,
        steam_id: SteamId,
        appid: u32,
        contextid: &str,
        tradable_only: bool,
    ) -> PlatformResult<Vec<EconItem>>;

    async fn get_offer(&self, id: &str) -> PlatformResult<Arc<dyn OfferHandle>>;

    fn subscribe(&self) -> broadcast::Receiver<TradeEvent>;
}

/// The three collaborators an agent owns for its lifetime
#[derive(Clone)]
pub struct Platform {
    pub account: Arc<dyn AccountSession>,
    pub community: Arc<dyn CommunityClient>,
    pub trades: Arc<dyn TradeOfferManager>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_steam_id_parse() {
        let id: SteamId = "76561198000000000".parse().unwrap();
        assert_eq!(id, SteamId(76561198000000000));
        assert_eq!(id.to_string(), "76561198000000000");
        assert!("abc".parse::<SteamId>().is_err());
    }

    #[test]
    fn test_offer_state_finality() {
        assert!(!OfferState::Active.is_final());
        assert!(!OfferState::CreatedNeedsConfirmation.is_final());
        assert!(OfferState::Accepted.is_final());
        assert!(OfferState::Canceled.is_final());
    }
}
