//! Paper platform - in-memory collaborators for offline runs and tests
//!
//! Behaves like the live platform at the contract level: logons answer with
//! `LoggedOn` and `WebSession` events, sent offers that give items away wait
//! for a mobile confirmation, and accepting that confirmation activates the
//! offer. Failures can be injected per collaborator.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::ManagerOptions;
use crate::error::PlatformError;
use crate::offers::NormalizedItem;
use crate::platform::{
    AccountEvent, AccountSession, CommunityClient, CommunityEvent, Confirmation, Cookies,
    EconItem, LogonDetails, LogonRequest, OfferHandle, OfferState, Platform, PlatformResult,
    SteamId, TradeEvent, TradeOffer, TradeOfferManager,
};

const CHANNEL_CAPACITY: usize = 64;

/// Default account id for the paper bot
pub const PAPER_STEAM_ID: SteamId = SteamId(76561198000000001);

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// All three paper collaborators, wired together
#[derive(Clone)]
pub struct PaperPlatform {
    pub account: Arc<PaperAccount>,
    pub community: Arc<PaperCommunity>,
    pub trades: Arc<PaperTradeManager>,
}

impl PaperPlatform {
    pub fn new() -> Self {
        let confirmations = Arc::new(Mutex::new(Vec::new()));
        Self {
            account: Arc::new(PaperAccount::new(PAPER_STEAM_ID)),
            community: Arc::new(PaperCommunity::new(confirmations.clone())),
            trades: Arc::new(PaperTradeManager::new(PAPER_STEAM_ID, confirmations)),
        }
    }

    pub fn platform(&self) -> Platform {
        Platform {
            account: self.account.clone(),
            community: self.community.clone(),
            trades: self.trades.clone(),
        }
    }
}

impl Default for PaperPlatform {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Account session
// ---------------------------------------------------------------------------

pub struct PaperAccount {
    steam_id: SteamId,
    events: broadcast::Sender<AccountEvent>,
    logons: Mutex<Vec<LogonRequest>>,
    options: Mutex<HashMap<String, bool>>,
    reject_logon: Mutex<Option<PlatformError>>,
    send_cookies: AtomicBool,
    send_web_session: AtomicBool,
    log_offs: AtomicUsize,
    persona_online: AtomicBool,
}

impl PaperAccount {
    pub fn new(steam_id: SteamId) -> Self {
        let (events, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            steam_id,
            events,
            logons: Mutex::new(Vec::new()),
            options: Mutex::new(HashMap::new()),
            reject_logon: Mutex::new(None),
            send_cookies: AtomicBool::new(true),
            send_web_session: AtomicBool::new(true),
            log_offs: AtomicUsize::new(0),
            persona_online: AtomicBool::new(false),
        }
    }

    /// Answer the next logons with an `Error` event instead of a session
    pub fn reject_logons_with(&self, err: Option<PlatformError>) {
        *lock(&self.reject_logon) = err;
    }

    /// Send web sessions without cookies
    pub fn withhold_cookies(&self, withhold: bool) {
        self.send_cookies.store(!withhold, Ordering::SeqCst);
    }

    /// Answer logons with `LoggedOn` only, never a web session
    pub fn withhold_web_sessions(&self, withhold: bool) {
        self.send_web_session.store(!withhold, Ordering::SeqCst);
    }

    pub fn logons(&self) -> Vec<LogonRequest> {
        lock(&self.logons).clone()
    }

    pub fn option(&self, name: &str) -> Option<bool> {
        lock(&self.options).get(name).copied()
    }

    pub fn log_off_count(&self) -> usize {
        self.log_offs.load(Ordering::SeqCst)
    }

    pub fn is_persona_online(&self) -> bool {
        self.persona_online.load(Ordering::SeqCst)
    }

    /// Deliver an inbound chat message
    pub fn push_message(&self, sender: SteamId, text: &str, room: Option<SteamId>) {
        let _ = self.events.send(AccountEvent::FriendOrChatMessage {
            sender,
            text: text.to_string(),
            room,
        });
    }

    pub fn emit(&self, event: AccountEvent) {
        let _ = self.events.send(event);
    }
}

#[async_trait]
impl AccountSession for PaperAccount {
    async fn log_on(&self, request: LogonRequest) -> PlatformResult<()> {
        debug!("Paper logon for {}", request.account_name);
        lock(&self.logons).push(request);

        if let Some(err) = lock(&self.reject_logon).clone() {
            let _ = self.events.send(AccountEvent::Error(err));
            return Ok(());
        }

        let _ = self.events.send(AccountEvent::LoggedOn(LogonDetails {
            steam_id: self.steam_id,
            eresult: 1,
        }));
        if !self.send_web_session.load(Ordering::SeqCst) {
            return Ok(());
        }

        let session_id = Uuid::new_v4().simple().to_string();
        let cookies: Cookies = if self.send_cookies.load(Ordering::SeqCst) {
            vec![
                format!("sessionid={}", session_id),
                format!("steamLoginSecure={}%7C%7C{}", self.steam_id, Uuid::new_v4().simple()),
            ]
        } else {
            Vec::new()
        };
        let _ = self.events.send(AccountEvent::WebSession { session_id, cookies });
        Ok(())
    }

    async fn log_off(&self) {
        self.log_offs.fetch_add(1, Ordering::SeqCst);
        self.persona_online.store(false, Ordering::SeqCst);
    }

    async fn set_persona_online(&self) -> PlatformResult<()> {
        self.persona_online.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn set_option(&self, name: &str, value: bool) {
        lock(&self.options).insert(name.to_string(), value);
    }

    fn subscribe(&self) -> broadcast::Receiver<AccountEvent> {
        self.events.subscribe()
    }
}

// ---------------------------------------------------------------------------
// Community client
// ---------------------------------------------------------------------------

type ConfirmationQueue = Arc<Mutex<Vec<Arc<PaperConfirmation>>>>;

/// One recorded confirmation list fetch
#[derive(Debug, Clone)]
pub struct ConfirmationFetch {
    pub at: Instant,
    pub time: u64,
    pub key: String,
}

pub struct PaperCommunity {
    events: broadcast::Sender<CommunityEvent>,
    cookies: Mutex<Option<Cookies>>,
    checker: Mutex<Option<(Duration, String)>>,
    checker_starts: AtomicUsize,
    checker_stops: AtomicUsize,
    failing_fetches: AtomicUsize,
    fetches: Mutex<Vec<ConfirmationFetch>>,
    confirmations: ConfirmationQueue,
}

impl PaperCommunity {
    fn new(confirmations: ConfirmationQueue) -> Self {
        let (events, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            events,
            cookies: Mutex::new(None),
            checker: Mutex::new(None),
            checker_starts: AtomicUsize::new(0),
            checker_stops: AtomicUsize::new(0),
            failing_fetches: AtomicUsize::new(0),
            fetches: Mutex::new(Vec::new()),
            confirmations,
        }
    }

    /// Fail the next `count` confirmation fetches
    pub fn fail_next_fetches(&self, count: usize) {
        self.failing_fetches.store(count, Ordering::SeqCst);
    }

    pub fn fetches(&self) -> Vec<ConfirmationFetch> {
        lock(&self.fetches).clone()
    }

    pub fn cookies(&self) -> Option<Cookies> {
        lock(&self.cookies).clone()
    }

    /// Active checker interval and poll mode
    pub fn checker(&self) -> Option<(Duration, String)> {
        lock(&self.checker).clone()
    }

    pub fn checker_starts(&self) -> usize {
        self.checker_starts.load(Ordering::SeqCst)
    }

    pub fn checker_stops(&self) -> usize {
        self.checker_stops.load(Ordering::SeqCst)
    }

    /// Queue a confirmation not tied to any offer
    pub fn push_confirmation(&self, fail_respond: bool) -> Arc<PaperConfirmation> {
        let confirmation = Arc::new(PaperConfirmation::new(None, fail_respond));
        lock(&self.confirmations).push(confirmation.clone());
        confirmation
    }

    pub fn pending_confirmations(&self) -> Vec<Arc<PaperConfirmation>> {
        lock(&self.confirmations)
            .iter()
            .filter(|c| !c.is_answered())
            .cloned()
            .collect()
    }

    /// Signal that the web session is no longer valid
    pub fn expire_session(&self, reason: &str) {
        info!("Paper community session expired: {}", reason);
        *lock(&self.cookies) = None;
        let _ = self.events.send(CommunityEvent::SessionExpired(reason.to_string()));
    }
}

#[async_trait]
impl CommunityClient for PaperCommunity {
    fn set_cookies(&self, cookies: &[String]) {
        *lock(&self.cookies) = Some(cookies.to_vec());
    }

    fn start_confirmation_checker(&self, interval: Duration, poll_mode: &str) {
        self.checker_starts.fetch_add(1, Ordering::SeqCst);
        *lock(&self.checker) = Some((interval, poll_mode.to_string()));
    }

    fn stop_confirmation_checker(&self) {
        self.checker_stops.fetch_add(1, Ordering::SeqCst);
        *lock(&self.checker) = None;
    }

    async fn get_confirmations(
        &self,
        time: u64,
        key: &str,
    ) -> PlatformResult<Vec<Arc<dyn Confirmation>>> {
        lock(&self.fetches).push(ConfirmationFetch {
            at: Instant::now(),
            time,
            key: key.to_string(),
        });

        let failing = self
            .failing_fetches
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(PlatformError::new("confirmation list unavailable"));
        }

        if lock(&self.cookies).is_none() {
            return Err(PlatformError::new("Not Logged In"));
        }

        Ok(self
            .pending_confirmations()
            .into_iter()
            .map(|c| c as Arc<dyn Confirmation>)
            .collect())
    }

    fn subscribe(&self) -> broadcast::Receiver<CommunityEvent> {
        self.events.subscribe()
    }
}

/// Mobile confirmation held by the paper community
pub struct PaperConfirmation {
    id: String,
    creator: Option<String>,
    offer: Option<Arc<PaperOffer>>,
    fail_respond: bool,
    responses: Mutex<Vec<(u64, String, bool)>>,
}

impl PaperConfirmation {
    fn new(offer: Option<Arc<PaperOffer>>, fail_respond: bool) -> Self {
        Self {
            id: Uuid::new_v4().simple().to_string(),
            creator: offer.as_ref().and_then(|o| o.id()),
            offer,
            fail_respond,
            responses: Mutex::new(Vec::new()),
        }
    }

    /// Recorded `(time, key, accept)` responses
    pub fn responses(&self) -> Vec<(u64, String, bool)> {
        lock(&self.responses).clone()
    }

    pub fn is_answered(&self) -> bool {
        !self.fail_respond && !lock(&self.responses).is_empty()
    }
}

#[async_trait]
impl Confirmation for PaperConfirmation {
    fn id(&self) -> &str {
        &self.id
    }

    fn creator(&self) -> Option<&str> {
        self.creator.as_deref()
    }

    async fn respond(&self, time: u64, key: &str, accept: bool) -> PlatformResult<()> {
        lock(&self.responses).push((time, key.to_string(), accept));
        if self.fail_respond {
            return Err(PlatformError::new("Could not act on confirmation"));
        }

        if let Some(offer) = &self.offer {
            let next = if accept {
                OfferState::Active
            } else {
                OfferState::CanceledBySecondFactor
            };
            offer.transition(next);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Trade offer manager
// ---------------------------------------------------------------------------

struct OfferBook {
    own_id: SteamId,
    events: broadcast::Sender<TradeEvent>,
    offers: Mutex<HashMap<String, Arc<PaperOffer>>>,
    /// Unsent offers are dropped with their last handle
    created: Mutex<Vec<Weak<PaperOffer>>>,
    confirmations: ConfirmationQueue,
    next_id: AtomicU64,
    fail_sends: AtomicBool,
}

pub struct PaperTradeManager {
    book: Arc<OfferBook>,
    options: Mutex<Option<ManagerOptions>>,
    cookies: Mutex<Option<Cookies>>,
    inventories: Mutex<HashMap<SteamId, Vec<EconItem>>>,
}

impl PaperTradeManager {
    fn new(own_id: SteamId, confirmations: ConfirmationQueue) -> Self {
        let (events, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            book: Arc::new(OfferBook {
                own_id,
                events,
                offers: Mutex::new(HashMap::new()),
                created: Mutex::new(Vec::new()),
                confirmations,
                next_id: AtomicU64::new(4_000_000_000),
                fail_sends: AtomicBool::new(false),
            }),
            options: Mutex::new(None),
            cookies: Mutex::new(None),
            inventories: Mutex::new(HashMap::new()),
        }
    }

    pub fn set_inventory(&self, owner: SteamId, items: Vec<EconItem>) {
        lock(&self.inventories).insert(owner, items);
    }

    /// Own inventory, keyed by the paper bot's id
    pub fn set_own_inventory(&self, items: Vec<EconItem>) {
        self.set_inventory(self.book.own_id, items);
    }

    pub fn options(&self) -> Option<ManagerOptions> {
        lock(&self.options).clone()
    }

    pub fn fail_sends(&self, fail: bool) {
        self.book.fail_sends.store(fail, Ordering::SeqCst);
    }

    pub fn cookies(&self) -> Option<Cookies> {
        lock(&self.cookies).clone()
    }

    /// Live offers created through `create_offer`, sent or not
    pub fn created_offers(&self) -> Vec<Arc<PaperOffer>> {
        lock(&self.book.created)
            .iter()
            .filter_map(Weak::upgrade)
            .collect()
    }

    /// Deliver an incoming offer from `partner`
    pub fn receive_offer(
        &self,
        partner: SteamId,
        items_to_give: Vec<NormalizedItem>,
        items_to_receive: Vec<NormalizedItem>,
        message: &str,
    ) -> Arc<PaperOffer> {
        let offer = PaperOffer::new(&self.book, partner, None, false);
        {
            let mut data = lock(&offer.data);
            data.items_to_give = items_to_give;
            data.items_to_receive = items_to_receive;
            data.message = message.to_string();
            data.state = OfferState::Active;
        }
        let id = self.book.register(&offer);
        debug!("Paper offer {} received from {}", id, partner);
        let _ = self.book.events.send(TradeEvent::NewOffer(offer.snapshot()));
        offer
    }

    /// Force a state change, as the counterpart accepting or declining would
    pub fn update_offer_state(&self, id: &str, state: OfferState) -> bool {
        match lock(&self.book.offers).get(id).cloned() {
            Some(offer) => {
                offer.transition(state);
                true
            }
            None => false,
        }
    }
}

impl OfferBook {
    fn register(&self, offer: &Arc<PaperOffer>) -> String {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst).to_string();
        *lock(&offer.id) = Some(id.clone());
        lock(&self.offers).insert(id.clone(), offer.clone());
        id
    }
}

#[async_trait]
impl TradeOfferManager for PaperTradeManager {
    fn configure(&self, options: &ManagerOptions) {
        debug!(
            "Paper manager: cancel after {}ms, poll every {}ms",
            options.cancel_time_ms(),
            options.poll_interval_ms()
        );
        *lock(&self.options) = Some(options.clone());
    }

    fn set_cookies(&self, cookies: &[String]) {
        *lock(&self.cookies) = Some(cookies.to_vec());
    }

    fn create_offer(&self, recipient: SteamId, token: Option<&str>) -> Arc<dyn OfferHandle> {
        let offer = PaperOffer::new(&self.book, recipient, token.map(str::to_string), true);
        let mut created = lock(&self.book.created);
        created.retain(|o| o.strong_count() > 0);
        created.push(Arc::downgrade(&offer));
        offer
    }

    async fn load_inventory(
        &self,
        appid: u32,
        contextid: &str,
        tradable_only: bool,
    ) -> PlatformResult<Vec<EconItem>> {
        self.load_user_inventory(self.book.own_id, appid, contextid, tradable_only)
            .await
    }

    async fn load_user_inventory(
        &self,
        steam_id: SteamId,
        appid: u32,
        contextid: &str,
        tradable_only: bool,
    ) -> PlatformResult<Vec<EconItem>> {
        let inventories = lock(&self.inventories);
        let items = inventories
            .get(&steam_id)
            .ok_or_else(|| PlatformError::with_eresult(15, "This profile is private."))?;

        Ok(items
            .iter()
            .filter(|i| i.appid == appid && i.contextid == contextid)
            .filter(|i| !tradable_only || i.tradable)
            .cloned()
            .collect())
    }

    async fn get_offer(&self, id: &str) -> PlatformResult<Arc<dyn OfferHandle>> {
        lock(&self.book.offers)
            .get(id)
            .cloned()
            .map(|o| o as Arc<dyn OfferHandle>)
            .ok_or_else(|| PlatformError::with_eresult(9, format!("No offer {}", id)))
    }

    fn subscribe(&self) -> broadcast::Receiver<TradeEvent> {
        self.book.events.subscribe()
    }
}

#[derive(Debug, Clone)]
struct OfferData {
    state: OfferState,
    message: String,
    items_to_give: Vec<NormalizedItem>,
    items_to_receive: Vec<NormalizedItem>,
}

/// Trade offer held by the paper manager
pub struct PaperOffer {
    book: Weak<OfferBook>,
    this: Weak<PaperOffer>,
    id: Mutex<Option<String>>,
    partner: SteamId,
    token: Option<String>,
    is_our_offer: bool,
    data: Mutex<OfferData>,
}

impl PaperOffer {
    fn new(
        book: &Arc<OfferBook>,
        partner: SteamId,
        token: Option<String>,
        is_our_offer: bool,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            book: Arc::downgrade(book),
            this: this.clone(),
            id: Mutex::new(None),
            partner,
            token,
            is_our_offer,
            data: Mutex::new(OfferData {
                state: OfferState::Invalid,
                message: String::new(),
                items_to_give: Vec::new(),
                items_to_receive: Vec::new(),
            }),
        })
    }

    fn book(&self) -> PlatformResult<Arc<OfferBook>> {
        self.book
            .upgrade()
            .ok_or_else(|| PlatformError::new("Trade offer manager is gone"))
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn state(&self) -> OfferState {
        lock(&self.data).state
    }

    fn transition(&self, next: OfferState) {
        let old_state = {
            let mut data = lock(&self.data);
            std::mem::replace(&mut data.state, next)
        };
        if old_state == next {
            return;
        }

        let Some(book) = self.book.upgrade() else {
            return;
        };
        let offer = self.snapshot();
        let event = if self.is_our_offer {
            TradeEvent::SentOfferChanged { offer, old_state }
        } else {
            TradeEvent::ReceivedOfferChanged { offer, old_state }
        };
        let _ = book.events.send(event);
    }
}

#[async_trait]
impl OfferHandle for PaperOffer {
    fn id(&self) -> Option<String> {
        lock(&self.id).clone()
    }

    fn add_my_items(&self, items: Vec<NormalizedItem>) {
        lock(&self.data).items_to_give.extend(items);
    }

    fn add_their_items(&self, items: Vec<NormalizedItem>) {
        lock(&self.data).items_to_receive.extend(items);
    }

    fn set_message(&self, message: &str) {
        lock(&self.data).message = message.to_string();
    }

    fn snapshot(&self) -> TradeOffer {
        let data = lock(&self.data).clone();
        TradeOffer {
            id: self.id(),
            partner: self.partner,
            state: data.state,
            message: data.message,
            items_to_give: data.items_to_give,
            items_to_receive: data.items_to_receive,
            is_our_offer: self.is_our_offer,
        }
    }

    async fn send(&self) -> PlatformResult<String> {
        if self.id().is_some() {
            return Err(PlatformError::new("This offer has already been sent"));
        }
        let book = self.book()?;
        if book.fail_sends.load(Ordering::SeqCst) {
            return Err(PlatformError::with_eresult(16, "Timeout"));
        }

        let needs_confirmation = {
            let data = lock(&self.data);
            if data.items_to_give.is_empty() && data.items_to_receive.is_empty() {
                return Err(PlatformError::new("Cannot send an empty trade offer"));
            }
            !data.items_to_give.is_empty()
        };

        let offer = self
            .this
            .upgrade()
            .ok_or_else(|| PlatformError::new("Offer handle was dropped"))?;
        let id = book.register(&offer);

        let status = if needs_confirmation {
            lock(&self.data).state = OfferState::CreatedNeedsConfirmation;
            lock(&book.confirmations)
                .push(Arc::new(PaperConfirmation::new(Some(offer), false)));
            "pending"
        } else {
            lock(&self.data).state = OfferState::Active;
            "sent"
        };
        debug!("Paper offer {} sent ({})", id, status);
        Ok(status.to_string())
    }

    async fn cancel(&self) -> PlatformResult<()> {
        if self.id().is_none() {
            return Err(PlatformError::new("Cannot cancel an unsent offer"));
        }
        let state = self.state();
        if state.is_final() {
            return Err(PlatformError::with_eresult(
                11,
                format!("Offer is {} and cannot be cancelled", state),
            ));
        }

        self.transition(if self.is_our_offer {
            OfferState::Canceled
        } else {
            OfferState::Declined
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(assetid: &str) -> NormalizedItem {
        NormalizedItem {
            appid: 730,
            contextid: "2".to_string(),
            assetid: assetid.to_string(),
            amount: 1,
        }
    }

    #[tokio::test]
    async fn test_logon_emits_session() {
        let paper = PaperPlatform::new();
        let mut rx = paper.account.subscribe();

        paper
            .account
            .log_on(LogonRequest {
                account_name: "u".to_string(),
                password: "p".to_string(),
                two_factor_code: None,
                remember_password: true,
                logon_id: 100,
            })
            .await
            .unwrap();

        assert!(matches!(rx.recv().await.unwrap(), AccountEvent::LoggedOn(_)));
        match rx.recv().await.unwrap() {
            AccountEvent::WebSession { cookies, .. } => assert_eq!(cookies.len(), 2),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_send_requiring_confirmation() {
        let paper = PaperPlatform::new();
        paper.community.set_cookies(&["sessionid=1".to_string()]);

        let offer = paper.trades.create_offer(SteamId(1), Some("token"));
        offer.add_my_items(vec![item("1")]);
        assert_eq!(offer.send().await.unwrap(), "pending");
        assert_eq!(offer.snapshot().state, OfferState::CreatedNeedsConfirmation);

        let pending = paper.community.get_confirmations(0, "key").await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].creator(), offer.id().as_deref());

        pending[0].respond(0, "allow", true).await.unwrap();
        assert_eq!(offer.snapshot().state, OfferState::Active);
        assert!(paper.community.pending_confirmations().is_empty());
    }

    #[tokio::test]
    async fn test_offers_freed_with_platform() {
        let paper = PaperPlatform::new();

        let unsent = paper.trades.create_offer(SteamId(1), None);
        drop(unsent);
        assert!(paper.trades.created_offers().is_empty());

        let offer = paper.trades.create_offer(SteamId(1), None);
        offer.add_their_items(vec![item("7")]);
        assert_eq!(offer.send().await.unwrap(), "sent");
        let weak = Arc::downgrade(&offer);
        drop(offer);

        // still held by the manager's offer book
        assert!(weak.upgrade().is_some());
        drop(paper);
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn test_cancel_unsent_offer_fails() {
        let paper = PaperPlatform::new();
        let offer = paper.trades.create_offer(SteamId(1), None);
        tokio_test::assert_err!(tokio_test::block_on(offer.cancel()));
    }

    #[tokio::test]
    async fn test_inventory_filters() {
        let paper = PaperPlatform::new();
        paper.trades.set_own_inventory(vec![
            EconItem {
                id: "1".to_string(),
                appid: 730,
                contextid: "2".to_string(),
                classid: "c".to_string(),
                amount: 1,
                name: "Tradable".to_string(),
                tradable: true,
            },
            EconItem {
                id: "2".to_string(),
                appid: 730,
                contextid: "2".to_string(),
                classid: "c".to_string(),
                amount: 1,
                name: "Locked".to_string(),
                tradable: false,
            },
        ]);

        let all = paper.trades.load_inventory(730, "2", false).await.unwrap();
        assert_eq!(all.len(), 2);
        let tradable = paper.trades.load_inventory(730, "2", true).await.unwrap();
        assert_eq!(tradable.len(), 1);
        assert!(paper
            .trades
            .load_user_inventory(SteamId(5), 730, "2", true)
            .await
            .is_err());
    }
}
