//! End-to-end paper platform test harness
//!
//! Validates the agent's full lifecycle against the in-memory platform:
//! login → web session → offers → confirmations → expiry recovery → relogin

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

use trade_agent::{
    AgentEvent, AgentTimings, ConfirmOutcome, Credentials, EconItem, OfferState, PaperPlatform,
    PlatformError, SessionState, SteamId, TradeAgent, TradeItem, TradeOfferSettings,
};

const IDENTITY: &str = "aWRlbnRpdHktc2VjcmV0";
const PARTNER: SteamId = SteamId(76561198000000042);
const RETRY_DELAY_SECS: u64 = 15;

/// Captures every agent event for later assertions
pub struct EventRecorder {
    events: Arc<Mutex<Vec<(Instant, AgentEvent)>>>,
}

impl EventRecorder {
    pub fn attach(agent: &TradeAgent) -> Self {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let mut rx = agent.subscribe();
        tokio::spawn(async move {
            while let Ok(event) = rx.recv().await {
                sink.lock().unwrap().push((Instant::now(), event));
            }
        });
        Self { events }
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.events.lock().unwrap().iter().map(|(_, e)| e.name()).collect()
    }

    pub fn count(&self, name: &str) -> usize {
        self.names().into_iter().filter(|n| *n == name).count()
    }

    pub fn errors(&self) -> Vec<(u16, String)> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|(_, e)| match e {
                AgentEvent::Error { code, msg } => Some((*code, msg.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn offer_changes(&self) -> Vec<(OfferState, OfferState)> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|(_, e)| match e {
                AgentEvent::OfferChanged { offer, old_state } => Some((*old_state, offer.state)),
                _ => None,
            })
            .collect()
    }
}

fn build_agent(paper: &PaperPlatform) -> TradeAgent {
    let credentials = Credentials::new("bot", "pass")
        .unwrap()
        .with_identity_secret(IDENTITY);
    TradeAgent::builder(credentials, paper.platform())
        .trade_offers(TradeOfferSettings {
            confirmations_retry_timeout_seconds: RETRY_DELAY_SECS,
            ..Default::default()
        })
        .timings(AgentTimings::default())
        .build()
}

fn spawn_loop(agent: &TradeAgent) {
    let runner = agent.clone();
    tokio::spawn(async move { runner.run(std::future::pending::<()>()).await });
}

/// Let spawned tasks and paused timers settle
async fn settle(secs: u64) {
    tokio::time::sleep(Duration::from_secs(secs)).await;
}

async fn logged_in_agent(paper: &PaperPlatform) -> (TradeAgent, EventRecorder) {
    let agent = build_agent(paper);
    let recorder = EventRecorder::attach(&agent);
    spawn_loop(&agent);
    agent.log_in().await.unwrap();
    settle(1).await;
    assert!(agent.is_logged_in().await, "agent did not log in");
    (agent, recorder)
}

#[tokio::test(start_paused = true)]
async fn test_login_emits_logged_on_then_logged_in() {
    let paper = PaperPlatform::new();
    let (_agent, recorder) = logged_in_agent(&paper).await;

    assert_eq!(recorder.names(), vec!["loggedOn", "loggedIn"]);
    assert_eq!(paper.community.checker_starts(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_session_expired_recovers() {
    let paper = PaperPlatform::new();
    let (agent, recorder) = logged_in_agent(&paper).await;

    paper.community.expire_session("cookies rejected");
    // stop checker, log off, 5s grace, log back on
    settle(10).await;

    assert!(agent.is_logged_in().await);
    assert_eq!(paper.community.checker_stops(), 1);
    assert_eq!(paper.account.log_off_count(), 1);
    assert_eq!(paper.account.logons().len(), 2);
    assert!(paper.community.cookies().is_some());
    assert_eq!(paper.community.cookies(), paper.trades.cookies());
    assert_eq!(recorder.count("loggedIn"), 2);
}

#[tokio::test(start_paused = true)]
async fn test_repeated_expiry_signals_relogin_once() {
    let paper = PaperPlatform::new();
    let (agent, _recorder) = logged_in_agent(&paper).await;

    paper.community.expire_session("first");
    paper.community.expire_session("second");
    settle(10).await;

    assert!(agent.is_logged_in().await);
    assert_eq!(paper.account.log_off_count(), 1);
    assert_eq!(paper.account.logons().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_cookieless_session_then_expiry_recovers() {
    let paper = PaperPlatform::new();
    paper.account.withhold_cookies(true);
    let agent = build_agent(&paper);
    spawn_loop(&agent);

    agent.log_in().await.unwrap();
    settle(1).await;
    assert!(!agent.is_logged_in().await);
    assert_eq!(agent.status().await.state, SessionState::LoggedOut);

    paper.account.withhold_cookies(false);
    paper.community.expire_session("cookies rejected");
    settle(10).await;

    assert!(agent.is_logged_in().await);
    assert_eq!(agent.status().await.state, SessionState::LoggedIn);
    assert_eq!(paper.account.logons().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_stale_login_taken_over_by_hourly_relogin() {
    let paper = PaperPlatform::new();
    paper.account.withhold_web_sessions(true);
    let agent = build_agent(&paper);
    spawn_loop(&agent);

    agent.log_in().await.unwrap();
    settle(1).await;
    assert_eq!(agent.status().await.state, SessionState::LoggingIn);
    assert!(agent.log_in().await.is_err());

    paper.account.withhold_web_sessions(false);
    settle(60 * 60 + 10).await;

    assert!(agent.is_logged_in().await);
    assert_eq!(agent.status().await.state, SessionState::LoggedIn);
    assert_eq!(paper.account.logons().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_failed_relogin_retried_by_hourly_tick() {
    let paper = PaperPlatform::new();
    let (agent, _recorder) = logged_in_agent(&paper).await;

    paper
        .account
        .reject_logons_with(Some(PlatformError::with_eresult(84, "RateLimitExceeded")));
    paper.community.expire_session("cookies rejected");
    settle(10).await;
    assert_eq!(paper.account.logons().len(), 2);
    assert!(!agent.is_logged_in().await);
    assert_eq!(agent.status().await.state, SessionState::LoggedOut);

    paper.account.reject_logons_with(None);
    settle(60 * 60).await;

    assert_eq!(paper.account.logons().len(), 3);
    assert!(agent.is_logged_in().await);
}

#[tokio::test(start_paused = true)]
async fn test_idle_relogin_every_hour() {
    let paper = PaperPlatform::new();
    let (agent, recorder) = logged_in_agent(&paper).await;

    settle(59 * 60).await;
    assert_eq!(paper.account.logons().len(), 1);

    settle(2 * 60).await;
    assert_eq!(paper.account.log_off_count(), 1);
    assert_eq!(paper.account.logons().len(), 2);
    assert!(agent.is_logged_in().await);
    assert_eq!(recorder.count("loggedIn"), 2);
}

#[tokio::test(start_paused = true)]
async fn test_confirmation_fetch_failure_schedules_one_deferred_retry() {
    let paper = PaperPlatform::new();
    let (agent, recorder) = logged_in_agent(&paper).await;
    paper.community.fail_next_fetches(1);

    let issued = Instant::now();
    let outcome = agent.confirm_all_unaccepted_trades().await.unwrap();
    assert_eq!(outcome, ConfirmOutcome::RetryScheduled);
    assert!(!agent.is_busy());

    // no synchronous recursion
    assert_eq!(paper.community.fetches().len(), 1);
    settle(RETRY_DELAY_SECS - 1).await;
    assert_eq!(paper.community.fetches().len(), 1);

    settle(2).await;
    let fetches = paper.community.fetches();
    assert_eq!(fetches.len(), 2);
    assert!(fetches[1].at >= issued + Duration::from_secs(RETRY_DELAY_SECS));

    // retry succeeded, nothing further scheduled
    settle(RETRY_DELAY_SECS * 3).await;
    assert_eq!(paper.community.fetches().len(), 2);
    assert_eq!(
        recorder.errors(),
        vec![(503, "Failed to fetch confirmations".to_string())]
    );
}

#[tokio::test(start_paused = true)]
async fn test_bulk_accept_survives_single_failure() {
    let paper = PaperPlatform::new();
    let (agent, _recorder) = logged_in_agent(&paper).await;

    let broken = paper.community.push_confirmation(true);
    let good = paper.community.push_confirmation(false);

    let outcome = agent.confirm_all_unaccepted_trades().await.unwrap();
    assert_eq!(outcome, ConfirmOutcome::Dispatched(2));
    settle(1).await;

    let fetch = &paper.community.fetches()[0];
    let allow = agent.generate_confirmation_code(fetch.time, "allow").unwrap();

    assert_eq!(broken.responses().len(), 1);
    let responses = good.responses();
    assert_eq!(responses, vec![(fetch.time, allow, true)]);
    assert!(good.is_answered());
    assert!(!broken.is_answered());
}

#[tokio::test(start_paused = true)]
async fn test_send_with_auto_confirm_activates_offer() {
    let paper = PaperPlatform::new();
    let (agent, recorder) = logged_in_agent(&paper).await;

    let submission = agent.send_trade_offer(
        PARTNER,
        Some("token"),
        &[],
        &[TradeItem::new(730, "123")],
        "auto",
        true,
    );
    let offer = submission.offer().clone();
    assert_eq!(submission.outcome().await.unwrap(), "pending");
    settle(1).await;

    assert_eq!(offer.snapshot().state, OfferState::Active);
    assert_eq!(
        recorder.offer_changes(),
        vec![(OfferState::CreatedNeedsConfirmation, OfferState::Active)]
    );
    assert_eq!(recorder.count("tradeofferSent"), 1);
    assert!(paper.community.pending_confirmations().is_empty());
    assert!(!agent.is_busy());
}

#[tokio::test(start_paused = true)]
async fn test_new_offer_relayed() {
    let paper = PaperPlatform::new();
    let (_agent, recorder) = logged_in_agent(&paper).await;

    paper.trades.receive_offer(PARTNER, Vec::new(), Vec::new(), "gift");
    settle(1).await;

    assert_eq!(recorder.count("newOffer"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_inventories() {
    let paper = PaperPlatform::new();
    let item = EconItem {
        id: "42".to_string(),
        appid: 730,
        contextid: "2".to_string(),
        classid: "1".to_string(),
        amount: 1,
        name: "Case".to_string(),
        tradable: true,
    };
    paper.trades.set_own_inventory(vec![item.clone()]);
    paper.trades.set_inventory(PARTNER, vec![item.clone()]);
    let (agent, _recorder) = logged_in_agent(&paper).await;

    assert_eq!(agent.get_inventory(730, "2", true).await.unwrap(), vec![item.clone()]);
    assert_eq!(
        agent
            .get_inventory_by_steam_id(PARTNER, 730, "2", true)
            .await
            .unwrap(),
        vec![item]
    );
    assert!(agent
        .get_inventory_by_steam_id(SteamId(1), 730, "2", true)
        .await
        .is_err());
    assert!(!agent.is_busy());
}
