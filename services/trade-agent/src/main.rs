//! Trade Agent - automated Steam trading account
//!
//! 1. Loads settings (config file + TRADE_AGENT__* environment)
//! 2. Starts the session/event loop
//! 3. Logs in and keeps the session fresh
//! 4. Logs agent events until Ctrl-C
//!
//! The binary runs against the paper platform; live collaborators plug in
//! through the `trade_agent::platform` traits.

use std::path::PathBuf;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use trade_agent::paper::PAPER_STEAM_ID;
use trade_agent::{log_events, EconItem, PaperPlatform, Settings, TradeAgent};

const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config_path = std::env::var("TRADE_AGENT_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));
    let settings = Settings::load(Some(config_path.as_path()))?;

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&settings.logging.level)),
        )
        .init();

    info!("Starting Trade Agent...");
    debug!("Settings loaded from {}", config_path.display());

    let paper = PaperPlatform::new();
    paper.trades.set_own_inventory(vec![EconItem {
        id: "1000001".to_string(),
        appid: 730,
        contextid: "2".to_string(),
        classid: "310776560".to_string(),
        amount: 1,
        name: "Paper Case".to_string(),
        tradable: true,
    }]);
    warn!("📝 Running against the PAPER platform as {}", PAPER_STEAM_ID);

    let agent = TradeAgent::from_settings(&settings, paper.platform())?;
    let events = agent.subscribe();

    let runner = agent.clone();
    let loop_handle = tokio::spawn(async move {
        let shutdown = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for Ctrl-C: {}", e);
            }
        };
        runner.run(shutdown).await
    });

    agent.log_in().await?;

    let logger = tokio::spawn(log_events(events));

    loop_handle.await??;
    logger.abort();

    info!("Trade Agent stopped");
    Ok(())
}
