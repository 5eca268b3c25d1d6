use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use common::{
    Config, EngineCommand, Error, ExecutionGateway, FileUniverse, LocalClock, MarketFeed, Result,
    TracingSink, TradingMode,
};
use engine::{Collaborators, Engine, EngineConfig};
use paper::{PaperClient, ReplayFeed};
use strategy::StrategyFileConfig;

#[tokio::main]
async fn main() {
    // ── Logging ──────────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(e) = run().await {
        error!(error = %e, "DonMA terminated");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // ── Config ────────────────────────────────────────────────────────────────
    let cfg = Config::from_env()?;
    info!(mode = %cfg.trading_mode, debug = cfg.debug, "DonMA starting");

    let strategy_file = StrategyFileConfig::load(&cfg.strategy_config_path)?;
    info!(
        band_window = strategy_file.channel.band_window,
        average_window = strategy_file.channel.average_window,
        market_cap = strategy_file.sizing.market_cap,
        risk_fraction = strategy_file.sizing.risk_fraction,
        "Strategy parameters loaded"
    );

    // ── Feed + gateway (injected based on TRADING_MODE) ───────────────────────
    let (feed, gateway): (Box<dyn MarketFeed>, Arc<dyn ExecutionGateway>) = match cfg.trading_mode {
        TradingMode::Live => {
            return Err(Error::Config(
                "Live trading needs a broker feed and gateway; none is built in. Use TRADING_MODE=paper."
                    .to_string(),
            ))
        }
        TradingMode::Paper => {
            let replay_path = cfg
                .replay_path
                .as_deref()
                .ok_or_else(|| Error::Config("REPLAY_PATH is required in paper mode".to_string()))?;
            let client = match &cfg.paper_positions_path {
                Some(path) => PaperClient::with_positions(PaperClient::load_positions(path)?),
                None => PaperClient::new(),
            };
            let feed = ReplayFeed::load(replay_path)?.with_price_mirror(client.prices_handle());
            info!(replay = %replay_path, "Paper trading mode, using PaperClient");
            (Box::new(feed), Arc::new(client))
        }
    };

    // ── Engine ────────────────────────────────────────────────────────────────
    let (mut engine, handle) = Engine::bootstrap(
        EngineConfig::from_parts(&cfg, &strategy_file),
        Collaborators {
            feed,
            gateway,
            universe: Arc::new(FileUniverse::new(&cfg.universe_path)),
            sink: Arc::new(TracingSink),
            clock: Arc::new(LocalClock),
        },
    )
    .await?;

    if let Err(e) = engine.restore_snapshot() {
        warn!(error = %e, "Unreadable state snapshot, starting cold");
    }
    engine.log_startup();

    // ── Shutdown signal ───────────────────────────────────────────────────────
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received");
            handle.send(EngineCommand::Stop).await;
        }
    });

    let reason = engine.run().await?;
    info!(reason = ?reason, "Trading session finished");
    engine.report().await;
    Ok(())
}
