use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDateTime, NaiveTime, Timelike};
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};

use common::{
    BrokerPosition, Clock, Config, EngineCommand, Error, EngineEvent, EngineState, EventSink,
    ExecutionGateway, FeedField, MarketFeed, Result, TradingMode, UniverseProvider,
};
use risk::{PositionSizer, SizingConfig};
use strategy::{
    trailing, ChannelCalculator, ChannelConfig, DailyChannel, StrategyFileConfig, SymbolState,
    TrailingExitEngine,
};

use crate::executor::TargetExecutor;
use crate::snapshot::{Snapshot, SnapshotStore};

/// Constructor-level options of the engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub mode: TradingMode,
    pub channel: ChannelConfig,
    pub sizing: SizingConfig,
    /// Skip cutoff and autosave; flatten and stop once anything is held.
    pub debug: bool,
    /// Continuing the same trading day: restore guard flags and trade on the
    /// primed channel without waiting for a daily bar change.
    pub resume_intraday: bool,
    pub save_interval: Duration,
    /// The loop stops from this minute until the end of its hour.
    pub session_cutoff: NaiveTime,
    pub snapshot_path: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            mode: TradingMode::Paper,
            channel: ChannelConfig::default(),
            sizing: SizingConfig::default(),
            debug: false,
            resume_intraday: false,
            save_interval: Duration::from_secs(600),
            session_cutoff: NaiveTime::from_hms_opt(14, 59, 0).unwrap_or_default(),
            snapshot_path: PathBuf::from("donma_state.json"),
        }
    }
}

impl EngineConfig {
    /// Reject windows the indicators cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.channel.band_window == 0 || self.channel.average_window == 0 {
            return Err(Error::Config(format!(
                "channel windows must be >= 1, got band_window={} average_window={}",
                self.channel.band_window, self.channel.average_window
            )));
        }
        Ok(())
    }

    pub fn from_parts(cfg: &Config, strategy: &StrategyFileConfig) -> Self {
        Self {
            mode: cfg.trading_mode,
            channel: strategy.channel,
            sizing: strategy.sizing,
            debug: cfg.debug,
            resume_intraday: cfg.resume_intraday,
            save_interval: cfg.save_interval,
            session_cutoff: cfg.session_cutoff,
            snapshot_path: PathBuf::from(&cfg.snapshot_path),
        }
    }
}

/// External collaborators injected into the engine.
pub struct Collaborators {
    pub feed: Box<dyn MarketFeed>,
    pub gateway: Arc<dyn ExecutionGateway>,
    pub universe: Arc<dyn UniverseProvider>,
    pub sink: Arc<dyn EventSink>,
    pub clock: Arc<dyn Clock>,
}

/// Why the main loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    SessionCutoff,
    Stopped,
    FeedExhausted,
    DebugFlattened,
}

/// Cloneable handle for controlling a running engine.
#[derive(Clone)]
pub struct EngineHandle {
    command_tx: mpsc::Sender<EngineCommand>,
    state: Arc<RwLock<EngineState>>,
}

impl EngineHandle {
    pub async fn send(&self, cmd: EngineCommand) {
        let _ = self.command_tx.send(cmd).await;
    }

    pub async fn state(&self) -> EngineState {
        *self.state.read().await
    }
}

enum Wake {
    Feed(Result<bool>),
    Command(Option<EngineCommand>),
}

/// The strategy engine: owns every `SymbolState` and drives the channel
/// calculator and the trailing exit engine from feed updates.
///
/// Single logical thread of control. The only suspension points are the
/// feed's `wait_update` and gateway calls; instruments are evaluated in
/// universe order.
pub struct Engine {
    config: EngineConfig,
    feed: Box<dyn MarketFeed>,
    executor: TargetExecutor,
    sink: Arc<dyn EventSink>,
    clock: Arc<dyn Clock>,
    store: SnapshotStore,
    calculator: ChannelCalculator,
    trailer: TrailingExitEngine,
    symbols: Vec<String>,
    inactive: Vec<BrokerPosition>,
    states: HashMap<String, SymbolState>,
    channels: HashMap<String, DailyChannel>,
    multipliers: HashMap<String, f64>,
    state: Arc<RwLock<EngineState>>,
    command_rx: mpsc::Receiver<EngineCommand>,
    #[allow(dead_code)] // kept to prevent channel close
    command_tx: mpsc::Sender<EngineCommand>,
}

impl Engine {
    /// Subscribe the universe, seed state from broker positions and collect
    /// held instruments that left the universe.
    pub async fn bootstrap(config: EngineConfig, c: Collaborators) -> Result<(Self, EngineHandle)> {
        let Collaborators {
            mut feed,
            gateway,
            universe,
            sink,
            clock,
        } = c;

        config.validate()?;
        let symbols = universe.active_symbols()?;
        let broker = gateway.positions().await?;
        let calculator = ChannelCalculator::new(
            config.channel.band_window,
            config.channel.average_window,
        );

        let inactive: Vec<BrokerPosition> = broker
            .iter()
            .filter(|p| p.net != 0 && !symbols.contains(&p.symbol))
            .cloned()
            .collect();

        let mut states = HashMap::new();
        let mut multipliers = HashMap::new();
        for symbol in &symbols {
            let info = feed.subscribe(symbol, calculator.bar_count()).await?;
            multipliers.insert(symbol.clone(), info.volume_multiple);
            let seeded = broker
                .iter()
                .find(|p| &p.symbol == symbol)
                .map_or_else(SymbolState::default, |p| SymbolState::seeded(p.net, p.open_price));
            states.insert(symbol.clone(), seeded);
        }

        let (command_tx, command_rx) = mpsc::channel(32);
        let state = Arc::new(RwLock::new(EngineState::Stopped));
        let handle = EngineHandle {
            command_tx: command_tx.clone(),
            state: state.clone(),
        };

        info!(
            instruments = symbols.len(),
            inactive = inactive.len(),
            mode = %config.mode,
            "Engine initialization finished"
        );

        let engine = Engine {
            store: SnapshotStore::new(&config.snapshot_path),
            trailer: TrailingExitEngine::new(PositionSizer::new(config.sizing)),
            executor: TargetExecutor::new(gateway, config.mode),
            config,
            feed,
            sink,
            clock,
            calculator,
            symbols,
            inactive,
            states,
            channels: HashMap::new(),
            multipliers,
            state,
            command_rx,
            command_tx,
        };

        Ok((engine, handle))
    }

    /// Merge the persisted snapshot into the seeded states.
    /// A missing snapshot is a cold start and returns `Ok(0)`.
    pub fn restore_snapshot(&mut self) -> Result<usize> {
        match self.store.load()? {
            Some(snapshot) => {
                let restored = snapshot.apply(&mut self.states, self.config.resume_intraday);
                info!(
                    path = %self.store.path().display(),
                    restored = restored,
                    intraday = self.config.resume_intraday,
                    "State snapshot restored"
                );
                Ok(restored)
            }
            None => {
                info!(path = %self.store.path().display(), "No state snapshot, starting cold");
                Ok(0)
            }
        }
    }

    pub fn save_snapshot(&self) -> Result<()> {
        let snapshot = Snapshot::capture(&self.states);
        self.store.save(&snapshot)?;
        self.sink.emit(&EngineEvent::SnapshotSaved {
            instruments: snapshot.len(),
        });
        Ok(())
    }

    /// Log the seeded state of every instrument.
    pub fn log_startup(&self) {
        for symbol in &self.symbols {
            if let Some(st) = self.states.get(symbol) {
                info!(
                    symbol = %symbol,
                    position = st.position,
                    entry_price = st.entry_reference_price,
                    entry_ma = st.entry_moving_average,
                    pendant_coef = st.pendant_coefficient,
                    extreme = st.extreme_since_entry,
                    "Active instrument"
                );
            }
        }
        for p in &self.inactive {
            info!(symbol = %p.symbol, position = p.net, "Inactive instrument");
        }
    }

    /// Log broker positions and today's trades.
    pub async fn report(&self) {
        self.executor.report().await;
    }

    /// Run until cutoff, stop command, feed exhaustion or debug flatten.
    /// The snapshot is saved on every exit path.
    pub async fn run(&mut self) -> Result<StopReason> {
        info!("Start monitoring ticks");
        *self.state.write().await = EngineState::Running;
        let outcome = self.run_loop().await;
        *self.state.write().await = EngineState::Stopped;

        let saved = self.save_snapshot();
        match outcome {
            Ok(reason) => {
                info!(reason = ?reason, "Engine stopped");
                saved.map(|_| reason)
            }
            Err(e) => {
                if let Err(save_err) = saved {
                    warn!(error = %save_err, "Failed to save snapshot after engine error");
                }
                Err(e)
            }
        }
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    pub fn inactive(&self) -> &[BrokerPosition] {
        &self.inactive
    }

    pub fn symbol_state(&self, symbol: &str) -> Option<&SymbolState> {
        self.states.get(symbol)
    }

    pub fn channel(&self, symbol: &str) -> Option<&DailyChannel> {
        self.channels.get(symbol)
    }

    async fn run_loop(&mut self) -> Result<StopReason> {
        for p in self.inactive.clone() {
            self.executor.set_target(&p.symbol, 0).await;
            self.sink.emit(&EngineEvent::InactiveFlattened {
                symbol: p.symbol,
                position: p.net,
            });
        }

        for symbol in self.symbols.clone() {
            self.recalc_channel(&symbol);
        }

        let mut last_save = self.clock.now();
        loop {
            if !self.config.debug {
                let now = self.clock.now();
                if self.past_cutoff(now) {
                    self.sink.emit(&EngineEvent::SessionCutoff);
                    return Ok(StopReason::SessionCutoff);
                }
                if now - last_save >= chrono::Duration::from_std(self.config.save_interval).unwrap_or_default() {
                    last_save = now;
                    self.save_periodic();
                }
            }

            let wake = tokio::select! {
                biased;
                cmd = self.command_rx.recv() => Wake::Command(cmd),
                updated = self.feed.wait_update() => Wake::Feed(updated),
            };
            match wake {
                Wake::Command(Some(EngineCommand::SaveSnapshot)) => {
                    self.save_periodic();
                    continue;
                }
                Wake::Command(Some(EngineCommand::Stop)) | Wake::Command(None) => {
                    return Ok(StopReason::Stopped);
                }
                Wake::Feed(updated) => {
                    if !updated? {
                        info!("Market feed exhausted");
                        return Ok(StopReason::FeedExhausted);
                    }
                }
            }

            for symbol in self.symbols.clone() {
                self.process_symbol(&symbol).await;
            }

            if self.config.debug && self.debug_flatten().await? {
                return Ok(StopReason::DebugFlattened);
            }
        }
    }

    async fn process_symbol(&mut self, symbol: &str) {
        if self.feed.has_changed(symbol, FeedField::BarTimestamp) {
            if let Some(st) = self.states.get_mut(symbol) {
                st.on_new_daily_bar();
            }
            self.recalc_channel(symbol);
        }

        if !self.feed.has_changed(symbol, FeedField::LastPrice) {
            return;
        }
        let Some(st) = self.states.get_mut(symbol) else {
            return;
        };
        if !self.config.resume_intraday && !st.daily_updated_since_start {
            debug!(symbol = %symbol, "Tick skipped, no daily bar update since start");
            return;
        }
        let Some(tick) = self.feed.tick(symbol) else {
            return;
        };
        if tick.last_price.is_nan() {
            return;
        }
        let Some(channel) = self.channels.get(symbol) else {
            debug!(symbol = %symbol, "Tick skipped, no daily channel");
            return;
        };
        let multiplier = self.multipliers.get(symbol).copied().unwrap_or(1.0);

        let transitions = self.trailer.on_tick(st, channel, tick.last_price, multiplier);
        for t in transitions {
            self.executor.set_target(symbol, t.target()).await;
            self.sink.emit(&t.into_event(symbol));
        }
    }

    fn recalc_channel(&mut self, symbol: &str) {
        let bars = self.feed.bars(symbol);
        match self.calculator.compute(bars) {
            Some(ch) => {
                self.sink.emit(&EngineEvent::ChannelRecomputed {
                    symbol: symbol.to_string(),
                    upper_band: ch.upper_band,
                    lower_band: ch.lower_band,
                    moving_average: ch.moving_average,
                });
                self.channels.insert(symbol.to_string(), ch);
            }
            None => {
                warn!(
                    symbol = %symbol,
                    bars = bars.len(),
                    needed = self.calculator.bar_count(),
                    "Not enough daily bars for a channel"
                );
                self.channels.remove(symbol);
            }
        }
    }

    fn past_cutoff(&self, now: NaiveDateTime) -> bool {
        let cutoff = self.config.session_cutoff;
        now.hour() == cutoff.hour() && now.minute() >= cutoff.minute()
    }

    fn save_periodic(&self) {
        if let Err(e) = self.save_snapshot() {
            warn!(error = %e, "Periodic snapshot save failed");
        }
    }

    /// Flatten every held active instrument and wait until the broker shows
    /// them flat. Returns `false` when nothing is held.
    async fn debug_flatten(&mut self) -> Result<bool> {
        let positions = self.executor.positions().await;
        let held: Vec<(String, i64)> = self
            .symbols
            .iter()
            .filter_map(|s| {
                positions
                    .iter()
                    .find(|p| &p.symbol == s && p.net != 0)
                    .map(|p| (s.clone(), p.net))
            })
            .collect();
        if held.is_empty() {
            return Ok(false);
        }

        for (symbol, net) in &held {
            let price = self.feed.tick(symbol).map_or(f64::NAN, |t| t.last_price);
            let channel = self.channels.get(symbol).copied();
            let ma = channel.map_or(0.0, |c| c.moving_average);
            let mut stop = price;
            if let Some(st) = self.states.get_mut(symbol) {
                if let (Some(side), Some(ch)) = (st.side(), channel) {
                    stop = trailing::stop_level(side, &ch, st);
                }
                st.set_position(0, price, ma, false);
                st.day_trade_done = true;
            }
            debug!(symbol = %symbol, from = net, "Debug mode, flattening position");
            self.executor.set_target(symbol, 0).await;
            self.sink.emit(&EngineEvent::Exited {
                symbol: symbol.clone(),
                from: *net,
                price,
                stop_level: stop,
            });
        }

        loop {
            let positions = self.executor.positions().await;
            let all_flat = held
                .iter()
                .all(|(s, _)| positions.iter().all(|p| &p.symbol != s || p.net == 0));
            if all_flat {
                return Ok(true);
            }
            if !self.feed.wait_update().await? {
                warn!("Market feed exhausted before debug positions were flat");
                return Ok(true);
            }
        }
    }
}
