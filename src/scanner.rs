//! Scan loop orchestrator
//!
//! One tick walks every configured (instrument, timeframe) pair in order:
//! fetch candles, compute indicators, classify, confirm against the macro
//! timeframe, evaluate the individual alert. Afterwards it folds the weights
//! into the market summary, checks for a consolidated alert and publishes a
//! snapshot. The scanner is the only writer of [`EngineState`]; admin
//! mutations reach it as [`Command`]s applied between ticks.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval, sleep, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::alerts::macro_status;
use crate::binance::CandleSource;
use crate::classifier::{classify, Classification};
use crate::clock::Clock;
use crate::config::Config;
use crate::consolidated::ConsolidatedSignal;
use crate::error::AdminError;
use crate::history::{ConsolidatedDetails, HistoryEntry};
use crate::indicators::{self, IndicatorResult};
use crate::messages;
use crate::notifier::{MessageHandle, Notifier};
use crate::schedule::{ShutdownLatch, Transition, WeeklySchedule};
use crate::state::{EngineState, SharedSnapshot};
use crate::summary::MarketSummary;
use crate::types::{Direction, InstrumentKey, MacroTrend};

/// Label used in history for market-wide alerts
pub const MARKET_INSTRUMENT: &str = "MARKET";
pub const MARKET_TIMEFRAME: &str = "Global";

/// Admin mutation applied by the scan loop between ticks
#[derive(Debug)]
pub enum Command {
    Annotate {
        signal_id: u64,
        observation: String,
        reply: oneshot::Sender<Result<HistoryEntry, AdminError>>,
    },
}

/// Individual alert fired during a tick
#[derive(Debug, Clone, PartialEq)]
pub struct FiredAlert {
    pub key: InstrumentKey,
    pub direction: Direction,
    pub history_id: u64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    /// Pairs that produced a classification
    pub evaluated: usize,
    /// Pairs skipped for missing or insufficient data
    pub skipped: usize,
    pub fired: Vec<FiredAlert>,
    pub consolidated: Option<ConsolidatedSignal>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// Admin switch is off
    Paused,
    /// Inside the weekly shutdown window
    Asleep,
    Scanned(TickReport),
}

/// Higher-timeframe trend of `instrument`, neutral when it cannot be computed
pub async fn fetch_macro_trend(
    source: &dyn CandleSource,
    config: &Config,
    instrument: &str,
) -> MacroTrend {
    let timeframe = &config.scan.macro_timeframe;
    match source
        .fetch(instrument, timeframe, config.scan.fetch_limit)
        .await
    {
        Ok(series) => match indicators::calculate(&series, &config.indicator) {
            Some(result) => indicators::macro_trend(&result, config.indicator.macro_lookback),
            None => {
                debug!("{} {}: insufficient macro data", instrument, timeframe);
                MacroTrend::Neutral
            }
        },
        Err(e) => {
            warn!("{} {}: macro fetch failed: {}", instrument, timeframe, e);
            MacroTrend::Neutral
        }
    }
}

pub struct Scanner {
    config: Config,
    source: Arc<dyn CandleSource>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    schedule: WeeklySchedule,
    latch: ShutdownLatch,
    active: Arc<AtomicBool>,
    state: EngineState,
    snapshot: SharedSnapshot,
    tick_count: u64,
}

impl Scanner {
    pub fn new(
        config: Config,
        source: Arc<dyn CandleSource>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        active: Arc<AtomicBool>,
        snapshot: SharedSnapshot,
    ) -> anyhow::Result<Self> {
        let schedule = WeeklySchedule::from_config(&config.schedule)?;
        let state = EngineState::new(&config.alerts);

        Ok(Scanner {
            config,
            source,
            notifier,
            clock,
            schedule,
            latch: ShutdownLatch::default(),
            active,
            state,
            snapshot,
            tick_count: 0,
        })
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    async fn publish(&self) {
        let snapshot = self.state.snapshot(self.is_active());
        *self.snapshot.write().await = snapshot;
    }

    async fn broadcast(&self, text: &str, instrument: Option<&str>) -> Vec<MessageHandle> {
        let stamped = messages::stamp(text, self.clock.now(), self.schedule.tz());
        self.notifier.broadcast(&stamped, instrument).await
    }

    /// Run one tick: gates first, then the full scan
    pub async fn run_tick(&mut self) -> TickOutcome {
        self.tick_count += 1;

        if !self.is_active() {
            info!("Tick {}: system paused (admin switch off)", self.tick_count);
            self.state.summary = MarketSummary::paused();
            self.publish().await;
            return TickOutcome::Paused;
        }

        let off = self.schedule.is_off(self.clock.now());
        match self.latch.update(off) {
            Some(Transition::WentOff) => {
                info!("Weekly shutdown started");
                self.broadcast(messages::shutdown_notice(), None).await;
            }
            Some(Transition::CameOn) => {
                info!("Weekly shutdown ended");
                self.broadcast(messages::wakeup_notice(), None).await;
            }
            None => {}
        }

        if off {
            debug!("Tick {}: asleep (weekly shutdown)", self.tick_count);
            self.state.summary = MarketSummary::asleep();
            self.publish().await;
            return TickOutcome::Asleep;
        }

        let report = self.scan().await;
        self.publish().await;
        TickOutcome::Scanned(report)
    }

    async fn scan(&mut self) -> TickReport {
        let keys = self.config.scan.keys();
        info!("━━━ Tick {}: scanning {} pairs ━━━", self.tick_count, keys.len());

        self.state.terrain.prune(self.clock.now());

        let mut report = TickReport::default();
        let mut weights = Vec::with_capacity(keys.len());
        let mut macro_cache: HashMap<String, MacroTrend> = HashMap::new();

        for key in &keys {
            sleep(self.config.scan.request_delay()).await;

            let series = match self
                .source
                .fetch(&key.instrument, &key.timeframe, self.config.scan.fetch_limit)
                .await
            {
                Ok(series) => series,
                Err(e) => {
                    warn!("{}: skipped, fetch failed: {}", key, e);
                    report.skipped += 1;
                    continue;
                }
            };

            let Some(indicator) = indicators::calculate(&series, &self.config.indicator) else {
                warn!("{}: skipped, insufficient data ({} candles)", key, series.len());
                report.skipped += 1;
                continue;
            };
            let Some(candle_time) = series.last_close_time() else {
                report.skipped += 1;
                continue;
            };

            let classification = classify(indicator.slope, indicator.curve_trend);
            weights.push(classification.weight);
            report.evaluated += 1;

            let cached = macro_cache.get(&key.instrument).copied();
            let trend = match cached {
                Some(trend) => trend,
                None => {
                    sleep(self.config.scan.request_delay()).await;
                    let trend =
                        fetch_macro_trend(self.source.as_ref(), &self.config, &key.instrument)
                            .await;
                    macro_cache.insert(key.instrument.clone(), trend);
                    trend
                }
            };

            let now = self.clock.now();
            let terrain = classification.terrain;
            if let Some(direction) = terrain {
                if trend.confirms(direction) {
                    self.state.terrain.track(direction, &key.instrument, now);
                }
            }

            let status = macro_status(terrain, trend, &self.config.scan.macro_timeframe);
            self.state
                .alerts
                .observe(key, &classification, &indicator, status);

            debug!(
                "{}: slope={:.4} curve={:?} state={} macro={:?}",
                key, indicator.slope, indicator.curve_trend, classification.label, trend
            );

            let decision = self
                .state
                .alerts
                .evaluate(key, terrain, trend, candle_time, now);
            if let Some(direction) = decision.fired() {
                let history_id = self
                    .fire_individual(key, direction, &classification, &indicator, trend, now)
                    .await;
                report.fired.push(FiredAlert {
                    key: key.clone(),
                    direction,
                    history_id,
                });
            }
        }

        self.state.summary =
            MarketSummary::aggregate(&weights, keys.len(), &self.state.terrain);

        let now = self.clock.now();
        if let Some(signal) = self.state.consolidated.check(&mut self.state.terrain, now) {
            self.fire_consolidated(&signal, now).await;
            report.consolidated = Some(signal);
        }

        self.state.last_tick = Some(now);
        info!(
            "Tick {} done: {} evaluated, {} skipped, {} alerts, gauge {:.1}°",
            self.tick_count,
            report.evaluated,
            report.skipped,
            report.fired.len() + usize::from(report.consolidated.is_some()),
            self.state.summary.gauge_angle
        );
        report
    }

    async fn fire_individual(
        &mut self,
        key: &InstrumentKey,
        direction: Direction,
        classification: &Classification,
        indicator: &IndicatorResult,
        trend: MacroTrend,
        now: DateTime<Utc>,
    ) -> u64 {
        let macro_note = messages::macro_line(trend, &self.config.scan.macro_timeframe);
        let text = messages::individual_alert(
            &key.instrument,
            &key.timeframe,
            indicator.current_price,
            &classification.label,
            &classification.emoji,
            &macro_note,
        );

        info!(
            "🚨 {} alert for {} at {}",
            direction, key, indicator.current_price
        );
        let sent_messages = self.broadcast(&text, Some(&key.instrument)).await;

        self.state.history.record(HistoryEntry {
            id: 0,
            time: now,
            instrument: key.instrument.clone(),
            timeframe: key.timeframe.clone(),
            signal: direction,
            state_label: classification.label.clone(),
            state_emoji: classification.emoji.clone(),
            slope: indicator.slope,
            current_price: Some(indicator.current_price),
            macro_note,
            sent_messages,
            observation: None,
            consolidated: None,
        })
    }

    async fn fire_consolidated(&mut self, signal: &ConsolidatedSignal, now: DateTime<Utc>) -> u64 {
        let date = messages::alert_date(now, self.schedule.tz());
        let text = messages::consolidated_alert(&date, signal.direction, &signal.members);
        let sent_messages = self.broadcast(&text, None).await;

        let emoji = match signal.direction {
            Direction::Long => "🚀",
            Direction::Short => "🔻",
        };

        self.state.history.record(HistoryEntry {
            id: 0,
            time: now,
            instrument: MARKET_INSTRUMENT.to_string(),
            timeframe: MARKET_TIMEFRAME.to_string(),
            signal: signal.direction,
            state_label: format!("Consolidated {}", signal.direction),
            state_emoji: emoji.to_string(),
            slope: 0.0,
            current_price: None,
            macro_note: String::new(),
            sent_messages,
            observation: None,
            consolidated: Some(ConsolidatedDetails {
                date,
                members: signal.members.clone(),
            }),
        })
    }

    /// Attach an observation to a history entry and edit every delivered copy
    pub async fn annotate(
        &mut self,
        signal_id: u64,
        observation: &str,
    ) -> Result<HistoryEntry, AdminError> {
        let entry = self
            .state
            .history
            .annotate(signal_id, observation)?
            .clone();
        let text = messages::with_observation(&entry, observation);

        info!("Signal {} annotated: {}", signal_id, observation);
        for handle in &entry.sent_messages {
            if let Err(e) = self
                .notifier
                .edit_message(&handle.recipient_id, handle.message_id, &text)
                .await
            {
                error!(
                    "Failed to edit message {} for {}: {}",
                    handle.message_id, handle.recipient_id, e
                );
            }
        }

        self.publish().await;
        Ok(entry)
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Annotate {
                signal_id,
                observation,
                reply,
            } => {
                let result = self.annotate(signal_id, &observation).await;
                if reply.send(result).is_err() {
                    debug!("Annotate caller went away before the reply");
                }
            }
        }
    }

    /// Drive ticks until `shutdown` receives a message
    pub async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut shutdown: mpsc::Receiver<()>,
    ) {
        let mut tick_interval = interval(self.config.scan.check_interval());
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            "Starting scan loop ({} pairs every {}s)",
            self.config.scan.keys().len(),
            self.config.scan.check_interval_secs
        );

        loop {
            tokio::select! {
                _ = tick_interval.tick() => {
                    self.run_tick().await;
                }
                Some(command) = commands.recv() => {
                    self.handle_command(command).await;
                }
                Some(()) = shutdown.recv() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        info!("Scan loop stopped after {} ticks", self.tick_count);
    }
}
