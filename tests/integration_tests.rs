//! Integration tests for the momentum-alerts system
//!
//! These tests drive the scanner end to end with an in-memory candle source,
//! a recording notifier and a manual clock.

use approx::assert_relative_eq;
use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

use momentum_alerts::admin::AdminHandle;
use momentum_alerts::binance::CandleSource;
use momentum_alerts::clock::{Clock, ManualClock};
use momentum_alerts::error::{AdminError, FetchError, NotifyError};
use momentum_alerts::notifier::{MessageHandle, Notifier};
use momentum_alerts::report::{self, ReportOutcome};
use momentum_alerts::scanner::{Scanner, TickOutcome, TickReport};
use momentum_alerts::state::{shared_snapshot, SharedSnapshot, Snapshot};
use momentum_alerts::summary::MarketSummary;
use momentum_alerts::{CandleSeries, Config, Direction, MacroTrend};

// =============================================================================
// Test Utilities
// =============================================================================

/// Tuesday 2024-03-05 07:00 in Lima
fn tuesday() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 5, 12, 0, 0).unwrap()
}

/// Alternating moves whose down leg grows by `step` per candle
///
/// A positive step walks the smoothed RSI slowly down (LONG terrain on the
/// signal timeframe, bearish as a macro series); a negative step walks it
/// slowly up (SHORT terrain, bullish macro).
fn oscillating_closes(count: usize, step: f64) -> Vec<f64> {
    let mut price = 100.0;
    (0..count)
        .map(|i| {
            if i % 2 == 0 {
                price += 1.0;
            } else {
                price -= 1.0 + step * i as f64;
            }
            price
        })
        .collect()
}

fn falling_rsi() -> Vec<f64> {
    oscillating_closes(100, 0.002)
}

fn rising_rsi() -> Vec<f64> {
    oscillating_closes(100, -0.002)
}

fn flat() -> Vec<f64> {
    vec![100.0; 100]
}

fn series(closes: Vec<f64>, last_close: DateTime<Utc>) -> CandleSeries {
    let n = closes.len();
    let close_times = (0..n)
        .map(|i| last_close - Duration::hours(2 * (n - 1 - i) as i64))
        .collect();
    let highs = closes.iter().map(|c| c + 0.5).collect();
    let lows = closes.iter().map(|c| c - 0.5).collect();
    CandleSeries::new(closes, highs, lows, close_times).unwrap()
}

#[derive(Default)]
struct FakeSource {
    series: Mutex<HashMap<(String, String), CandleSeries>>,
    failing: Mutex<HashSet<String>>,
    calls: AtomicUsize,
}

impl FakeSource {
    fn set(&self, instrument: &str, timeframe: &str, series: CandleSeries) {
        self.series
            .lock()
            .unwrap()
            .insert((instrument.to_string(), timeframe.to_string()), series);
    }

    /// Signal series on 2h plus the macro series on 4h
    fn set_pair(&self, instrument: &str, signal: Vec<f64>, macro_closes: Vec<f64>, last: DateTime<Utc>) {
        self.set(instrument, "2h", series(signal, last));
        self.set(instrument, "4h", series(macro_closes, last));
    }

    fn fail(&self, instrument: &str) {
        self.failing.lock().unwrap().insert(instrument.to_string());
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CandleSource for FakeSource {
    async fn fetch(
        &self,
        instrument: &str,
        timeframe: &str,
        _limit: u32,
    ) -> Result<CandleSeries, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.lock().unwrap().contains(instrument) {
            return Err(FetchError::Status {
                status: 500,
                body: "boom".to_string(),
            });
        }
        self.series
            .lock()
            .unwrap()
            .get(&(instrument.to_string(), timeframe.to_string()))
            .cloned()
            .ok_or_else(|| FetchError::NoData {
                instrument: instrument.to_string(),
                timeframe: timeframe.to_string(),
            })
    }
}

/// Delivers every broadcast to two recipients and records edits
#[derive(Default)]
struct RecordingNotifier {
    sent: Mutex<Vec<(String, Option<String>)>>,
    edits: Mutex<Vec<(String, i64, String)>>,
    failing_edits: Mutex<HashSet<String>>,
    next_id: AtomicUsize,
}

impl RecordingNotifier {
    fn texts(&self) -> Vec<String> {
        self.sent.lock().unwrap().iter().map(|(t, _)| t.clone()).collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn broadcast(&self, text: &str, instrument: Option<&str>) -> Vec<MessageHandle> {
        self.sent
            .lock()
            .unwrap()
            .push((text.to_string(), instrument.map(str::to_string)));
        ["100", "200"]
            .iter()
            .map(|recipient| MessageHandle {
                recipient_id: recipient.to_string(),
                message_id: self.next_id.fetch_add(1, Ordering::SeqCst) as i64,
            })
            .collect()
    }

    async fn edit_message(
        &self,
        recipient_id: &str,
        message_id: i64,
        text: &str,
    ) -> Result<(), NotifyError> {
        if self.failing_edits.lock().unwrap().contains(recipient_id) {
            return Err(NotifyError::Rejected {
                chat_id: recipient_id.to_string(),
                description: "Bad Request: message to edit not found".to_string(),
            });
        }
        self.edits
            .lock()
            .unwrap()
            .push((recipient_id.to_string(), message_id, text.to_string()));
        Ok(())
    }
}

struct Harness {
    scanner: Scanner,
    source: Arc<FakeSource>,
    notifier: Arc<RecordingNotifier>,
    clock: Arc<ManualClock>,
    active: Arc<AtomicBool>,
    snapshot: SharedSnapshot,
}

fn test_config(symbols: &[&str]) -> Config {
    let mut config = Config::default();
    config.scan.symbols = symbols.iter().map(|s| s.to_string()).collect();
    config.scan.request_delay_ms = 0;
    config
}

fn harness(symbols: &[&str]) -> Harness {
    let config = test_config(symbols);
    let source = Arc::new(FakeSource::default());
    let notifier = Arc::new(RecordingNotifier::default());
    let clock = Arc::new(ManualClock::new(tuesday()));
    let active = Arc::new(AtomicBool::new(true));
    let snapshot = shared_snapshot(Snapshot::default());

    let scanner = Scanner::new(
        config,
        source.clone(),
        notifier.clone(),
        clock.clone(),
        active.clone(),
        snapshot.clone(),
    )
    .unwrap();

    Harness {
        scanner,
        source,
        notifier,
        clock,
        active,
        snapshot,
    }
}

fn scanned(outcome: TickOutcome) -> TickReport {
    match outcome {
        TickOutcome::Scanned(report) => report,
        other => panic!("expected a scanned tick, got {:?}", other),
    }
}

// =============================================================================
// Individual Alerts
// =============================================================================

#[tokio::test]
async fn test_confirmed_long_terrain_fires_once_per_candle() {
    let mut h = harness(&["BTCUSDT"]);
    h.source.set_pair("BTCUSDT", falling_rsi(), rising_rsi(), tuesday());

    let report = scanned(h.scanner.run_tick().await);
    assert_eq!(report.evaluated, 1);
    assert_eq!(report.fired.len(), 1);
    assert_eq!(report.fired[0].direction, Direction::Long);

    let texts = h.notifier.texts();
    assert_eq!(texts.len(), 1);
    assert!(texts[0].contains("BTCUSDT (2h)"));
    assert!(texts[0].contains("LONG terrain"));
    assert!(texts[0].contains("Bullish"));
    assert!(texts[0].contains("🕒"));
    assert_eq!(
        h.notifier.sent.lock().unwrap()[0].1.as_deref(),
        Some("BTCUSDT")
    );

    // Same candle on the next tick
    h.clock.advance(Duration::minutes(3));
    let report = scanned(h.scanner.run_tick().await);
    assert!(report.fired.is_empty());
    assert_eq!(h.notifier.texts().len(), 1);

    let history = h.scanner.state().history.to_vec();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].sent_messages.len(), 2);
    assert_eq!(history[0].current_price, Some(*falling_rsi().last().unwrap()));
}

#[tokio::test]
async fn test_cooldown_suppresses_new_candles_for_twelve_hours() {
    let mut h = harness(&["BTCUSDT"]);
    h.source.set_pair("BTCUSDT", falling_rsi(), rising_rsi(), tuesday());
    assert_eq!(scanned(h.scanner.run_tick().await).fired.len(), 1);

    // New candle three hours later, still inside the cooldown
    h.clock.advance(Duration::hours(3));
    let candle = tuesday() + Duration::hours(2);
    h.source.set_pair("BTCUSDT", falling_rsi(), rising_rsi(), candle);
    assert!(scanned(h.scanner.run_tick().await).fired.is_empty());

    let key = momentum_alerts::InstrumentKey::new("BTCUSDT", "2h");
    let state = h.scanner.state().alerts.state(&key).unwrap().clone();
    assert_eq!(state.last_candle_time, Some(candle));
    assert_eq!(state.last_alert_time, Some(tuesday()));
    assert_eq!(state.last_entry_type, Some(Direction::Long));

    // Past the cooldown with yet another candle
    h.clock.set(tuesday() + Duration::hours(13));
    h.source
        .set_pair("BTCUSDT", falling_rsi(), rising_rsi(), tuesday() + Duration::hours(12));
    let report = scanned(h.scanner.run_tick().await);
    assert_eq!(report.fired.len(), 1);
    assert_eq!(h.scanner.state().history.len(), 2);
}

#[tokio::test]
async fn test_terrain_without_macro_confirmation_is_silent() {
    let mut h = harness(&["BTCUSDT"]);
    // LONG terrain on 2h while the 4h trend is bearish
    h.source.set_pair("BTCUSDT", falling_rsi(), falling_rsi(), tuesday());

    let report = scanned(h.scanner.run_tick().await);
    assert_eq!(report.evaluated, 1);
    assert!(report.fired.is_empty());
    assert!(h.notifier.texts().is_empty());
    assert_eq!(h.scanner.state().terrain.count(Direction::Long), 0);

    let snapshot = h.snapshot.read().await;
    let state = &snapshot.alert_states["BTCUSDT_2h"];
    assert_eq!(state.macro_status, "No MACRO confirmation (4h) ⚠️");
    assert_eq!(state.current_label, "LONG terrain");
    assert_eq!(state.last_alert_time, None);
}

#[tokio::test]
async fn test_confirmed_short_terrain() {
    let mut h = harness(&["ETHUSDT"]);
    h.source.set_pair("ETHUSDT", rising_rsi(), falling_rsi(), tuesday());

    let report = scanned(h.scanner.run_tick().await);
    assert_eq!(report.fired.len(), 1);
    assert_eq!(report.fired[0].direction, Direction::Short);
    assert_eq!(h.scanner.state().terrain.instruments(Direction::Short), vec!["ETHUSDT"]);
}

// =============================================================================
// Skips and Summary
// =============================================================================

#[tokio::test]
async fn test_failed_and_short_series_are_skipped() {
    let mut h = harness(&["BTCUSDT", "ADAUSDT", "ETHUSDT", "SOLUSDT"]);
    // LONG in progress: smoothed RSI rising faster than the terrain band
    h.source.set_pair("BTCUSDT", oscillating_closes(100, -0.005), flat(), tuesday());
    h.source.set_pair("ADAUSDT", oscillating_closes(100, -0.005), flat(), tuesday());
    h.source.fail("ETHUSDT");
    h.source.set_pair("SOLUSDT", flat()[..49].to_vec(), flat(), tuesday());

    let report = scanned(h.scanner.run_tick().await);
    assert_eq!(report.evaluated, 2);
    assert_eq!(report.skipped, 2);

    // Two -5 weights scaled by all four configured pairs
    let summary = h.scanner.state().summary.clone();
    assert_relative_eq!(summary.gauge_angle, -22.5, epsilon = 1e-9);
    assert_relative_eq!(summary.fire_intensity, 0.1, epsilon = 1e-9);
    assert_eq!(summary.dominant_state_label, "LONG in progress");
    assert_eq!(summary.terrain_note, "Indecision (no trade) ⚖️");
}

#[tokio::test]
async fn test_all_indecision_keeps_gauge_flat() {
    let mut h = harness(&["BTCUSDT", "ETHUSDT"]);
    h.source.set_pair("BTCUSDT", flat(), flat(), tuesday());
    h.source.set_pair("ETHUSDT", flat(), flat(), tuesday());

    let report = scanned(h.scanner.run_tick().await);
    assert_eq!(report.evaluated, 2);
    assert!(report.fired.is_empty());
    assert!(report.consolidated.is_none());

    let snapshot = h.snapshot.read().await;
    assert_eq!(snapshot.market_summary.gauge_angle, 0.0);
    assert_eq!(snapshot.market_summary.dominant_state_label, "Indecision");
    assert_eq!(snapshot.last_tick, Some(tuesday()));
}

// =============================================================================
// Consolidated Alerts
// =============================================================================

#[tokio::test]
async fn test_three_confirmed_instruments_trigger_one_market_alert() {
    let symbols = ["BTCUSDT", "ETHUSDT", "SOLUSDT"];
    let mut h = harness(&symbols);
    for symbol in symbols {
        h.source.set_pair(symbol, falling_rsi(), rising_rsi(), tuesday());
    }

    let report = scanned(h.scanner.run_tick().await);
    assert_eq!(report.fired.len(), 3);
    let signal = report.consolidated.unwrap();
    assert_eq!(signal.direction, Direction::Long);
    assert_eq!(signal.members, vec!["BTCUSDT", "ETHUSDT", "SOLUSDT"]);

    let texts = h.notifier.texts();
    assert_eq!(texts.len(), 4);
    assert!(texts[3].starts_with("🚨 MARKET ALERT - 05/03/24"));
    assert!(texts[3].contains("Dominant: BTC, ETH, SOL"));
    assert_eq!(h.notifier.sent.lock().unwrap()[3].1, None);

    let newest = h.scanner.state().history.entries().next().unwrap().clone();
    assert!(newest.is_consolidated());
    assert_eq!(newest.instrument, "MARKET");

    assert_eq!(
        h.scanner.state().summary.dominant_state_label,
        "LONG terrain"
    );

    // Still in terrain a tick later: the general cooldown holds
    h.clock.advance(Duration::minutes(3));
    assert!(scanned(h.scanner.run_tick().await).consolidated.is_none());
    assert_eq!(h.notifier.texts().len(), 4);
}

// =============================================================================
// Gates
// =============================================================================

#[tokio::test]
async fn test_paused_tick_does_nothing() {
    let mut h = harness(&["BTCUSDT"]);
    h.source.set_pair("BTCUSDT", falling_rsi(), rising_rsi(), tuesday());
    h.active.store(false, Ordering::SeqCst);

    assert_eq!(h.scanner.run_tick().await, TickOutcome::Paused);
    assert_eq!(h.source.calls(), 0);
    assert!(h.notifier.texts().is_empty());

    let snapshot = h.snapshot.read().await;
    assert_eq!(snapshot.market_summary, MarketSummary::paused());
    assert!(!snapshot.system_active);
}

#[tokio::test]
async fn test_weekend_shutdown_notifies_each_edge_once() {
    let mut h = harness(&["BTCUSDT"]);
    h.source.set_pair("BTCUSDT", flat(), flat(), tuesday());

    // Saturday noon in Lima
    let saturday = Utc.with_ymd_and_hms(2024, 3, 9, 17, 0, 0).unwrap();
    h.clock.set(saturday);
    assert_eq!(h.scanner.run_tick().await, TickOutcome::Asleep);
    h.clock.advance(Duration::minutes(3));
    assert_eq!(h.scanner.run_tick().await, TickOutcome::Asleep);

    assert_eq!(h.source.calls(), 0);
    let texts = h.notifier.texts();
    assert_eq!(texts.len(), 1);
    assert!(texts[0].contains("BOT OFF"));
    assert_eq!(
        h.snapshot.read().await.market_summary,
        MarketSummary::asleep()
    );

    // Monday 00:00 in Lima
    h.clock.set(Utc.with_ymd_and_hms(2024, 3, 11, 5, 0, 0).unwrap());
    let report = scanned(h.scanner.run_tick().await);
    assert_eq!(report.evaluated, 1);
    let texts = h.notifier.texts();
    assert_eq!(texts.len(), 2);
    assert!(texts[1].contains("back on"));
}

// =============================================================================
// Admin
// =============================================================================

#[tokio::test]
async fn test_annotation_edits_every_delivered_copy() {
    let mut h = harness(&["BTCUSDT"]);
    h.source.set_pair("BTCUSDT", falling_rsi(), rising_rsi(), tuesday());
    let report = scanned(h.scanner.run_tick().await);
    let id = report.fired[0].history_id;

    let entry = h.scanner.annotate(id, "FALSE signal").await.unwrap();
    assert_eq!(entry.observation.as_deref(), Some("FALSE signal"));

    let edits = h.notifier.edits.lock().unwrap().clone();
    assert_eq!(edits.len(), 2);
    assert_eq!(edits[0].0, "100");
    assert!(edits[0].2.contains("Observation: FALSE signal ❌"));

    let snapshot = h.snapshot.read().await;
    assert_eq!(snapshot.history[0].observation.as_deref(), Some("FALSE signal"));
    drop(snapshot);

    assert_eq!(
        h.scanner.annotate(999, "Signal approved").await,
        Err(AdminError::SignalNotFound(999))
    );
}

#[tokio::test]
async fn test_annotation_accepts_free_text() {
    let mut h = harness(&["BTCUSDT"]);
    h.source.set_pair("BTCUSDT", falling_rsi(), rising_rsi(), tuesday());
    let report = scanned(h.scanner.run_tick().await);
    let id = report.fired[0].history_id;

    let entry = h.scanner.annotate(id, "Whale wall at 70k").await.unwrap();
    assert_eq!(entry.observation.as_deref(), Some("Whale wall at 70k"));

    let edits = h.notifier.edits.lock().unwrap().clone();
    assert_eq!(edits.len(), 2);
    assert!(edits[1].2.ends_with("Observation: Whale wall at 70k"));
}

#[tokio::test]
async fn test_failed_edit_does_not_block_other_recipients() {
    let mut h = harness(&["BTCUSDT"]);
    h.source.set_pair("BTCUSDT", falling_rsi(), rising_rsi(), tuesday());
    let report = scanned(h.scanner.run_tick().await);
    let id = report.fired[0].history_id;

    h.notifier
        .failing_edits
        .lock()
        .unwrap()
        .insert("100".to_string());

    let entry = h.scanner.annotate(id, "Signal approved").await.unwrap();
    assert_eq!(entry.sent_messages.len(), 2);

    let edits = h.notifier.edits.lock().unwrap().clone();
    assert_eq!(edits.len(), 1);
    assert_eq!(edits[0].0, "200");
    assert!(edits[0].2.contains("Observation: Signal approved ✅"));
    assert_eq!(
        h.snapshot.read().await.history[0].observation.as_deref(),
        Some("Signal approved")
    );
}

#[tokio::test]
async fn test_run_loop_applies_commands_and_stops() {
    let h = harness(&["BTCUSDT"]);
    h.source.set_pair("BTCUSDT", flat(), flat(), tuesday());

    let (command_tx, command_rx) = mpsc::channel(4);
    let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
    let clock: Arc<dyn Clock> = h.clock.clone();
    let admin = AdminHandle::new(
        "awd ".to_string(),
        h.active.clone(),
        command_tx,
        h.notifier.clone(),
        clock,
        chrono_tz::America::Lima,
    );

    let task = tokio::spawn(h.scanner.run(command_rx, shutdown_rx));

    assert_eq!(
        admin.annotate("awd ", 1, "Signal approved").await,
        Err(AdminError::SignalNotFound(1))
    );
    assert_eq!(
        admin.annotate("wrong", 1, "Signal approved").await,
        Err(AdminError::Unauthorized)
    );

    shutdown_tx.send(()).await.unwrap();
    task.await.unwrap();
}

// =============================================================================
// Manual Report
// =============================================================================

#[tokio::test]
async fn test_report_does_not_touch_alert_state() {
    let h = harness(&["BTCUSDT"]);
    h.source.set_pair("BTCUSDT", falling_rsi(), rising_rsi(), tuesday());
    let config = test_config(&["BTCUSDT"]);

    let outcome = report::evaluate_instrument(h.source.as_ref(), &config, "BTCUSDT", "2h")
        .await
        .unwrap();
    let ReportOutcome::Ready(report) = outcome else {
        panic!("expected a ready report");
    };
    assert_eq!(report.terrain, Some(Direction::Long));
    assert_eq!(report.macro_trend, MacroTrend::Bullish);
    assert_eq!(report.confirmed_terrain(), Some(Direction::Long));
    assert_eq!(report.macro_status, "MACRO confirmation (4h) 🚀");

    assert!(h.scanner.state().alerts.states().is_empty());
    assert_eq!(h.scanner.state().terrain.count(Direction::Long), 0);
    assert!(h.notifier.texts().is_empty());
}

#[tokio::test]
async fn test_report_all_skips_failures() {
    let h = harness(&["BTCUSDT", "ETHUSDT", "SOLUSDT"]);
    h.source.set_pair("BTCUSDT", flat(), flat(), tuesday());
    h.source.fail("ETHUSDT");
    h.source.set_pair("SOLUSDT", flat()[..30].to_vec(), flat(), tuesday());
    let config = test_config(&["BTCUSDT", "ETHUSDT", "SOLUSDT"]);

    let outcomes = report::evaluate_all(h.source.as_ref(), &config).await;
    assert_eq!(outcomes.len(), 2);
    assert!(matches!(outcomes[0], ReportOutcome::Ready(_)));
    assert_eq!(
        outcomes[1],
        ReportOutcome::InsufficientData {
            instrument: "SOLUSDT".to_string(),
            timeframe: "2h".to_string(),
        }
    );
}
