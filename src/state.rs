//! Engine state owned by the scan loop, and the snapshot readers see
//!
//! Only the scan loop mutates [`EngineState`]. At the end of every tick and
//! after every applied admin command it publishes a fresh [`Snapshot`], so
//! readers never observe a half-finished tick.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::alerts::{AlertEvaluator, InstrumentAlertState};
use crate::config::AlertConfig;
use crate::consolidated::{ConsolidatedAlertState, ConsolidatedDetector};
use crate::history::{AlertHistory, HistoryEntry};
use crate::summary::MarketSummary;
use crate::terrain::TerrainTracker;

#[derive(Debug, Clone)]
pub struct EngineState {
    pub alerts: AlertEvaluator,
    pub terrain: TerrainTracker,
    pub consolidated: ConsolidatedDetector,
    pub summary: MarketSummary,
    pub history: AlertHistory,
    pub last_tick: Option<DateTime<Utc>>,
}

impl EngineState {
    pub fn new(config: &AlertConfig) -> Self {
        EngineState {
            alerts: AlertEvaluator::new(config.instrument_cooldown()),
            terrain: TerrainTracker::new(config.terrain_window()),
            consolidated: ConsolidatedDetector::new(config),
            summary: MarketSummary::default(),
            history: AlertHistory::new(config.history_capacity),
            last_tick: None,
        }
    }

    pub fn snapshot(&self, system_active: bool) -> Snapshot {
        Snapshot {
            market_summary: self.summary.clone(),
            alert_states: self.alerts.states().clone(),
            history: self.history.to_vec(),
            consolidated: self.consolidated.state().clone(),
            system_active,
            last_tick: self.last_tick,
        }
    }
}

/// Read-only copy of the engine state as of the last committed tick
#[derive(Debug, Clone, Default, Serialize)]
pub struct Snapshot {
    pub market_summary: MarketSummary,
    pub alert_states: BTreeMap<String, InstrumentAlertState>,
    pub history: Vec<HistoryEntry>,
    pub consolidated: ConsolidatedAlertState,
    pub system_active: bool,
    pub last_tick: Option<DateTime<Utc>>,
}

pub type SharedSnapshot = Arc<RwLock<Snapshot>>;

pub fn shared_snapshot(initial: Snapshot) -> SharedSnapshot {
    Arc::new(RwLock::new(initial))
}
