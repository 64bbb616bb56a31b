//! Market-wide alert when several instruments share a confirmed terrain
//!
//! Two cooldowns apply: a per-direction one (no repeat of the same direction
//! within the direction window) and a general one across both directions.
//! At most one consolidated alert fires per tick; LONG is checked first.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::AlertConfig;
use crate::terrain::TerrainTracker;
use crate::types::Direction;

/// Cooldown bookkeeping of the detector
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConsolidatedAlertState {
    pub last_long_at: Option<DateTime<Utc>>,
    pub last_short_at: Option<DateTime<Utc>>,
    pub last_general_alert_time: Option<DateTime<Utc>>,
}

impl ConsolidatedAlertState {
    pub fn last_fired_at(&self, direction: Direction) -> Option<DateTime<Utc>> {
        match direction {
            Direction::Long => self.last_long_at,
            Direction::Short => self.last_short_at,
        }
    }

    fn set_last_fired_at(&mut self, direction: Direction, at: DateTime<Utc>) {
        match direction {
            Direction::Long => self.last_long_at = Some(at),
            Direction::Short => self.last_short_at = Some(at),
        }
    }
}

/// A consolidated alert that should be dispatched
#[derive(Debug, Clone, PartialEq)]
pub struct ConsolidatedSignal {
    pub direction: Direction,
    pub members: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ConsolidatedDetector {
    min_instruments: usize,
    direction_cooldown: Duration,
    general_cooldown: Duration,
    state: ConsolidatedAlertState,
}

impl ConsolidatedDetector {
    pub fn new(config: &AlertConfig) -> Self {
        ConsolidatedDetector {
            min_instruments: config.consolidated_min_instruments,
            direction_cooldown: config.direction_cooldown(),
            general_cooldown: config.general_cooldown(),
            state: ConsolidatedAlertState::default(),
        }
    }

    pub fn state(&self) -> &ConsolidatedAlertState {
        &self.state
    }

    /// Check the tracker and record a firing if one is due
    pub fn check(
        &mut self,
        tracker: &mut TerrainTracker,
        now: DateTime<Utc>,
    ) -> Option<ConsolidatedSignal> {
        tracker.prune(now);

        if let Some(last) = self.state.last_general_alert_time {
            if now - last < self.general_cooldown {
                debug!("Consolidated alerts cooling down since {}", last);
                return None;
            }
        }

        for direction in Direction::ALL {
            let count = tracker.count(direction);
            if count < self.min_instruments {
                continue;
            }

            let recently_fired = self
                .state
                .last_fired_at(direction)
                .is_some_and(|last| now - last <= self.direction_cooldown);
            if recently_fired {
                continue;
            }

            let members = tracker.instruments(direction);
            info!(
                "Consolidated {} terrain: {} instruments ({})",
                direction,
                count,
                members.join(", ")
            );

            self.state.set_last_fired_at(direction, now);
            self.state.last_general_alert_time = Some(now);
            return Some(ConsolidatedSignal { direction, members });
        }

        None
    }
}
