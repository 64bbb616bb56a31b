//! Sliding-window record of instruments in a confirmed terrain
//!
//! An instrument counts toward a direction only if it was seen in that
//! terrain, with macro confirmation, within the last `window`.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::types::Direction;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerrainEntry {
    pub instrument: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct TerrainTracker {
    window: Duration,
    long: Vec<TerrainEntry>,
    short: Vec<TerrainEntry>,
}

impl TerrainTracker {
    pub fn new(window: Duration) -> Self {
        TerrainTracker {
            window,
            long: Vec::new(),
            short: Vec::new(),
        }
    }

    fn list(&self, direction: Direction) -> &Vec<TerrainEntry> {
        match direction {
            Direction::Long => &self.long,
            Direction::Short => &self.short,
        }
    }

    fn list_mut(&mut self, direction: Direction) -> &mut Vec<TerrainEntry> {
        match direction {
            Direction::Long => &mut self.long,
            Direction::Short => &mut self.short,
        }
    }

    /// Insert `instrument`, or refresh its timestamp in place
    pub fn track(&mut self, direction: Direction, instrument: &str, now: DateTime<Utc>) {
        let list = self.list_mut(direction);
        match list.iter_mut().find(|e| e.instrument == instrument) {
            Some(entry) => entry.timestamp = now,
            None => list.push(TerrainEntry {
                instrument: instrument.to_string(),
                timestamp: now,
            }),
        }
    }

    /// Drop entries that fell out of the window
    pub fn prune(&mut self, now: DateTime<Utc>) {
        let window = self.window;
        for direction in Direction::ALL {
            self.list_mut(direction)
                .retain(|e| now - e.timestamp < window);
        }
    }

    pub fn entries(&self, direction: Direction) -> &[TerrainEntry] {
        self.list(direction)
    }

    pub fn count(&self, direction: Direction) -> usize {
        self.list(direction).len()
    }

    pub fn instruments(&self, direction: Direction) -> Vec<String> {
        self.list(direction)
            .iter()
            .map(|e| e.instrument.clone())
            .collect()
    }

    /// Direction with the most members, LONG on ties, `None` when both are empty
    pub fn dominant(&self) -> Option<Direction> {
        match (self.long.len(), self.short.len()) {
            (0, 0) => None,
            (long, short) if long >= short => Some(Direction::Long),
            _ => Some(Direction::Short),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 5, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_refresh_does_not_duplicate() {
        let mut tracker = TerrainTracker::new(Duration::hours(1));
        tracker.track(Direction::Long, "BTCUSDT", now() - Duration::minutes(30));
        tracker.track(Direction::Long, "BTCUSDT", now());

        assert_eq!(tracker.count(Direction::Long), 1);
        assert_eq!(tracker.entries(Direction::Long)[0].timestamp, now());
        assert_eq!(tracker.count(Direction::Short), 0);
    }

    #[test]
    fn test_prune_drops_stale_entries() {
        let mut tracker = TerrainTracker::new(Duration::hours(1));
        tracker.track(Direction::Long, "BTCUSDT", now() - Duration::minutes(70));
        tracker.track(Direction::Long, "ETHUSDT", now() - Duration::minutes(59));
        tracker.track(Direction::Short, "SOLUSDT", now() - Duration::minutes(60));

        tracker.prune(now());
        assert_eq!(tracker.instruments(Direction::Long), vec!["ETHUSDT"]);
        assert_eq!(tracker.count(Direction::Short), 0);
    }

    #[test]
    fn test_refresh_keeps_entry_alive() {
        let mut tracker = TerrainTracker::new(Duration::hours(1));
        tracker.track(Direction::Short, "ADAUSDT", now() - Duration::minutes(90));
        tracker.track(Direction::Short, "ADAUSDT", now() - Duration::minutes(5));
        tracker.prune(now());
        assert_eq!(tracker.count(Direction::Short), 1);
    }

    #[test]
    fn test_dominant_prefers_long_on_tie() {
        let mut tracker = TerrainTracker::new(Duration::hours(1));
        assert_eq!(tracker.dominant(), None);

        tracker.track(Direction::Short, "ADAUSDT", now());
        assert_eq!(tracker.dominant(), Some(Direction::Short));

        tracker.track(Direction::Long, "BTCUSDT", now());
        assert_eq!(tracker.dominant(), Some(Direction::Long));
    }
}
