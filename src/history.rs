//! Capped record of fired alerts
//!
//! Newest entries first. Entries are immutable once recorded except for the
//! observation an admin can attach afterwards.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::error::AdminError;
use crate::notifier::MessageHandle;
use crate::types::Direction;

/// Observation labels offered to admins, with their emoji
pub const KNOWN_OBSERVATIONS: [(&str, &str); 5] = [
    ("Doubtful signal", "🤔"),
    ("FALSE signal", "❌"),
    ("Liquidations in favor", "💰"),
    ("Liquidations against", "💀"),
    ("Signal approved", "✅"),
];

/// Emoji for a known observation label, empty for any other text
pub fn observation_emoji(observation: &str) -> &'static str {
    KNOWN_OBSERVATIONS
        .iter()
        .find(|(label, _)| *label == observation)
        .map_or("", |(_, emoji)| *emoji)
}

/// Extra data kept for consolidated alerts so the message can be rebuilt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsolidatedDetails {
    pub date: String,
    pub members: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: u64,
    pub time: DateTime<Utc>,
    pub instrument: String,
    pub timeframe: String,
    pub signal: Direction,
    pub state_label: String,
    pub state_emoji: String,
    pub slope: f64,
    pub current_price: Option<f64>,
    pub macro_note: String,
    /// Handles of every delivered copy, used to edit them later
    pub sent_messages: Vec<MessageHandle>,
    pub observation: Option<String>,
    pub consolidated: Option<ConsolidatedDetails>,
}

impl HistoryEntry {
    pub fn is_consolidated(&self) -> bool {
        self.consolidated.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct AlertHistory {
    capacity: usize,
    next_id: u64,
    entries: VecDeque<HistoryEntry>,
}

impl AlertHistory {
    pub fn new(capacity: usize) -> Self {
        AlertHistory {
            capacity: capacity.max(1),
            next_id: 1,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    /// Record an entry, assigning its id and evicting the oldest past capacity
    pub fn record(&mut self, mut entry: HistoryEntry) -> u64 {
        entry.id = self.next_id;
        self.next_id += 1;

        self.entries.push_front(entry);
        self.entries.truncate(self.capacity);
        self.next_id - 1
    }

    /// Attach an observation to an existing entry
    pub fn annotate(&mut self, id: u64, observation: &str) -> Result<&HistoryEntry, AdminError> {
        let entry = self
            .entries
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or(AdminError::SignalNotFound(id))?;
        entry.observation = Some(observation.to_string());
        Ok(entry)
    }

    /// Entries newest first
    pub fn entries(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    pub fn to_vec(&self) -> Vec<HistoryEntry> {
        self.entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
