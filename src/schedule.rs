//! Weekly shutdown window
//!
//! Liquidity dries up over the weekend, so scanning stops from the configured
//! weekday/time until the end of Sunday in the schedule's timezone. The
//! latch turns the level signal into on/off transition edges.

use anyhow::Result;
use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};
use chrono_tz::Tz;

use crate::config::ScheduleConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Entered the shutdown window
    WentOff,
    /// Left the shutdown window
    CameOn,
}

#[derive(Debug, Clone)]
pub struct WeeklySchedule {
    enabled: bool,
    tz: Tz,
    weekday: Weekday,
    hour: u32,
    minute: u32,
}

impl WeeklySchedule {
    pub fn from_config(config: &ScheduleConfig) -> Result<Self> {
        Ok(WeeklySchedule {
            enabled: config.enabled,
            tz: config.tz()?,
            weekday: config.shutdown_weekday,
            hour: config.shutdown_hour,
            minute: config.shutdown_minute,
        })
    }

    pub fn tz(&self) -> Tz {
        self.tz
    }

    /// Whether `now` falls inside the shutdown window
    pub fn is_off(&self, now: DateTime<Utc>) -> bool {
        if !self.enabled {
            return false;
        }

        let local = now.with_timezone(&self.tz);
        let day = local.weekday().num_days_from_monday();
        let start = self.weekday.num_days_from_monday();

        if day == start {
            (local.hour(), local.minute()) >= (self.hour, self.minute)
        } else {
            // Days after the shutdown day, through Sunday
            day > start
        }
    }
}

/// Remembers the last observed schedule state
#[derive(Debug, Clone, Default)]
pub struct ShutdownLatch {
    off: bool,
}

impl ShutdownLatch {
    /// Feed the current level, returning a transition when it changed
    pub fn update(&mut self, off: bool) -> Option<Transition> {
        match (self.off, off) {
            (false, true) => {
                self.off = true;
                Some(Transition::WentOff)
            }
            (true, false) => {
                self.off = false;
                Some(Transition::CameOn)
            }
            _ => None,
        }
    }
}
