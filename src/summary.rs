//! Market-wide sentiment gauge
//!
//! Folds every classification weight of a tick into a gauge angle in
//! [-90, 90] (negative = bullish), a tint, a dominant-state label and the
//! visual intensity cues used by the dashboard.

use serde::{Deserialize, Serialize};

use crate::terrain::TerrainTracker;

/// Largest absolute classification weight
pub const MAX_WEIGHT: f64 = 10.0;

/// Angle at which the in-progress labels and visual cues start
pub const PROGRESS_ANGLE: f64 = 15.0;

/// Angle at which the euphoria labels start
pub const EUPHORIA_ANGLE: f64 = 45.0;

pub const NEUTRAL_GRAY: Rgb = Rgb::new(156, 163, 175);
pub const LONG_TINT: Rgb = Rgb::new(74, 222, 128);
pub const SHORT_TINT: Rgb = Rgb::new(248, 113, 113);
const PAUSED_GRAY: Rgb = Rgb::new(75, 85, 99);
const ASLEEP_GRAY: Rgb = Rgb::new(55, 65, 81);

const INDECISION_NOTE: &str = "Indecision (no trade) ⚖️";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Rgb { r, g, b }
    }

    /// Linear interpolation toward `target`, `t` clamped to [0, 1]
    pub fn lerp(&self, target: Rgb, t: f64) -> Rgb {
        let t = t.clamp(0.0, 1.0);
        let channel = |from: u8, to: u8| (from as f64 + (to as f64 - from as f64) * t).floor() as u8;
        Rgb {
            r: channel(self.r, target.r),
            g: channel(self.g, target.g),
            b: channel(self.b, target.b),
        }
    }
}

impl std::fmt::Display for Rgb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "rgb({}, {}, {})", self.r, self.g, self.b)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSummary {
    pub gauge_angle: f64,
    pub color: Rgb,
    pub dominant_state_label: String,
    pub terrain_note: String,
    pub saturation: f64,
    pub opacity: f64,
    pub fire_intensity: f64,
}

impl Default for MarketSummary {
    fn default() -> Self {
        MarketSummary {
            gauge_angle: 0.0,
            color: NEUTRAL_GRAY,
            dominant_state_label: "Calculating...".to_string(),
            terrain_note: INDECISION_NOTE.to_string(),
            saturation: 1.0,
            opacity: 1.0,
            fire_intensity: 0.0,
        }
    }
}

impl MarketSummary {
    /// Compute the summary for a completed tick
    ///
    /// `instrument_count` is the number of configured instrument/timeframe
    /// pairs, so the angle stays within [-90, 90] even when some were skipped.
    pub fn aggregate(weights: &[i32], instrument_count: usize, terrain: &TerrainTracker) -> Self {
        let total: i32 = weights.iter().sum();
        let max_weight = instrument_count.max(1) as f64 * MAX_WEIGHT;
        let angle = (total as f64 / max_weight) * 90.0;

        let (saturation, opacity) = saturation_and_opacity(angle);
        let terrain_note = match terrain.dominant() {
            Some(direction) => format!("{} terrain", direction),
            None => INDECISION_NOTE.to_string(),
        };
        let dominant_state_label = match terrain.dominant() {
            Some(direction) => format!("{} terrain", direction),
            None => angle_label(angle).to_string(),
        };

        MarketSummary {
            gauge_angle: angle,
            color: gauge_color(angle),
            dominant_state_label,
            terrain_note,
            saturation,
            opacity,
            fire_intensity: fire_intensity(angle),
        }
    }

    /// Placeholder while the admin switch is off
    pub fn paused() -> Self {
        MarketSummary {
            color: PAUSED_GRAY,
            dominant_state_label: "SYSTEM DISABLED 🛑".to_string(),
            terrain_note: "Waiting for manual activation...".to_string(),
            saturation: 0.0,
            fire_intensity: 0.0,
            ..MarketSummary::default()
        }
    }

    /// Placeholder during the weekly shutdown
    pub fn asleep() -> Self {
        MarketSummary {
            color: ASLEEP_GRAY,
            dominant_state_label: "SLEEP MODE 💤 (weekend)".to_string(),
            terrain_note: "Bot resting...".to_string(),
            ..MarketSummary::default()
        }
    }
}

/// Dominant label from the gauge alone
pub fn angle_label(angle: f64) -> &'static str {
    if angle >= EUPHORIA_ANGLE {
        "SHORT euphoria"
    } else if angle > PROGRESS_ANGLE {
        "SHORT in progress"
    } else if angle <= -EUPHORIA_ANGLE {
        "LONG euphoria"
    } else if angle < -PROGRESS_ANGLE {
        "LONG in progress"
    } else {
        "Indecision"
    }
}

/// Bullish cue: 0 above -15°, ramping to 1 at -90°
pub fn fire_intensity(angle: f64) -> f64 {
    if angle > -PROGRESS_ANGLE {
        0.0
    } else {
        ((angle + PROGRESS_ANGLE) / (-90.0 + PROGRESS_ANGLE)).clamp(0.0, 1.0)
    }
}

/// Bearish cue: color drains from 15° toward 90°
pub fn saturation_and_opacity(angle: f64) -> (f64, f64) {
    if angle >= PROGRESS_ANGLE {
        let factor = (angle - 90.0) / (PROGRESS_ANGLE - 90.0);
        (factor, 0.4 + 0.6 * factor)
    } else {
        (1.0, 1.0)
    }
}

/// Gray tinted toward green (bullish) or red (bearish) by the gauge magnitude
pub fn gauge_color(angle: f64) -> Rgb {
    let target = if angle < 0.0 { LONG_TINT } else { SHORT_TINT };
    NEUTRAL_GRAY.lerp(target, (angle.abs() / 90.0).min(1.0))
}
