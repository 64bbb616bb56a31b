//! Text of every outbound notification
//!
//! Messages use Telegram's HTML parse mode. Functions take the time they
//! render as an argument and never read the clock.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use itertools::Itertools;

use crate::history::{observation_emoji, HistoryEntry};
use crate::types::{Direction, MacroTrend};

/// Quote asset stripped from instrument names in market-wide messages
pub const QUOTE_ASSET: &str = "USDT";

/// Line describing the higher-timeframe trend, empty when neutral
pub fn macro_line(trend: MacroTrend, macro_timeframe: &str) -> String {
    match trend {
        MacroTrend::Bullish => format!("<b>Macro strength ({}):</b> Bullish 🚀", macro_timeframe),
        MacroTrend::Bearish => format!("<b>Macro strength ({}):</b> Bearish 🔻", macro_timeframe),
        MacroTrend::Neutral => String::new(),
    }
}

pub fn individual_alert(
    instrument: &str,
    timeframe: &str,
    price: f64,
    label: &str,
    emoji: &str,
    macro_line: &str,
) -> String {
    format!(
        "🚀 MOMENTUM ALERT\n\n 💎 <b>{} ({})</b>\n\n💰 <b>Price:</b> ${}\n📸 <b>State:</b> {} {}\n🪐 {}",
        instrument, timeframe, price, label, emoji, macro_line
    )
}

/// Members rendered without the quote asset, e.g. "BTC, ETH, SOL"
pub fn member_list(members: &[String]) -> String {
    members
        .iter()
        .map(|m| m.replace(QUOTE_ASSET, ""))
        .join(", ")
}

/// Date stamp used in consolidated alerts (dd/mm/yy in the schedule timezone)
pub fn alert_date(now: DateTime<Utc>, tz: Tz) -> String {
    now.with_timezone(&tz).format("%d/%m/%y").to_string()
}

pub fn consolidated_alert(date: &str, direction: Direction, members: &[String]) -> String {
    format!(
        "🚨 MARKET ALERT - {}\n\nIn {} terrain,\nTIME TO TRADE! 🚀🔥\n\nDominant: {}",
        date,
        direction,
        member_list(members)
    )
}

/// Rebuild an alert's text with an admin observation appended
pub fn with_observation(entry: &HistoryEntry, observation: &str) -> String {
    let note = format!("{} {}", observation, observation_emoji(observation));
    let note = note.trim_end();
    match &entry.consolidated {
        Some(details) => format!(
            "{}\n\nObservation: {}",
            consolidated_alert(&details.date, entry.signal, &details.members),
            note
        ),
        None => format!(
            "🚀 MOMENTUM ALERT\n💎 {}\n\n⏱ Timeframe: {}\n📈 State: {} {}\n Observation: {}",
            entry.instrument, entry.timeframe, entry.state_label, entry.state_emoji, note
        ),
    }
}

/// Append the local time line carried by every broadcast
pub fn stamp(text: &str, now: DateTime<Utc>, tz: Tz) -> String {
    format!(
        "{}\n\n🕒 {} ({})",
        text,
        now.with_timezone(&tz).format("%I:%M %p"),
        tz.name()
    )
}

pub fn shutdown_notice() -> &'static str {
    "💤 BOT OFF: markets lack liquidity over the weekend, see you on Monday :D"
}

pub fn wakeup_notice() -> &'static str {
    "☀️ Bot is back on! A new week of opportunities. Time to trade! 🚀"
}

pub fn admin_broadcast(message: &str) -> String {
    format!("📩 <b>ADMIN MESSAGE:</b>\n\n{}", message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::ConsolidatedDetails;
    use chrono::TimeZone;

    #[test]
    fn test_member_list_strips_quote() {
        let members = vec!["BTCUSDT".to_string(), "ETHUSDT".to_string()];
        assert_eq!(member_list(&members), "BTC, ETH");
    }

    #[test]
    fn test_alert_date_uses_timezone() {
        // 03:00 UTC is still the previous day in Lima (UTC-5)
        let now = Utc.with_ymd_and_hms(2024, 3, 6, 3, 0, 0).unwrap();
        assert_eq!(alert_date(now, chrono_tz::America::Lima), "05/03/24");
    }

    #[test]
    fn test_consolidated_observation_rebuild() {
        let entry = HistoryEntry {
            id: 1,
            time: Utc::now(),
            instrument: "MARKET".to_string(),
            timeframe: "Global".to_string(),
            signal: Direction::Short,
            state_label: "Consolidated SHORT".to_string(),
            state_emoji: "🔻".to_string(),
            slope: 0.0,
            current_price: None,
            macro_note: String::new(),
            sent_messages: vec![],
            observation: None,
            consolidated: Some(ConsolidatedDetails {
                date: "05/03/24".to_string(),
                members: vec!["SOLUSDT".to_string(), "ADAUSDT".to_string()],
            }),
        };

        let text = with_observation(&entry, "Doubtful signal");
        assert!(text.starts_with("🚨 MARKET ALERT - 05/03/24"));
        assert!(text.contains("In SHORT terrain"));
        assert!(text.contains("Dominant: SOL, ADA"));
        assert!(text.ends_with("Observation: Doubtful signal 🤔"));

        let custom = with_observation(&entry, "Whale wall at 70k");
        assert!(custom.ends_with("Observation: Whale wall at 70k"));
    }

    #[test]
    fn test_stamp_appends_local_time() {
        let now = Utc.with_ymd_and_hms(2024, 3, 8, 20, 30, 0).unwrap();
        let text = stamp("hello", now, chrono_tz::America::Lima);
        assert_eq!(text, "hello\n\n🕒 03:30 PM (America/Lima)");
    }

    #[test]
    fn test_macro_line_neutral_is_empty() {
        assert!(macro_line(MacroTrend::Neutral, "4h").is_empty());
        assert!(macro_line(MacroTrend::Bearish, "4h").contains("Bearish"));
    }
}
