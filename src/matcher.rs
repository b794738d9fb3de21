use chrono::{DateTime, Datelike, TimeZone, Timelike};
use rule_model::Rule;

/// Whether `rule` may fire at `now`.
///
/// `now` is expected in the user's local timezone: both the weekday mask and
/// the minute window are evaluated against its wall-clock fields. Weekdays use
/// ISO numbering (1 = Monday .. 7 = Sunday).
pub fn is_active<Tz: TimeZone>(rule: &Rule, now: &DateTime<Tz>) -> bool {
    if !rule.enabled {
        return false;
    }
    if !rule.weekdays.contains(now.weekday()) {
        return false;
    }
    if let Some(window) = rule.window {
        let now_minutes = (now.hour() * 60 + now.minute()) as u16;
        if !window.contains_minute(now_minutes) {
            return false;
        }
    }
    true
}
