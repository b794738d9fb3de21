use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Error, Result, anyhow, ensure};
use chrono::{DateTime, NaiveTime, Timelike, Utc, Weekday};
use serde::{Deserialize, Serialize};

pub use media::{MediaKind, MediaRecord};
pub use rule::{FitMode, RandomStrategy, Rule, RuleRecord, RuleScope, TimeWindow, WeekdayMask};

pub const MINUTES_PER_DAY: u16 = 24 * 60;

/// Outcome stored alongside every history entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HistoryResult {
    Success,
    Failure,
}

/// One application attempt as recorded by the persistence layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct HistoryEntry {
    pub media_id: String,
    /// `None` when the wallpaper targeted every display.
    pub display_id: Option<String>,
    pub at: DateTime<Utc>,
    pub result: HistoryResult,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

macro_rules! raw_enum {
    ($ty:ident { $($variant:ident => $raw:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $raw,)+
                }
            }
        }

        impl FromStr for $ty {
            type Err = Error;

            fn from_str(value: &str) -> Result<Self> {
                match value.trim() {
                    $($raw => Ok(Self::$variant),)+
                    other => Err(anyhow!(
                        "unknown {} '{}'",
                        stringify!($ty),
                        other
                    )),
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

mod rule {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
    #[serde(rename_all = "kebab-case")]
    pub enum RuleScope {
        #[default]
        Global,
        SingleDisplay,
    }

    raw_enum!(RuleScope {
        Global => "global",
        SingleDisplay => "single-display",
    });

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
    #[serde(rename_all = "kebab-case")]
    pub enum RandomStrategy {
        #[default]
        Uniform,
        Weighted,
        AvoidRecent,
    }

    raw_enum!(RandomStrategy {
        Uniform => "uniform",
        Weighted => "weighted",
        AvoidRecent => "avoid-recent",
    });

    /// How an image or video is scaled to cover a display.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize, Deserialize)]
    #[serde(rename_all = "kebab-case")]
    pub enum FitMode {
        #[default]
        Fill,
        Fit,
        Stretch,
        Center,
        Tile,
    }

    raw_enum!(FitMode {
        Fill => "fill",
        Fit => "fit",
        Stretch => "stretch",
        Center => "center",
        Tile => "tile",
    });

    /// ISO weekday numbers (1 = Monday .. 7 = Sunday). Empty means every day.
    #[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(try_from = "Vec<u8>", into = "Vec<u8>")]
    pub struct WeekdayMask(BTreeSet<u8>);

    impl WeekdayMask {
        pub fn every_day() -> Self {
            Self::default()
        }

        pub fn is_every_day(&self) -> bool {
            self.0.is_empty()
        }

        pub fn contains(&self, weekday: Weekday) -> bool {
            self.0.is_empty() || self.0.contains(&(weekday.number_from_monday() as u8))
        }

        pub fn days(&self) -> impl Iterator<Item = u8> + '_ {
            self.0.iter().copied()
        }
    }

    impl TryFrom<Vec<u8>> for WeekdayMask {
        type Error = Error;

        fn try_from(days: Vec<u8>) -> Result<Self> {
            for day in &days {
                ensure!(
                    (1..=7).contains(day),
                    "weekday {} is outside 1..=7 (1 = Monday)",
                    day
                );
            }
            Ok(Self(days.into_iter().collect()))
        }
    }

    impl From<WeekdayMask> for Vec<u8> {
        fn from(mask: WeekdayMask) -> Self {
            mask.0.into_iter().collect()
        }
    }

    /// Active window expressed in minutes after local midnight.
    ///
    /// `start > end` describes an overnight window that wraps past midnight.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TimeWindow {
        start: u16,
        end: u16,
    }

    impl TimeWindow {
        pub fn new(start_minutes: u16, end_minutes: u16) -> Result<Self> {
            ensure!(
                start_minutes < MINUTES_PER_DAY,
                "start-minutes must be below {MINUTES_PER_DAY} (got {start_minutes})"
            );
            ensure!(
                end_minutes < MINUTES_PER_DAY,
                "end-minutes must be below {MINUTES_PER_DAY} (got {end_minutes})"
            );
            Ok(Self {
                start: start_minutes,
                end: end_minutes,
            })
        }

        pub fn start_minutes(&self) -> u16 {
            self.start
        }

        pub fn end_minutes(&self) -> u16 {
            self.end
        }

        pub fn wraps_midnight(&self) -> bool {
            self.start > self.end
        }

        /// Both bounds are inclusive.
        pub fn contains_minute(&self, minute: u16) -> bool {
            if self.wraps_midnight() {
                !(minute > self.end && minute < self.start)
            } else {
                !(minute < self.start || minute > self.end)
            }
        }

        fn parse_literal(value: &str) -> Result<u16> {
            let trimmed = value.trim();
            for format in ["%H:%M", "%H:%M:%S"] {
                if let Ok(parsed) = NaiveTime::parse_from_str(trimmed, format) {
                    return Ok((parsed.hour() * 60 + parsed.minute()) as u16);
                }
            }
            Err(anyhow!("invalid time literal '{value}'"))
        }
    }

    /// A persisted scheduling policy.
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(try_from = "RuleRecord", into = "RuleRecord")]
    pub struct Rule {
        pub id: String,
        pub name: Option<String>,
        pub scope: RuleScope,
        pub target_display_id: Option<String>,
        pub priority: i32,
        pub enabled: bool,
        pub interval_minutes: Option<u32>,
        pub weekdays: WeekdayMask,
        pub window: Option<TimeWindow>,
        pub strategy: RandomStrategy,
        pub media_mix_ratio: f64,
        pub collection_id: Option<String>,
        pub fit_mode: Option<FitMode>,
    }

    impl Rule {
        /// An enabled, global, always-active rule with no interval override.
        pub fn new(id: impl Into<String>) -> Self {
            Self {
                id: id.into(),
                name: None,
                scope: RuleScope::Global,
                target_display_id: None,
                priority: 0,
                enabled: true,
                interval_minutes: None,
                weekdays: WeekdayMask::every_day(),
                window: None,
                strategy: RandomStrategy::Uniform,
                media_mix_ratio: 0.0,
                collection_id: None,
                fit_mode: None,
            }
        }

        pub fn label(&self) -> &str {
            self.name
                .as_deref()
                .filter(|name| !name.trim().is_empty())
                .unwrap_or(&self.id)
        }

        /// Display the rule should be applied to; `None` means every display.
        pub fn target(&self) -> Option<&str> {
            match self.scope {
                RuleScope::Global => None,
                RuleScope::SingleDisplay => self.target_display_id.as_deref(),
            }
        }
    }

    /// Storage shape of a rule: enums as kebab-case strings, optional bounds as
    /// loose fields. Converting into [`Rule`] enforces the invariants.
    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    #[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
    pub struct RuleRecord {
        pub id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub name: Option<String>,
        pub scope: RuleScope,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub target_display_id: Option<String>,
        pub priority: i32,
        #[serde(default = "RuleRecord::default_enabled")]
        pub enabled: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub interval_minutes: Option<u32>,
        pub weekdays: Vec<u8>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub start_minutes: Option<u16>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub end_minutes: Option<u16>,
        /// Human-friendly alternative to the minute fields: `["23:00", "06:00"]`.
        #[serde(skip_serializing)]
        pub window: Option<(String, String)>,
        pub strategy: RandomStrategy,
        pub media_mix_ratio: f64,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub collection_id: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub fit_mode: Option<FitMode>,
    }

    impl RuleRecord {
        const fn default_enabled() -> bool {
            true
        }

        fn resolve_window(&self) -> Result<Option<TimeWindow>> {
            let minutes = match (self.start_minutes, self.end_minutes) {
                (Some(start), Some(end)) => Some((start, end)),
                (None, None) => None,
                _ => {
                    return Err(anyhow!(
                        "rule {}: start-minutes and end-minutes must be set together",
                        self.id
                    ));
                }
            };
            match (minutes, &self.window) {
                (Some(_), Some(_)) => Err(anyhow!(
                    "rule {}: use either window or start-minutes/end-minutes, not both",
                    self.id
                )),
                (Some((start, end)), None) => TimeWindow::new(start, end).map(Some),
                (None, Some((start, end))) => TimeWindow::new(
                    TimeWindow::parse_literal(start)?,
                    TimeWindow::parse_literal(end)?,
                )
                .map(Some),
                (None, None) => Ok(None),
            }
        }
    }

    impl TryFrom<RuleRecord> for Rule {
        type Error = Error;

        fn try_from(record: RuleRecord) -> Result<Self> {
            ensure!(!record.id.trim().is_empty(), "rule id must not be blank");
            ensure!(
                record.media_mix_ratio.is_finite()
                    && (0.0..=1.0).contains(&record.media_mix_ratio),
                "rule {}: media-mix-ratio must be within [0, 1]",
                record.id
            );
            if record.scope == RuleScope::SingleDisplay {
                ensure!(
                    record
                        .target_display_id
                        .as_deref()
                        .is_some_and(|id| !id.trim().is_empty()),
                    "rule {}: single-display scope requires target-display-id",
                    record.id
                );
            }
            let window = record.resolve_window()?;
            let weekdays = WeekdayMask::try_from(record.weekdays.clone())
                .map_err(|err| anyhow!("rule {}: {err}", record.id))?;
            Ok(Self {
                id: record.id,
                name: record.name,
                scope: record.scope,
                target_display_id: record.target_display_id,
                priority: record.priority,
                enabled: record.enabled,
                interval_minutes: record.interval_minutes,
                weekdays,
                window,
                strategy: record.strategy,
                media_mix_ratio: record.media_mix_ratio,
                collection_id: record.collection_id,
                fit_mode: record.fit_mode,
            })
        }
    }

    impl From<Rule> for RuleRecord {
        fn from(rule: Rule) -> Self {
            Self {
                id: rule.id,
                name: rule.name,
                scope: rule.scope,
                target_display_id: rule.target_display_id,
                priority: rule.priority,
                enabled: rule.enabled,
                interval_minutes: rule.interval_minutes,
                weekdays: rule.weekdays.into(),
                start_minutes: rule.window.map(|w| w.start_minutes()),
                end_minutes: rule.window.map(|w| w.end_minutes()),
                window: None,
                strategy: rule.strategy,
                media_mix_ratio: rule.media_mix_ratio,
                collection_id: rule.collection_id,
                fit_mode: rule.fit_mode,
            }
        }
    }
}

mod media {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(rename_all = "kebab-case")]
    pub enum MediaKind {
        Image,
        Video,
    }

    raw_enum!(MediaKind {
        Image => "image",
        Video => "video",
    });

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "kebab-case")]
    pub struct MediaRecord {
        pub id: String,
        #[serde(rename = "type")]
        pub kind: MediaKind,
        pub location: PathBuf,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub last_used_at: Option<DateTime<Utc>>,
        #[serde(default)]
        pub rating: i32,
        #[serde(default)]
        pub favorite: bool,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        pub collections: Vec<String>,
    }

    impl MediaRecord {
        pub fn new(id: impl Into<String>, kind: MediaKind, location: impl Into<PathBuf>) -> Self {
            Self {
                id: id.into(),
                kind,
                location: location.into(),
                last_used_at: None,
                rating: 0,
                favorite: false,
                collections: Vec::new(),
            }
        }

        pub fn is_video(&self) -> bool {
            self.kind == MediaKind::Video
        }

        pub fn in_collection(&self, collection_id: &str) -> bool {
            self.collections.iter().any(|c| c == collection_id)
        }
    }
}
