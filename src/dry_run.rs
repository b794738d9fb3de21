//! Offline simulation of the schedule: the real scheduler runs against an
//! in-memory copy of the library and recording sinks, on a simulated clock.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rule_model::{FitMode, MediaRecord};

use crate::collaborators::{AccessHandle, FileAccess, WallpaperSetter};
use crate::config::Configuration;
use crate::displays::{DisplayFrame, DisplayHandle, DisplayRegistry, RawDisplay, StaticDisplays};
use crate::error::ApplyError;
use crate::library::{LibraryDocument, MemoryLibrary};
use crate::scheduler::{RuleScheduler, SchedulerDeps, TickOutcome, VideoSink};

/// One simulated evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedStep {
    pub at: DateTime<Utc>,
    pub outcome: &'static str,
    pub rule_id: Option<String>,
    pub media_id: Option<String>,
    pub video: bool,
    pub target_display_id: Option<String>,
}

impl PlannedStep {
    fn from_outcome(at: DateTime<Utc>, outcome: &TickOutcome) -> Self {
        let mut step = Self {
            at,
            outcome: outcome.label(),
            rule_id: None,
            media_id: None,
            video: false,
            target_display_id: None,
        };
        match outcome {
            TickOutcome::Applied(applied) => {
                step.rule_id = Some(applied.rule_id.clone());
                step.media_id = Some(applied.media.id.clone());
                step.video = applied.media.is_video();
                step.target_display_id = applied.target_display_id.clone();
            }
            TickOutcome::Throttled { rule_id, .. } | TickOutcome::NoCandidates { rule_id } => {
                step.rule_id = Some(rule_id.clone());
            }
            TickOutcome::NoTarget {
                rule_id,
                display_id,
            } => {
                step.rule_id = Some(rule_id.clone());
                step.target_display_id = display_id.clone();
            }
            TickOutcome::Failed {
                rule_id, media_id, ..
            } => {
                step.rule_id = rule_id.clone();
                step.media_id = media_id.clone();
            }
            _ => {}
        }
        step
    }
}

struct AcceptAll;

impl WallpaperSetter for AcceptAll {
    fn apply_image(
        &self,
        _path: &Path,
        _display: Option<&DisplayHandle>,
        _fit: FitMode,
    ) -> Result<(), ApplyError> {
        Ok(())
    }
}

impl FileAccess for AcceptAll {
    fn begin_access(&self, media: &MediaRecord) -> Result<AccessHandle, ApplyError> {
        Ok(AccessHandle::unscoped(media.location.clone()))
    }
}

impl VideoSink for AcceptAll {
    fn apply_video(
        &mut self,
        _media: &MediaRecord,
        _fit: FitMode,
        _target_display_id: Option<&str>,
    ) -> Result<usize, ApplyError> {
        Ok(1)
    }

    fn stop_all(&mut self) {}
}

/// Every display a rule targets, so single-display rules resolve offline.
fn simulated_displays(document: &LibraryDocument) -> Vec<RawDisplay> {
    let ids: BTreeSet<&str> = document
        .rules
        .iter()
        .filter_map(|rule| rule.target())
        .collect();
    ids.into_iter()
        .enumerate()
        .map(|(idx, id)| RawDisplay {
            hardware_id: None,
            name: id.to_string(),
            frame: DisplayFrame {
                x: idx as f64 * 1920.0,
                y: 0.0,
                width: 1920.0,
                height: 1080.0,
            },
            scale: 1.0,
        })
        .collect()
}

/// Runs `iterations` evaluations starting at `start`, one per tick interval.
pub fn simulate(
    cfg: &Configuration,
    document: LibraryDocument,
    start: DateTime<Utc>,
    iterations: usize,
    seed: Option<u64>,
) -> Vec<PlannedStep> {
    let displays = simulated_displays(&document);
    let deps = SchedulerDeps {
        library: Arc::new(MemoryLibrary::from_document(document)),
        setter: Arc::new(AcceptAll),
        access: Arc::new(AcceptAll),
        displays: DisplayRegistry::new(Arc::new(StaticDisplays::new(displays))),
    };
    let mut options = cfg.scheduler.clone();
    options.random_seed = seed.or(options.random_seed).or(Some(0));
    let step = ChronoDuration::from_std(options.tick_interval)
        .unwrap_or_else(|_| ChronoDuration::minutes(1));
    let mut scheduler = RuleScheduler::new(deps, options, cfg.timezone, cfg.fit_mode);
    let mut video = AcceptAll;

    let mut plan = Vec::with_capacity(iterations);
    let mut now = start;
    for idx in 0..iterations {
        let outcome = if idx == 0 {
            scheduler.start(now, &mut video)
        } else {
            scheduler.tick(now, &mut video)
        };
        plan.push(PlannedStep::from_outcome(now, &outcome));
        now += step;
    }
    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rule_model::{MediaKind, Rule};
    use std::time::Duration;

    fn document() -> LibraryDocument {
        let mut daytime = Rule::new("daytime");
        daytime.interval_minutes = Some(30);
        LibraryDocument {
            rules: vec![daytime],
            media: (0..5)
                .map(|i| MediaRecord::new(format!("m{i}"), MediaKind::Image, format!("/w/{i}.png")))
                .collect(),
        }
    }

    fn config() -> Configuration {
        let mut cfg = Configuration::default();
        cfg.scheduler.tick_interval = Duration::from_secs(600);
        cfg
    }

    #[test]
    fn plan_follows_rule_interval() {
        let start = Utc.with_ymd_and_hms(2024, 7, 15, 8, 0, 0).single().unwrap();
        let plan = simulate(&config(), document(), start, 7, Some(3));
        let outcomes: Vec<&str> = plan.iter().map(|s| s.outcome).collect();
        assert_eq!(
            outcomes,
            vec![
                "applied",
                "throttled",
                "throttled",
                "applied",
                "throttled",
                "throttled",
                "applied"
            ]
        );
        assert_eq!(plan[3].at, start + ChronoDuration::minutes(30));
    }

    #[test]
    fn same_seed_same_plan() {
        let start = Utc.with_ymd_and_hms(2024, 7, 15, 8, 0, 0).single().unwrap();
        let a = simulate(&config(), document(), start, 10, Some(99));
        let b = simulate(&config(), document(), start, 10, Some(99));
        assert_eq!(a, b);
    }

    #[test]
    fn single_display_targets_resolve_offline() {
        let mut doc = document();
        let mut pinned = Rule::new("pinned");
        pinned.priority = 10;
        pinned.scope = rule_model::RuleScope::SingleDisplay;
        pinned.target_display_id = Some("DP-3".into());
        doc.rules.push(pinned);
        let start = Utc.with_ymd_and_hms(2024, 7, 15, 8, 0, 0).single().unwrap();
        let plan = simulate(&config(), doc, start, 1, None);
        assert_eq!(plan[0].outcome, "applied");
        assert_eq!(plan[0].target_display_id.as_deref(), Some("DP-3"));
    }
}
