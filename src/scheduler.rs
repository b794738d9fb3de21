//! Rule-driven wallpaper scheduler.
//!
//! On each evaluation the scheduler picks the highest-priority active rule,
//! lets the selector draw one media record from the rule's pool and hands it
//! to the image setter or the video manager. A single `last_applied_at`
//! drives both the debounce guard and the winning rule's interval.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use chrono_tz::Tz;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rule_model::{FitMode, HistoryEntry, HistoryResult, MediaRecord, Rule};
use tracing::{debug, info, warn};

use crate::collaborators::{FileAccess, MediaLibrary, WallpaperSetter};
use crate::config::SchedulerOptions;
use crate::displays::DisplayRegistry;
use crate::error::ApplyError;
use crate::matcher;
use crate::selector;

/// Where video media goes. Implemented by the video wallpaper manager.
pub trait VideoSink {
    /// Starts `media` on the target displays and returns how many now play it.
    /// An unresolved target is not an error; it yields zero.
    fn apply_video(
        &mut self,
        media: &MediaRecord,
        fit: FitMode,
        target_display_id: Option<&str>,
    ) -> Result<usize, ApplyError>;

    /// Tears down any running video session. Must be a no-op when idle.
    fn stop_all(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
}

/// What one evaluation did.
#[derive(Debug)]
pub enum TickOutcome {
    /// The scheduler is stopped.
    Idle,
    /// Too close to the previous application.
    Debounced,
    NoActiveRule,
    /// The winning rule's interval has not elapsed yet.
    Throttled {
        rule_id: String,
        remaining: ChronoDuration,
    },
    NoCandidates { rule_id: String },
    /// The rule's display is not attached; nothing was applied or recorded.
    NoTarget {
        rule_id: String,
        display_id: Option<String>,
    },
    Applied(AppliedWallpaper),
    Failed {
        rule_id: Option<String>,
        media_id: Option<String>,
        error: ApplyError,
    },
}

impl TickOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, TickOutcome::Applied(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            TickOutcome::Idle => "idle",
            TickOutcome::Debounced => "debounced",
            TickOutcome::NoActiveRule => "no-active-rule",
            TickOutcome::Throttled { .. } => "throttled",
            TickOutcome::NoCandidates { .. } => "no-candidates",
            TickOutcome::NoTarget { .. } => "no-target",
            TickOutcome::Applied(_) => "applied",
            TickOutcome::Failed { .. } => "failed",
        }
    }

    /// The error behind an evaluation that wanted to apply something and could not.
    pub fn into_error(self) -> Option<ApplyError> {
        match self {
            TickOutcome::Failed { error, .. } => Some(error),
            TickOutcome::NoCandidates { rule_id } => Some(ApplyError::NoCandidates(rule_id)),
            TickOutcome::NoTarget {
                display_id: Some(id),
                ..
            } => Some(ApplyError::DisplayNotFound(id)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppliedWallpaper {
    pub rule_id: String,
    pub media: MediaRecord,
    pub target_display_id: Option<String>,
    pub fit: FitMode,
    pub at: DateTime<Utc>,
}

/// Collaborators the scheduler calls out to.
#[derive(Clone)]
pub struct SchedulerDeps {
    pub library: Arc<dyn MediaLibrary>,
    pub setter: Arc<dyn WallpaperSetter>,
    pub access: Arc<dyn FileAccess>,
    pub displays: DisplayRegistry,
}

enum Dispatch {
    Applied,
    NoTarget,
}

pub struct RuleScheduler {
    deps: SchedulerDeps,
    options: SchedulerOptions,
    timezone: Tz,
    default_fit: FitMode,
    rng: StdRng,
    state: SchedulerState,
    last_applied_at: Option<DateTime<Utc>>,
}

impl RuleScheduler {
    pub fn new(
        deps: SchedulerDeps,
        options: SchedulerOptions,
        timezone: Tz,
        default_fit: FitMode,
    ) -> Self {
        let rng = match options.random_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            deps,
            options,
            timezone,
            default_fit,
            rng,
            state: SchedulerState::Idle,
            last_applied_at: None,
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == SchedulerState::Running
    }

    pub fn last_applied_at(&self) -> Option<DateTime<Utc>> {
        self.last_applied_at
    }

    pub fn tick_interval(&self) -> Duration {
        self.options.tick_interval
    }

    /// Enters `Running` and evaluates once immediately. Restarts if already running.
    pub fn start(&mut self, now: DateTime<Utc>, video: &mut dyn VideoSink) -> TickOutcome {
        if self.is_running() {
            self.stop();
        }
        self.state = SchedulerState::Running;
        info!(
            tick_interval = ?self.options.tick_interval,
            timezone = %self.timezone,
            "scheduler started"
        );
        self.apply_once(now, video)
    }

    pub fn stop(&mut self) {
        if self.state == SchedulerState::Running {
            self.state = SchedulerState::Idle;
            info!("scheduler stopped");
        }
    }

    /// Periodic trigger; does nothing while stopped.
    pub fn tick(&mut self, now: DateTime<Utc>, video: &mut dyn VideoSink) -> TickOutcome {
        if !self.is_running() {
            return TickOutcome::Idle;
        }
        self.apply_once(now, video)
    }

    pub fn apply_once(&mut self, now: DateTime<Utc>, video: &mut dyn VideoSink) -> TickOutcome {
        if let Some(last) = self.last_applied_at {
            let guard = ChronoDuration::from_std(self.options.guard_interval)
                .unwrap_or_else(|_| ChronoDuration::zero());
            if now - last < guard {
                debug!(since_last = %(now - last), "evaluation debounced");
                return TickOutcome::Debounced;
            }
        }

        let outcome = self.evaluate(now, video);

        match &outcome {
            TickOutcome::Applied(applied) => info!(
                rule = %applied.rule_id,
                media = %applied.media.id,
                display = applied.target_display_id.as_deref().unwrap_or("all"),
                fit = %applied.fit,
                "wallpaper applied"
            ),
            TickOutcome::Failed {
                rule_id,
                media_id,
                error,
            } => warn!(
                rule = rule_id.as_deref(),
                media = media_id.as_deref(),
                kind = error.kind(),
                error = %error,
                "wallpaper application failed"
            ),
            other => debug!(outcome = other.label(), "evaluation finished"),
        }
        outcome
    }

    fn evaluate(&mut self, now: DateTime<Utc>, video: &mut dyn VideoSink) -> TickOutcome {
        let rules = match self.deps.library.fetch_rules() {
            Ok(rules) => rules,
            Err(err) => {
                return TickOutcome::Failed {
                    rule_id: None,
                    media_id: None,
                    error: ApplyError::Store(err.context("failed to fetch rules")),
                };
            }
        };

        let Some(rule) = self.winning_rule(rules, now) else {
            return TickOutcome::NoActiveRule;
        };

        if let Some(last) = self.last_applied_at {
            let interval = self.required_interval(&rule);
            let elapsed = now - last;
            if elapsed < interval {
                return TickOutcome::Throttled {
                    rule_id: rule.id,
                    remaining: interval - elapsed,
                };
            }
        }

        let pool = match self
            .deps
            .library
            .fetch_media_pool(rule.collection_id.as_deref())
        {
            Ok(pool) => pool,
            Err(err) => {
                return TickOutcome::Failed {
                    rule_id: Some(rule.id),
                    media_id: None,
                    error: ApplyError::Store(err.context("failed to fetch media pool")),
                };
            }
        };

        let Some(media) = selector::pick_one(&rule, &pool, now, &mut self.rng).cloned() else {
            debug!(rule = %rule.id, pool = pool.len(), "no candidate media for rule");
            return TickOutcome::NoCandidates { rule_id: rule.id };
        };

        let fit = rule.fit_mode.unwrap_or(self.default_fit);
        let target_id = rule.target().map(str::to_string);
        match self.apply_media(&media, target_id.as_deref(), fit, video) {
            Ok(Dispatch::NoTarget) => {
                warn!(
                    rule = %rule.id,
                    target = target_id.as_deref().unwrap_or("all"),
                    "target display not attached; skipping"
                );
                TickOutcome::NoTarget {
                    rule_id: rule.id,
                    display_id: target_id,
                }
            }
            Ok(Dispatch::Applied) => {
                self.record_success(media.clone(), target_id.clone(), now);
                TickOutcome::Applied(AppliedWallpaper {
                    rule_id: rule.id,
                    media,
                    target_display_id: target_id,
                    fit,
                    at: now,
                })
            }
            Err(error) => {
                self.record_failure(&media, target_id, &error, now);
                TickOutcome::Failed {
                    rule_id: Some(rule.id),
                    media_id: Some(media.id),
                    error,
                }
            }
        }
    }

    /// Highest-priority active rule; ties keep the order the library returned.
    fn winning_rule(&self, rules: Vec<Rule>, now: DateTime<Utc>) -> Option<Rule> {
        let local = now.with_timezone(&self.timezone);
        let mut active: Vec<Rule> = rules
            .into_iter()
            .filter(|rule| matcher::is_active(rule, &local))
            .collect();
        active.sort_by(|a, b| b.priority.cmp(&a.priority));
        debug!(
            active = active.len(),
            ids = ?active.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(),
            "active rules"
        );
        active.into_iter().next()
    }

    fn required_interval(&self, rule: &Rule) -> ChronoDuration {
        let minutes = rule
            .interval_minutes
            .unwrap_or(self.options.default_interval_minutes)
            .max(1);
        ChronoDuration::minutes(i64::from(minutes))
    }

    fn apply_media(
        &self,
        media: &MediaRecord,
        target_id: Option<&str>,
        fit: FitMode,
        video: &mut dyn VideoSink,
    ) -> Result<Dispatch, ApplyError> {
        if media.is_video() {
            // The manager keeps the request, so a returning display picks it up on rebuild.
            return match video.apply_video(media, fit, target_id)? {
                0 => Ok(Dispatch::NoTarget),
                _ => Ok(Dispatch::Applied),
            };
        }

        let target = match target_id {
            Some(id) => match self.deps.displays.by_id(id) {
                Some(display) => Some(display),
                None => return Ok(Dispatch::NoTarget),
            },
            None => None,
        };

        video.stop_all();
        let access = self.deps.access.begin_access(media)?;
        let result = self
            .deps
            .setter
            .apply_image(access.path(), target.as_ref(), fit);
        access.release();
        result.map(|()| Dispatch::Applied)
    }

    fn record_success(
        &mut self,
        mut media: MediaRecord,
        display_id: Option<String>,
        now: DateTime<Utc>,
    ) {
        media.last_used_at = Some(now);
        if let Err(err) = self.deps.library.save(&media) {
            warn!(media = %media.id, error = ?err, "failed to persist last-used timestamp");
        }
        self.append_history(HistoryEntry {
            media_id: media.id,
            display_id,
            at: now,
            result: HistoryResult::Success,
            error: None,
        });
        self.last_applied_at = Some(now);
    }

    fn record_failure(
        &self,
        media: &MediaRecord,
        display_id: Option<String>,
        error: &ApplyError,
        now: DateTime<Utc>,
    ) {
        self.append_history(HistoryEntry {
            media_id: media.id.clone(),
            display_id,
            at: now,
            result: HistoryResult::Failure,
            error: Some(error.to_string()),
        });
    }

    fn append_history(&self, entry: HistoryEntry) {
        if let Err(err) = self.deps.library.append_history(entry) {
            warn!(error = ?err, "failed to append history entry");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::AccessHandle;
    use crate::displays::{DisplayFrame, DisplayHandle, RawDisplay, StaticDisplays};
    use crate::library::MemoryLibrary;
    use chrono::TimeZone;
    use rule_model::{MediaKind, RuleScope, TimeWindow};
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSetter {
        calls: Mutex<Vec<(PathBuf, Option<String>, FitMode)>>,
        fail: bool,
    }

    impl WallpaperSetter for RecordingSetter {
        fn apply_image(
            &self,
            path: &Path,
            display: Option<&DisplayHandle>,
            fit: FitMode,
        ) -> Result<(), ApplyError> {
            if self.fail {
                return Err(ApplyError::PlatformApplyFailed("swww exited 1".into()));
            }
            self.calls.lock().unwrap().push((
                path.to_path_buf(),
                display.map(|d| d.id.clone()),
                fit,
            ));
            Ok(())
        }
    }

    struct OpenAccess;

    impl FileAccess for OpenAccess {
        fn begin_access(&self, media: &MediaRecord) -> Result<AccessHandle, ApplyError> {
            Ok(AccessHandle::unscoped(media.location.clone()))
        }
    }

    struct RecordingVideo {
        applied: Vec<(String, Option<String>)>,
        stops: usize,
        playing_on: usize,
    }

    impl Default for RecordingVideo {
        fn default() -> Self {
            Self {
                applied: Vec::new(),
                stops: 0,
                playing_on: 1,
            }
        }
    }

    impl VideoSink for RecordingVideo {
        fn apply_video(
            &mut self,
            media: &MediaRecord,
            _fit: FitMode,
            target_display_id: Option<&str>,
        ) -> Result<usize, ApplyError> {
            self.applied
                .push((media.id.clone(), target_display_id.map(str::to_string)));
            Ok(self.playing_on)
        }

        fn stop_all(&mut self) {
            self.stops += 1;
        }
    }

    fn at(hour: u32, minute: u32, second: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 7, 15, hour, minute, second)
            .single()
            .unwrap()
    }

    fn rule(id: &str, priority: i32, interval: u32) -> Rule {
        let mut rule = Rule::new(id);
        rule.priority = priority;
        rule.interval_minutes = Some(interval);
        rule
    }

    fn monitor(id: u32) -> RawDisplay {
        RawDisplay {
            hardware_id: Some(id),
            name: format!("DP-{id}"),
            frame: DisplayFrame {
                x: 0.0,
                y: 0.0,
                width: 2560.0,
                height: 1440.0,
            },
            scale: 1.0,
        }
    }

    struct Fixture {
        library: Arc<MemoryLibrary>,
        setter: Arc<RecordingSetter>,
        scheduler: RuleScheduler,
    }

    fn fixture_with(rules: Vec<Rule>, media: Vec<MediaRecord>, setter: RecordingSetter) -> Fixture {
        let library = Arc::new(MemoryLibrary::new(rules, media));
        let setter = Arc::new(setter);
        let deps = SchedulerDeps {
            library: library.clone(),
            setter: setter.clone(),
            access: Arc::new(OpenAccess),
            displays: DisplayRegistry::new(Arc::new(StaticDisplays::new(vec![monitor(7)]))),
        };
        let options = SchedulerOptions {
            random_seed: Some(1),
            ..SchedulerOptions::default()
        };
        Fixture {
            library,
            setter,
            scheduler: RuleScheduler::new(deps, options, Tz::UTC, FitMode::Fill),
        }
    }

    fn fixture(rules: Vec<Rule>, media: Vec<MediaRecord>) -> Fixture {
        fixture_with(rules, media, RecordingSetter::default())
    }

    fn images(ids: &[&str]) -> Vec<MediaRecord> {
        ids.iter()
            .map(|id| MediaRecord::new(*id, MediaKind::Image, format!("/walls/{id}.png")))
            .collect()
    }

    #[test]
    fn highest_priority_rule_wins() {
        let mut f = fixture(vec![rule("b", 2, 10), rule("a", 5, 30)], images(&["x"]));
        let mut video = RecordingVideo::default();
        match f.scheduler.apply_once(at(9, 0, 0), &mut video) {
            TickOutcome::Applied(applied) => assert_eq!(applied.rule_id, "a"),
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(f.scheduler.last_applied_at(), Some(at(9, 0, 0)));
        assert_eq!(video.stops, 1);
    }

    #[test]
    fn ties_keep_fetch_order() {
        let mut first = rule("first", 3, 10);
        first.collection_id = Some("one".into());
        let mut second = rule("second", 3, 10);
        second.collection_id = Some("two".into());
        let mut media = images(&["p", "q"]);
        media[0].collections = vec!["one".into()];
        media[1].collections = vec!["two".into()];
        let mut f = fixture(vec![first, second], media);
        let outcome = f.scheduler.apply_once(at(9, 0, 0), &mut RecordingVideo::default());
        match outcome {
            TickOutcome::Applied(applied) => {
                assert_eq!(applied.rule_id, "first");
                assert_eq!(applied.media.id, "p");
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn debounce_blocks_rapid_reevaluation() {
        let mut f = fixture(vec![rule("a", 1, 1)], images(&["x", "y"]));
        let mut video = RecordingVideo::default();
        assert!(f.scheduler.apply_once(at(9, 0, 0), &mut video).is_applied());
        assert!(matches!(
            f.scheduler.apply_once(at(9, 0, 10), &mut video),
            TickOutcome::Debounced
        ));
        assert_eq!(f.setter.calls.lock().unwrap().len(), 1);
    }

    #[test]
    fn winning_rule_interval_throttles() {
        let mut f = fixture(vec![rule("a", 1, 30)], images(&["x"]));
        let mut video = RecordingVideo::default();
        assert!(f.scheduler.apply_once(at(9, 0, 0), &mut video).is_applied());
        match f.scheduler.apply_once(at(9, 10, 0), &mut video) {
            TickOutcome::Throttled { rule_id, remaining } => {
                assert_eq!(rule_id, "a");
                assert_eq!(remaining, ChronoDuration::minutes(20));
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert!(f.scheduler.apply_once(at(9, 30, 0), &mut video).is_applied());
    }

    #[test]
    fn zero_interval_is_clamped_to_one_minute() {
        let mut f = fixture(vec![rule("a", 1, 0)], images(&["x"]));
        let mut video = RecordingVideo::default();
        assert!(f.scheduler.apply_once(at(9, 0, 0), &mut video).is_applied());
        assert!(matches!(
            f.scheduler.apply_once(at(9, 0, 45), &mut video),
            TickOutcome::Throttled { .. }
        ));
        assert!(f.scheduler.apply_once(at(9, 1, 0), &mut video).is_applied());
    }

    #[test]
    fn inactive_rules_yield_no_active_rule() {
        let mut night = rule("night", 1, 10);
        night.window = Some(TimeWindow::new(22 * 60, 6 * 60).unwrap());
        let mut f = fixture(vec![night], images(&["x"]));
        assert!(matches!(
            f.scheduler.apply_once(at(12, 0, 0), &mut RecordingVideo::default()),
            TickOutcome::NoActiveRule
        ));
    }

    #[test]
    fn empty_pool_is_no_candidates() {
        let mut f = fixture(vec![rule("a", 1, 10)], Vec::new());
        assert!(matches!(
            f.scheduler.apply_once(at(9, 0, 0), &mut RecordingVideo::default()),
            TickOutcome::NoCandidates { .. }
        ));
        assert!(f.library.history().is_empty());
    }

    #[test]
    fn success_persists_last_used_and_history() {
        let mut f = fixture(vec![rule("a", 1, 10)], images(&["x"]));
        f.scheduler
            .apply_once(at(9, 0, 0), &mut RecordingVideo::default());
        let saved = f.library.media("x").unwrap();
        assert_eq!(saved.last_used_at, Some(at(9, 0, 0)));
        let history = f.library.history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].result, HistoryResult::Success);
        assert_eq!(history[0].display_id, None);
    }

    #[test]
    fn failure_keeps_last_applied_and_logs_history() {
        let setter = RecordingSetter {
            fail: true,
            ..RecordingSetter::default()
        };
        let mut f = fixture_with(vec![rule("a", 1, 10)], images(&["x"]), setter);
        let outcome = f
            .scheduler
            .apply_once(at(9, 0, 0), &mut RecordingVideo::default());
        assert!(matches!(
            outcome,
            TickOutcome::Failed {
                error: ApplyError::PlatformApplyFailed(_),
                ..
            }
        ));
        assert_eq!(f.scheduler.last_applied_at(), None);
        let history = f.library.history();
        assert_eq!(history[0].result, HistoryResult::Failure);
        assert!(history[0].error.as_deref().unwrap().contains("swww"));
    }

    #[test]
    fn single_display_rule_targets_resolved_display() {
        let mut pinned = rule("pinned", 1, 10);
        pinned.scope = RuleScope::SingleDisplay;
        pinned.target_display_id = Some("7".into());
        pinned.fit_mode = Some(FitMode::Center);
        let mut f = fixture(vec![pinned], images(&["x"]));
        assert!(
            f.scheduler
                .apply_once(at(9, 0, 0), &mut RecordingVideo::default())
                .is_applied()
        );
        let calls = f.setter.calls.lock().unwrap();
        assert_eq!(calls[0].1.as_deref(), Some("7"));
        assert_eq!(calls[0].2, FitMode::Center);
    }

    #[test]
    fn missing_image_target_is_skipped_without_history() {
        let mut pinned = rule("pinned", 1, 1);
        pinned.scope = RuleScope::SingleDisplay;
        pinned.target_display_id = Some("404".into());
        let mut f = fixture(vec![pinned], images(&["x"]));
        let mut video = RecordingVideo::default();
        for minute in 0..5 {
            match f.scheduler.apply_once(at(9, minute, 0), &mut video) {
                TickOutcome::NoTarget { rule_id, display_id } => {
                    assert_eq!(rule_id, "pinned");
                    assert_eq!(display_id.as_deref(), Some("404"));
                }
                other => panic!("unexpected outcome {other:?}"),
            }
        }
        assert!(f.library.history().is_empty());
        assert!(f.setter.calls.lock().unwrap().is_empty());
        assert_eq!(video.stops, 0, "a skipped image must not tear down video");
        assert_eq!(f.scheduler.last_applied_at(), None);
    }

    #[test]
    fn missing_video_target_reaches_the_sink_but_records_nothing() {
        let mut pinned = rule("pinned", 1, 1);
        pinned.scope = RuleScope::SingleDisplay;
        pinned.target_display_id = Some("404".into());
        pinned.media_mix_ratio = 1.0;
        let media = vec![MediaRecord::new("clip", MediaKind::Video, "/walls/clip.mp4")];
        let mut f = fixture(vec![pinned], media);
        let mut video = RecordingVideo {
            playing_on: 0,
            ..RecordingVideo::default()
        };
        for minute in 0..10 {
            let outcome = f.scheduler.apply_once(at(9, minute, 0), &mut video);
            assert_eq!(outcome.label(), "no-target");
        }
        assert_eq!(video.applied.len(), 10);
        assert_eq!(video.applied[0].1.as_deref(), Some("404"));
        assert!(f.library.history().is_empty());
        assert_eq!(f.scheduler.last_applied_at(), None);
    }

    #[test]
    fn missing_target_maps_to_not_found() {
        let outcome = TickOutcome::NoTarget {
            rule_id: "pinned".into(),
            display_id: Some("404".into()),
        };
        assert_eq!(outcome.into_error().unwrap().kind(), "not-found");
    }

    #[test]
    fn video_media_goes_to_video_sink() {
        let mut motion = rule("motion", 1, 10);
        motion.media_mix_ratio = 1.0;
        let media = vec![MediaRecord::new("clip", MediaKind::Video, "/walls/clip.mp4")];
        let mut f = fixture(vec![motion], media);
        let mut video = RecordingVideo::default();
        assert!(f.scheduler.apply_once(at(9, 0, 0), &mut video).is_applied());
        assert_eq!(video.applied, vec![("clip".to_string(), None)]);
        assert_eq!(video.stops, 0);
        assert!(f.setter.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn outcomes_map_to_errors() {
        let mut f = fixture(vec![rule("a", 1, 10)], Vec::new());
        let err = f
            .scheduler
            .apply_once(at(9, 0, 0), &mut RecordingVideo::default())
            .into_error()
            .unwrap();
        assert_eq!(err.kind(), "no-candidates");
        assert!(TickOutcome::Debounced.into_error().is_none());
    }

    #[test]
    fn tick_is_noop_until_started() {
        let mut f = fixture(vec![rule("a", 1, 10)], images(&["x"]));
        let mut video = RecordingVideo::default();
        assert!(matches!(
            f.scheduler.tick(at(9, 0, 0), &mut video),
            TickOutcome::Idle
        ));
        assert!(f.scheduler.start(at(9, 0, 0), &mut video).is_applied());
        assert!(f.scheduler.is_running());
        f.scheduler.stop();
        f.scheduler.stop();
        assert_eq!(f.scheduler.state(), SchedulerState::Idle);
    }
}
