//! Glue that owns the scheduler and the video manager and routes every
//! callback through one `&mut self`, so no two of them ever overlap.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::collaborators::PowerSource;
use crate::displays::{DisplayHandle, DisplayRegistry};
use crate::events::EngineCommand;
use crate::scheduler::{RuleScheduler, TickOutcome};
use crate::video::{PowerTransition, VideoWallpaperManager};

pub struct WallpaperEngine {
    scheduler: RuleScheduler,
    video: VideoWallpaperManager,
    displays: DisplayRegistry,
    power: Arc<dyn PowerSource>,
    display_signature: Vec<DisplayHandle>,
}

impl WallpaperEngine {
    pub fn new(
        scheduler: RuleScheduler,
        video: VideoWallpaperManager,
        displays: DisplayRegistry,
        power: Arc<dyn PowerSource>,
    ) -> Self {
        let display_signature = displays.list_displays();
        Self {
            scheduler,
            video,
            displays,
            power,
            display_signature,
        }
    }

    pub fn scheduler(&self) -> &RuleScheduler {
        &self.scheduler
    }

    pub fn video(&self) -> &VideoWallpaperManager {
        &self.video
    }

    pub fn handle(&mut self, command: EngineCommand, now: DateTime<Utc>) {
        debug!(?command, "engine command");
        match command {
            EngineCommand::Start => {
                let outcome = self.scheduler.start(now, &mut self.video);
                debug!(outcome = outcome.label(), "initial evaluation");
            }
            EngineCommand::Stop => self.scheduler.stop(),
            EngineCommand::ApplyNow => {
                let outcome = self.scheduler.apply_once(now, &mut self.video);
                let label = outcome.label();
                match outcome.into_error() {
                    Some(err) => warn!(kind = err.kind(), error = %err, "manual evaluation applied nothing"),
                    None => info!(outcome = label, "manual evaluation"),
                }
            }
            EngineCommand::Pause => self.video.pause_all(),
            EngineCommand::Resume => self.video.resume_all(),
            EngineCommand::TogglePause => {
                if self.video.is_manually_paused() {
                    self.video.resume_all();
                } else {
                    self.video.pause_all();
                }
            }
            EngineCommand::DisplaysChanged => {
                self.display_signature = self.displays.list_displays();
                self.rebuild_video();
            }
            EngineCommand::PowerChanged => {
                self.power_tick();
            }
            EngineCommand::EndOfMedia(display_id) => {
                if !self.video.on_end_of_media(&display_id) {
                    debug!(display = %display_id, "end of media for unknown entry");
                }
            }
        }
    }

    pub fn scheduler_tick(&mut self, now: DateTime<Utc>) -> TickOutcome {
        self.scheduler.tick(now, &mut self.video)
    }

    /// Re-checks power and visibility and loops players that finished.
    pub fn power_tick(&mut self) -> Option<PowerTransition> {
        let low_power = self.power.is_low_power();
        let transition = self.video.check_power(low_power);
        let looped = self.video.poll_playback();
        if looped > 0 {
            debug!(looped, "looped finished players");
        }
        transition
    }

    /// Compares the attached displays with the last snapshot and rebuilds the
    /// video session when anything moved, appeared, or disappeared.
    pub fn display_tick(&mut self) -> bool {
        let current = self.displays.list_displays();
        if current == self.display_signature {
            return false;
        }
        info!(
            before = self.display_signature.len(),
            after = current.len(),
            "display configuration changed"
        );
        self.display_signature = current;
        self.rebuild_video();
        true
    }

    fn rebuild_video(&mut self) {
        match self.video.on_display_configuration_changed() {
            Some(Ok(report)) => debug!(started = ?report.started, "video session rebuilt"),
            Some(Err(err)) => warn!(kind = err.kind(), error = %err, "video rebuild failed"),
            None => {}
        }
    }

    pub fn shutdown(&mut self) {
        self.scheduler.stop();
        self.video.stop_all();
        info!("engine shut down");
    }
}
