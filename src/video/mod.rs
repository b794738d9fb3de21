//! Video wallpaper lifecycle.
//!
//! One session plays a single video on one or more displays. Each display
//! gets a [`PlaybackEntry`] (surface + player + loop subscription) and the
//! whole session shares one file access handle. Starting a new session or
//! switching to a static image tears every entry down first, so video and
//! image wallpapers never coexist.

pub mod backend;

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use rule_model::{FitMode, MediaRecord};
use tracing::{debug, info, warn};

use crate::collaborators::{AccessHandle, FileAccess};
use crate::config::VideoOptions;
use crate::displays::{DisplayHandle, DisplayRegistry};
use crate::error::ApplyError;
use crate::scheduler::VideoSink;

pub use backend::{
    PlaybackHints, PlaybackSurface, SurfaceLevel, SurfaceSpec, VideoBackend, VideoGravity,
    VideoPlayer,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Stopped,
    Active,
    Paused,
}

/// Result of a power/visibility check that changed playback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerTransition {
    /// Players were paused; the last frame stays on screen.
    Paused,
    /// Players resumed.
    Resumed,
    /// Power pause lifted but the user pause keeps playback stopped.
    HeldByUser,
}

/// Parameters of the last `apply_video`, kept so a display change can rebuild.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoRequest {
    pub media: MediaRecord,
    pub fit: FitMode,
    pub target_display_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VideoApplyReport {
    pub targets: usize,
    pub started: Vec<String>,
    pub failed: Vec<(String, String)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LoopSubscription(u64);

struct PlaybackEntry {
    display: DisplayHandle,
    surface: Box<dyn PlaybackSurface>,
    player: Box<dyn VideoPlayer>,
    subscription: Option<LoopSubscription>,
}

impl PlaybackEntry {
    fn teardown(mut self) {
        self.subscription = None;
        self.player.pause();
        self.surface.hide();
        debug!(display = %self.display.id, "playback entry torn down");
    }

    fn restart(&mut self, resume: bool) -> Result<()> {
        self.player
            .seek_to_start()
            .context("failed to rewind player")?;
        if resume {
            self.player.play().context("failed to restart player")?;
        }
        Ok(())
    }
}

impl VideoOptions {
    pub fn hints_for(&self, display: &DisplayHandle, fit: FitMode) -> PlaybackHints {
        PlaybackHints {
            forward_buffer: self.forward_buffer,
            peak_bitrate_bps: if self.low_power_mode {
                self.low_power_peak_bitrate_bps
            } else {
                self.peak_bitrate_bps
            },
            max_resolution: display.pixel_size(),
            frame_rate_cap: self.low_power_mode.then_some(self.low_power_frame_rate),
            gravity: VideoGravity::from(fit),
        }
    }
}

pub struct VideoWallpaperManager {
    backend: Box<dyn VideoBackend>,
    access: Arc<dyn FileAccess>,
    displays: DisplayRegistry,
    options: VideoOptions,
    entries: HashMap<String, PlaybackEntry>,
    session_access: Option<AccessHandle>,
    last_request: Option<VideoRequest>,
    manual_paused: bool,
    paused_for_power: bool,
    rebuilding: bool,
    next_subscription: u64,
}

impl VideoWallpaperManager {
    pub fn new(
        backend: Box<dyn VideoBackend>,
        access: Arc<dyn FileAccess>,
        displays: DisplayRegistry,
        options: VideoOptions,
    ) -> Self {
        Self {
            backend,
            access,
            displays,
            options,
            entries: HashMap::new(),
            session_access: None,
            last_request: None,
            manual_paused: false,
            paused_for_power: false,
            rebuilding: false,
            next_subscription: 0,
        }
    }

    pub fn session_state(&self) -> SessionState {
        if self.entries.is_empty() {
            SessionState::Stopped
        } else if self.manual_paused || self.paused_for_power {
            SessionState::Paused
        } else {
            SessionState::Active
        }
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    pub fn display_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.entries.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn is_manually_paused(&self) -> bool {
        self.manual_paused
    }

    pub fn is_paused_for_power(&self) -> bool {
        self.paused_for_power
    }

    pub fn last_request(&self) -> Option<&VideoRequest> {
        self.last_request.as_ref()
    }

    pub fn apply_video(
        &mut self,
        media: &MediaRecord,
        fit: FitMode,
        target_display_id: Option<&str>,
    ) -> Result<VideoApplyReport, ApplyError> {
        let request = VideoRequest {
            media: media.clone(),
            fit,
            target_display_id: target_display_id.map(str::to_string),
        };
        self.apply_request(request, false)
    }

    fn apply_request(
        &mut self,
        request: VideoRequest,
        keep_manual_pause: bool,
    ) -> Result<VideoApplyReport, ApplyError> {
        let manual_paused = keep_manual_pause && self.manual_paused;
        self.stop_all();
        self.manual_paused = manual_paused;

        let targets = self.resolve_targets(request.target_display_id.as_deref());
        let mut report = VideoApplyReport {
            targets: targets.len(),
            ..VideoApplyReport::default()
        };
        self.last_request = Some(request.clone());
        if targets.is_empty() {
            info!(media = %request.media.id, "no displays to host the video wallpaper");
            return Ok(report);
        }

        let handle = match self.access.begin_access(&request.media) {
            Ok(handle) => handle,
            Err(err) => {
                warn!(media = %request.media.id, error = %err, "could not open video");
                self.last_request = None;
                return Err(err);
            }
        };

        for display in targets {
            match self.build_entry(&display, handle.path(), request.fit) {
                Ok(entry) => {
                    report.started.push(display.id.clone());
                    if let Some(previous) = self.entries.insert(display.id.clone(), entry) {
                        previous.teardown();
                    }
                }
                Err(err) => {
                    let display_id = display.id.as_str();
                    warn!(
                        display = display_id,
                        media = %request.media.id,
                        error = ?err,
                        "failed to start video on display"
                    );
                    report.failed.push((display.id.clone(), format!("{err:#}")));
                }
            }
        }

        if report.started.is_empty() {
            handle.release();
            let detail = report
                .failed
                .iter()
                .map(|(id, err)| format!("{id}: {err}"))
                .collect::<Vec<_>>()
                .join("; ");
            return Err(ApplyError::PlatformApplyFailed(detail));
        }

        self.session_access = Some(handle);
        info!(
            media = %request.media.id,
            displays = ?report.started,
            failed = report.failed.len(),
            paused = self.manual_paused,
            "video wallpaper session started"
        );
        Ok(report)
    }

    fn resolve_targets(&self, target_display_id: Option<&str>) -> Vec<DisplayHandle> {
        match target_display_id {
            None => self.displays.list_displays(),
            Some(id) => match self.displays.by_id(id) {
                Some(display) => vec![display],
                None => {
                    warn!(display = id, "target display not found; nothing to rebuild");
                    Vec::new()
                }
            },
        }
    }

    fn build_entry(
        &mut self,
        display: &DisplayHandle,
        source: &Path,
        fit: FitMode,
    ) -> Result<PlaybackEntry> {
        let spec = SurfaceSpec::desktop(display.frame);
        let mut surface = self
            .backend
            .create_surface(display, &spec)
            .context("failed to create playback surface")?;
        let hints = self.options.hints_for(display, fit);
        let mut player = match self.backend.create_player(source, display, &hints) {
            Ok(player) => player,
            Err(err) => {
                surface.hide();
                return Err(err.context("failed to create player"));
            }
        };
        surface.show();
        if !self.manual_paused {
            if let Err(err) = player.play() {
                player.pause();
                surface.hide();
                return Err(err.context("failed to start playback"));
            }
        }
        self.next_subscription += 1;
        let display_id = display.id.as_str();
        debug!(
            display = display_id,
            gravity = ?hints.gravity,
            max_resolution = ?hints.max_resolution,
            frame_rate_cap = ?hints.frame_rate_cap,
            peak_bitrate_bps = hints.peak_bitrate_bps,
            "playback entry created"
        );
        Ok(PlaybackEntry {
            display: display.clone(),
            surface,
            player,
            subscription: Some(LoopSubscription(self.next_subscription)),
        })
    }

    /// Tears down every entry and releases the session's file access.
    /// Calling it on a stopped manager does nothing.
    pub fn stop_all(&mut self) {
        let was_running = !self.entries.is_empty() || self.session_access.is_some();
        for (_, entry) in self.entries.drain() {
            entry.teardown();
        }
        if let Some(handle) = self.session_access.take() {
            handle.release();
        }
        self.last_request = None;
        self.manual_paused = false;
        self.paused_for_power = false;
        if was_running {
            info!("video wallpaper session stopped");
        }
    }

    pub fn pause_all(&mut self) {
        self.manual_paused = true;
        for entry in self.entries.values_mut() {
            entry.player.pause();
        }
        debug!(entries = self.entries.len(), "video wallpaper paused by user");
    }

    pub fn resume_all(&mut self) {
        self.manual_paused = false;
        if self.paused_for_power {
            debug!("resume requested while paused for power; waiting");
            return;
        }
        self.play_all();
    }

    fn play_all(&mut self) {
        for (id, entry) in self.entries.iter_mut() {
            if let Err(err) = entry.player.play() {
                warn!(display = %id, error = ?err, "failed to resume player");
            }
        }
    }

    fn pause_players(&mut self) {
        for entry in self.entries.values_mut() {
            entry.player.pause();
        }
    }

    fn playback_allowed(&self) -> bool {
        !self.manual_paused && !self.paused_for_power
    }

    /// Rebuilds surfaces against the new display geometry. Returns `None` when
    /// there is no session to rebuild or a rebuild is already running.
    pub fn on_display_configuration_changed(
        &mut self,
    ) -> Option<Result<VideoApplyReport, ApplyError>> {
        if self.rebuilding {
            debug!("display change ignored during rebuild");
            return None;
        }
        let request = self.last_request.clone()?;
        info!(media = %request.media.id, "display configuration changed; rebuilding video wallpaper");
        self.rebuilding = true;
        let result = self.apply_request(request, true);
        self.rebuilding = false;
        Some(result)
    }

    /// Loops the player on `display_id` back to the start.
    pub fn on_end_of_media(&mut self, display_id: &str) -> bool {
        let resume = self.playback_allowed();
        let Some(entry) = self.entries.get_mut(display_id) else {
            return false;
        };
        if entry.subscription.is_none() {
            return false;
        }
        match entry.restart(resume) {
            Ok(()) => true,
            Err(err) => {
                warn!(display = display_id, error = ?err, "failed to loop video");
                false
            }
        }
    }

    /// Loops players that report end-of-media only when polled.
    pub fn poll_playback(&mut self) -> usize {
        let resume = self.playback_allowed();
        let mut looped = 0;
        for (id, entry) in self.entries.iter_mut() {
            if entry.subscription.is_none() || !entry.player.take_end_of_media() {
                continue;
            }
            match entry.restart(resume) {
                Ok(()) => looped += 1,
                Err(err) => warn!(display = %id, error = ?err, "failed to loop video"),
            }
        }
        looped
    }

    /// Pauses while the system is in low-power mode or nothing is visible,
    /// and resumes once neither holds (unless the user paused).
    pub fn check_power(&mut self, low_power: bool) -> Option<PowerTransition> {
        if self.entries.is_empty() {
            return None;
        }
        let visible = self.entries.values().any(|entry| entry.surface.is_visible());
        let should_pause = low_power || !visible;

        if should_pause && !self.paused_for_power {
            self.pause_players();
            self.paused_for_power = true;
            info!(low_power, visible, "video wallpaper paused for power");
            return Some(PowerTransition::Paused);
        }
        if !should_pause && self.paused_for_power {
            self.paused_for_power = false;
            if self.manual_paused {
                debug!("power pause lifted; user pause still active");
                return Some(PowerTransition::HeldByUser);
            }
            self.play_all();
            info!("video wallpaper resumed after power pause");
            return Some(PowerTransition::Resumed);
        }
        None
    }
}

impl VideoSink for VideoWallpaperManager {
    fn apply_video(
        &mut self,
        media: &MediaRecord,
        fit: FitMode,
        target_display_id: Option<&str>,
    ) -> Result<usize, ApplyError> {
        VideoWallpaperManager::apply_video(self, media, fit, target_display_id)
            .map(|report| report.started.len())
    }

    fn stop_all(&mut self) {
        VideoWallpaperManager::stop_all(self);
    }
}
