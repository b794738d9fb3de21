//! Video playback through one wallpaper-player process per output.
//!
//! The player process (mpvpaper by default) owns its own background layer
//! surface, so the surface and the player handed to the video manager share
//! one process slot. Pausing stops the process with `SIGSTOP`, which keeps the
//! last frame on screen; looping respawns it once it exits.

use std::collections::HashMap;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::{Context, Result, bail};
use tracing::{debug, warn};

use crate::displays::DisplayHandle;
use crate::platform::shell::CommandTemplate;
use crate::video::{
    PlaybackHints, PlaybackSurface, SurfaceSpec, VideoBackend, VideoGravity, VideoPlayer,
};

#[derive(Debug, Default)]
struct ProcessSlot {
    output: String,
    command: Option<String>,
    child: Option<Child>,
    stopped: bool,
    shown: bool,
}

type SharedSlot = Arc<Mutex<ProcessSlot>>;

fn lock(slot: &SharedSlot) -> MutexGuard<'_, ProcessSlot> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ProcessSlot {
    fn spawn(&mut self) -> Result<()> {
        let Some(command) = self.command.as_deref() else {
            bail!("no player command prepared for {}", self.output);
        };
        let child = Command::new("sh")
            .arg("-c")
            .arg(format!("exec {command}"))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("failed to spawn player: {command}"))?;
        debug!(output = %self.output, pid = child.id(), "player process started");
        self.child = Some(child);
        self.stopped = false;
        Ok(())
    }

    fn signal(&self, name: &str) -> Result<()> {
        match &self.child {
            Some(child) => signal_pid(child.id(), name),
            None => Ok(()),
        }
    }

    fn terminate(&mut self) {
        if let Some(mut child) = self.child.take() {
            if self.stopped {
                let _ = signal_pid(child.id(), "CONT");
            }
            if let Err(err) = child.kill() {
                debug!(output = %self.output, error = %err, "player already gone");
            }
            let _ = child.wait();
        }
        self.stopped = false;
    }

    fn exited(&mut self) -> bool {
        match self.child.as_mut().map(Child::try_wait) {
            Some(Ok(Some(status))) => {
                debug!(output = %self.output, %status, "player process exited");
                self.child = None;
                true
            }
            Some(Ok(None)) | None => false,
            Some(Err(err)) => {
                warn!(output = %self.output, error = %err, "failed to poll player process");
                false
            }
        }
    }
}

fn signal_pid(pid: u32, name: &str) -> Result<()> {
    let status = Command::new("kill")
        .arg(format!("-{name}"))
        .arg(pid.to_string())
        .status()
        .with_context(|| format!("failed to send SIG{name}"))?;
    if !status.success() {
        bail!("kill -{name} {pid} failed");
    }
    Ok(())
}

/// mpv option list for one player.
///
/// `hls-bitrate` only narrows stream variant selection; local files play at
/// their encoded rate. The resolution cap never upscales.
pub fn player_options(hints: &PlaybackHints) -> String {
    let mut options = vec![
        "no-audio".to_string(),
        "hwdec=auto".to_string(),
        format!("demuxer-readahead-secs={}", hints.forward_buffer.as_secs().max(1)),
        format!("hls-bitrate={}", hints.peak_bitrate_bps),
    ];
    match hints.gravity {
        VideoGravity::ResizeAspectFill => options.push("panscan=1.0".to_string()),
        VideoGravity::ResizeAspect => {}
        VideoGravity::Resize => options.push("keepaspect=no".to_string()),
    }
    let mut filters = Vec::new();
    let (width, height) = hints.max_resolution;
    if width > 0 && height > 0 {
        filters.push(format!(
            "scale=w=min(iw\\,{width}):h=min(ih\\,{height}):force_original_aspect_ratio=decrease"
        ));
    }
    if let Some(fps) = hints.frame_rate_cap {
        filters.push(format!("fps={fps}"));
    }
    if !filters.is_empty() {
        options.push(format!("vf={}", filters.join(",")));
    }
    options.join(" ")
}

pub struct ProcessVideoBackend {
    template: CommandTemplate,
    slots: HashMap<String, SharedSlot>,
}

impl ProcessVideoBackend {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: CommandTemplate::new(template),
            slots: HashMap::new(),
        }
    }

    pub fn render_command(
        &self,
        source: &Path,
        display: &DisplayHandle,
        hints: &PlaybackHints,
    ) -> String {
        let (width, height) = hints.max_resolution;
        let fps = hints
            .frame_rate_cap
            .map(|fps| fps.to_string())
            .unwrap_or_default();
        let options = player_options(hints);
        let path = source.to_string_lossy();
        let width = width.to_string();
        let height = height.to_string();
        let bitrate = hints.peak_bitrate_bps.to_string();
        self.template.render(&[
            ("@PLAYER_OPTIONS@", options.as_str()),
            ("@OUTPUT@", display.name.as_str()),
            ("@PATH@", &*path),
            ("@WIDTH@", width.as_str()),
            ("@HEIGHT@", height.as_str()),
            ("@FPS@", fps.as_str()),
            ("@BITRATE@", bitrate.as_str()),
        ])
    }
}

impl VideoBackend for ProcessVideoBackend {
    fn create_surface(
        &mut self,
        display: &DisplayHandle,
        spec: &SurfaceSpec,
    ) -> Result<Box<dyn PlaybackSurface>> {
        let output = display.name.as_str();
        debug!(output, level = ?spec.level, "reserving player surface");
        let slot: SharedSlot = Arc::new(Mutex::new(ProcessSlot {
            output: display.name.clone(),
            ..ProcessSlot::default()
        }));
        if let Some(previous) = self.slots.insert(display.id.clone(), Arc::clone(&slot)) {
            lock(&previous).terminate();
        }
        Ok(Box::new(ProcessSurface { slot }))
    }

    fn create_player(
        &mut self,
        source: &Path,
        display: &DisplayHandle,
        hints: &PlaybackHints,
    ) -> Result<Box<dyn VideoPlayer>> {
        let slot = self
            .slots
            .get(&display.id)
            .cloned()
            .with_context(|| format!("no surface reserved for display {}", display.id))?;
        let command = self.render_command(source, display, hints);
        lock(&slot).command = Some(command);
        Ok(Box::new(ProcessPlayer { slot }))
    }
}

struct ProcessSurface {
    slot: SharedSlot,
}

impl PlaybackSurface for ProcessSurface {
    fn show(&mut self) {
        lock(&self.slot).shown = true;
    }

    fn hide(&mut self) {
        let mut slot = lock(&self.slot);
        slot.shown = false;
        slot.terminate();
    }

    fn is_visible(&self) -> bool {
        lock(&self.slot).shown
    }
}

struct ProcessPlayer {
    slot: SharedSlot,
}

impl VideoPlayer for ProcessPlayer {
    fn play(&mut self) -> Result<()> {
        let mut slot = lock(&self.slot);
        if slot.child.is_none() {
            return slot.spawn();
        }
        if slot.stopped {
            slot.signal("CONT")?;
            slot.stopped = false;
        }
        Ok(())
    }

    fn pause(&mut self) {
        let mut slot = lock(&self.slot);
        if slot.child.is_none() || slot.stopped {
            return;
        }
        match slot.signal("STOP") {
            Ok(()) => slot.stopped = true,
            Err(err) => warn!(output = %slot.output, error = ?err, "failed to pause player"),
        }
    }

    fn seek_to_start(&mut self) -> Result<()> {
        lock(&self.slot).terminate();
        Ok(())
    }

    fn take_end_of_media(&mut self) -> bool {
        lock(&self.slot).exited()
    }
}

impl Drop for ProcessPlayer {
    fn drop(&mut self) {
        lock(&self.slot).terminate();
    }
}
