#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use chrono_tz::Tz;
use wallpaper_scheduler::collaborators::{AccessHandle, FileAccess, PowerSource, WallpaperSetter};
use wallpaper_scheduler::config::{SchedulerOptions, VideoOptions};
use wallpaper_scheduler::displays::{
    DisplayFrame, DisplayHandle, DisplayRegistry, RawDisplay, StaticDisplays,
};
use wallpaper_scheduler::error::ApplyError;
use wallpaper_scheduler::library::MemoryLibrary;
use wallpaper_scheduler::rule_model::{FitMode, MediaKind, MediaRecord, Rule};
use wallpaper_scheduler::scheduler::{RuleScheduler, SchedulerDeps};
use wallpaper_scheduler::video::{
    PlaybackHints, PlaybackSurface, SurfaceSpec, VideoBackend, VideoPlayer, VideoWallpaperManager,
};

#[derive(Default)]
pub struct RecordingSetter {
    pub calls: Mutex<Vec<(PathBuf, Option<String>, FitMode)>>,
}

impl WallpaperSetter for RecordingSetter {
    fn apply_image(
        &self,
        path: &Path,
        display: Option<&DisplayHandle>,
        fit: FitMode,
    ) -> Result<(), ApplyError> {
        self.calls
            .lock()
            .unwrap()
            .push((path.to_path_buf(), display.map(|d| d.id.clone()), fit));
        Ok(())
    }
}

/// Counts open/release pairs.
#[derive(Default)]
pub struct CountingAccess {
    pub opened: AtomicUsize,
    pub released: Arc<AtomicUsize>,
}

impl FileAccess for CountingAccess {
    fn begin_access(&self, media: &MediaRecord) -> Result<AccessHandle, ApplyError> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        let released = Arc::clone(&self.released);
        Ok(AccessHandle::new(media.location.clone(), move || {
            released.fetch_add(1, Ordering::SeqCst);
        }))
    }
}

#[derive(Default)]
pub struct SwitchablePower {
    pub low: AtomicBool,
}

impl PowerSource for SwitchablePower {
    fn is_low_power(&self) -> bool {
        self.low.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Default)]
pub struct PlayerState {
    pub display: String,
    pub playing: bool,
    pub torn_down: bool,
}

/// Backend that records every surface and player it hands out.
#[derive(Clone, Default)]
pub struct FakeBackend {
    pub players: Arc<Mutex<Vec<Arc<Mutex<PlayerState>>>>>,
}

impl FakeBackend {
    pub fn live_players(&self) -> Vec<String> {
        self.players
            .lock()
            .unwrap()
            .iter()
            .filter_map(|p| {
                let p = p.lock().unwrap();
                (!p.torn_down).then(|| p.display.clone())
            })
            .collect()
    }

    pub fn playing(&self) -> usize {
        self.players
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.lock().unwrap().playing)
            .count()
    }
}

struct FakeSurface {
    state: Arc<Mutex<PlayerState>>,
    shown: bool,
}

impl PlaybackSurface for FakeSurface {
    fn show(&mut self) {
        self.shown = true;
    }

    fn hide(&mut self) {
        self.shown = false;
        self.state.lock().unwrap().torn_down = true;
    }

    fn is_visible(&self) -> bool {
        self.shown
    }
}

struct FakePlayer(Arc<Mutex<PlayerState>>);

impl VideoPlayer for FakePlayer {
    fn play(&mut self) -> Result<()> {
        self.0.lock().unwrap().playing = true;
        Ok(())
    }

    fn pause(&mut self) {
        self.0.lock().unwrap().playing = false;
    }

    fn seek_to_start(&mut self) -> Result<()> {
        Ok(())
    }
}

impl VideoBackend for FakeBackend {
    fn create_surface(
        &mut self,
        display: &DisplayHandle,
        _spec: &SurfaceSpec,
    ) -> Result<Box<dyn PlaybackSurface>> {
        let state = Arc::new(Mutex::new(PlayerState {
            display: display.id.clone(),
            ..PlayerState::default()
        }));
        self.players.lock().unwrap().push(Arc::clone(&state));
        Ok(Box::new(FakeSurface { state, shown: false }))
    }

    fn create_player(
        &mut self,
        _source: &Path,
        display: &DisplayHandle,
        _hints: &PlaybackHints,
    ) -> Result<Box<dyn VideoPlayer>> {
        let players = self.players.lock().unwrap();
        let state = players
            .iter()
            .rev()
            .find(|p| p.lock().unwrap().display == display.id)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no surface for {}", display.id))?;
        Ok(Box::new(FakePlayer(state)))
    }
}

pub fn monitors(ids: &[u32]) -> DisplayRegistry {
    let raw = ids
        .iter()
        .enumerate()
        .map(|(idx, id)| RawDisplay {
            hardware_id: Some(*id),
            name: format!("DP-{idx}"),
            frame: DisplayFrame {
                x: idx as f64 * 2560.0,
                y: 0.0,
                width: 2560.0,
                height: 1440.0,
            },
            scale: 1.0,
        })
        .collect();
    DisplayRegistry::new(Arc::new(StaticDisplays::new(raw)))
}

pub fn image(id: &str) -> MediaRecord {
    MediaRecord::new(id, MediaKind::Image, format!("/walls/{id}.jpg"))
}

pub fn video(id: &str) -> MediaRecord {
    MediaRecord::new(id, MediaKind::Video, format!("/walls/{id}.mp4"))
}

pub fn rule(id: &str, priority: i32, interval: u32) -> Rule {
    let mut rule = Rule::new(id);
    rule.priority = priority;
    rule.interval_minutes = Some(interval);
    rule
}

pub struct Rig {
    pub library: Arc<MemoryLibrary>,
    pub setter: Arc<RecordingSetter>,
    pub access: Arc<CountingAccess>,
    pub backend: FakeBackend,
    pub displays: DisplayRegistry,
    pub scheduler: RuleScheduler,
    pub video: VideoWallpaperManager,
}

pub fn rig(rules: Vec<Rule>, media: Vec<MediaRecord>, displays: DisplayRegistry) -> Rig {
    let library = Arc::new(MemoryLibrary::new(rules, media));
    let setter = Arc::new(RecordingSetter::default());
    let access = Arc::new(CountingAccess::default());
    let backend = FakeBackend::default();
    let scheduler = RuleScheduler::new(
        SchedulerDeps {
            library: library.clone(),
            setter: setter.clone(),
            access: access.clone(),
            displays: displays.clone(),
        },
        SchedulerOptions {
            random_seed: Some(17),
            ..SchedulerOptions::default()
        },
        Tz::UTC,
        FitMode::Fill,
    );
    let video = VideoWallpaperManager::new(
        Box::new(backend.clone()),
        access.clone(),
        displays.clone(),
        VideoOptions::default(),
    );
    Rig {
        library,
        setter,
        access,
        backend,
        displays,
        scheduler,
        video,
    }
}
