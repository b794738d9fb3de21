//! Interfaces the scheduling core consumes from its host.
//!
//! Everything that touches persistence, the filesystem, or the platform's
//! wallpaper APIs sits behind one of these traits so the scheduler and the
//! video manager can run against fakes in tests.

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::Result;
use rule_model::{FitMode, HistoryEntry, MediaRecord, Rule};

use crate::displays::DisplayHandle;
use crate::error::ApplyError;

/// Read access to rules and media plus the two writes the scheduler performs.
pub trait MediaLibrary: Send + Sync {
    fn fetch_rules(&self) -> Result<Vec<Rule>>;

    /// Media belonging to `collection_id`, or the whole library when `None`.
    fn fetch_media_pool(&self, collection_id: Option<&str>) -> Result<Vec<MediaRecord>>;

    fn save(&self, media: &MediaRecord) -> Result<()>;

    fn append_history(&self, entry: HistoryEntry) -> Result<()>;
}

/// Resolves a media record into a path the platform can open.
pub trait FileAccess: Send + Sync {
    fn begin_access(&self, media: &MediaRecord) -> Result<AccessHandle, ApplyError>;
}

/// Sets a static desktop picture.
pub trait WallpaperSetter: Send + Sync {
    /// `display == None` applies the image to every attached display.
    fn apply_image(
        &self,
        path: &Path,
        display: Option<&DisplayHandle>,
        fit: FitMode,
    ) -> Result<(), ApplyError>;
}

/// Reports whether the system is in an energy-saving state.
pub trait PowerSource: Send + Sync {
    fn is_low_power(&self) -> bool;
}

type ReleaseFn = Box<dyn FnOnce() + Send>;

/// Scoped access to a media file. The release hook runs exactly once, either
/// through [`AccessHandle::release`] or when the handle is dropped.
pub struct AccessHandle {
    path: PathBuf,
    release: Option<ReleaseFn>,
}

impl AccessHandle {
    pub fn new(path: impl Into<PathBuf>, release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            path: path.into(),
            release: Some(Box::new(release)),
        }
    }

    /// A handle whose path needs no explicit release.
    pub fn unscoped(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            release: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn release(mut self) {
        self.stop_access();
    }

    fn stop_access(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for AccessHandle {
    fn drop(&mut self) {
        self.stop_access();
    }
}

impl fmt::Debug for AccessHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessHandle")
            .field("path", &self.path)
            .field("pending_release", &self.release.is_some())
            .finish()
    }
}
