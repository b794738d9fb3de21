use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use rule_model::FitMode;

use crate::displays::{DisplayFrame, DisplayHandle};

/// Scaling applied by the player inside its surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoGravity {
    /// Preserve aspect ratio, crop to cover the surface.
    ResizeAspectFill,
    /// Preserve aspect ratio, letterbox inside the surface (centered).
    ResizeAspect,
    /// Ignore aspect ratio and cover the surface exactly.
    Resize,
}

impl From<FitMode> for VideoGravity {
    fn from(fit: FitMode) -> Self {
        match fit {
            FitMode::Fill => VideoGravity::ResizeAspectFill,
            FitMode::Fit | FitMode::Center => VideoGravity::ResizeAspect,
            FitMode::Stretch => VideoGravity::Resize,
            // Video has no true tiling; cover the display instead.
            FitMode::Tile => VideoGravity::ResizeAspectFill,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceLevel {
    /// Directly above the desktop picture, below every application window.
    Desktop,
}

/// Window attributes for a playback surface.
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceSpec {
    pub frame: DisplayFrame,
    pub level: SurfaceLevel,
    pub borderless: bool,
    pub visible_on_all_spaces: bool,
    pub ignores_mouse: bool,
}

impl SurfaceSpec {
    pub fn desktop(frame: DisplayFrame) -> Self {
        Self {
            frame,
            level: SurfaceLevel::Desktop,
            borderless: true,
            visible_on_all_spaces: true,
            ignores_mouse: true,
        }
    }
}

/// Per-player resource caps.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackHints {
    pub forward_buffer: Duration,
    pub peak_bitrate_bps: u64,
    /// Never decode above the target display's pixel size.
    pub max_resolution: (u32, u32),
    pub frame_rate_cap: Option<u32>,
    pub gravity: VideoGravity,
}

pub trait PlaybackSurface: Send {
    fn show(&mut self);
    fn hide(&mut self);
    /// False when the surface is fully occluded or off screen.
    fn is_visible(&self) -> bool;
}

pub trait VideoPlayer: Send {
    fn play(&mut self) -> Result<()>;
    /// Pausing keeps the current frame on screen.
    fn pause(&mut self);
    fn seek_to_start(&mut self) -> Result<()>;
    /// Polled end-of-media signal for players that cannot push notifications.
    fn take_end_of_media(&mut self) -> bool {
        false
    }
}

/// Creates surfaces and players for one platform.
pub trait VideoBackend: Send {
    fn create_surface(
        &mut self,
        display: &DisplayHandle,
        spec: &SurfaceSpec,
    ) -> Result<Box<dyn PlaybackSurface>>;

    fn create_player(
        &mut self,
        source: &Path,
        display: &DisplayHandle,
        hints: &PlaybackHints,
    ) -> Result<Box<dyn VideoPlayer>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fit_modes_map_to_gravity() {
        assert_eq!(VideoGravity::from(FitMode::Fill), VideoGravity::ResizeAspectFill);
        assert_eq!(VideoGravity::from(FitMode::Fit), VideoGravity::ResizeAspect);
        assert_eq!(VideoGravity::from(FitMode::Center), VideoGravity::ResizeAspect);
        assert_eq!(VideoGravity::from(FitMode::Stretch), VideoGravity::Resize);
        assert_eq!(VideoGravity::from(FitMode::Tile), VideoGravity::ResizeAspectFill);
    }

    #[test]
    fn desktop_surface_is_click_through() {
        let spec = SurfaceSpec::desktop(DisplayFrame {
            x: 0.0,
            y: 0.0,
            width: 100.0,
            height: 50.0,
        });
        assert!(spec.borderless && spec.ignores_mouse && spec.visible_on_all_spaces);
        assert_eq!(spec.level, SurfaceLevel::Desktop);
    }
}
