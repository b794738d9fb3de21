use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Result, ensure};
use chrono_tz::Tz;
use rule_model::FitMode;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct Configuration {
    /// YAML file holding the rules and media records.
    pub library_path: PathBuf,
    /// Optional JSON-lines file receiving one record per application attempt.
    pub history_path: Option<PathBuf>,
    /// Timezone used for weekday and time-of-day rule windows.
    pub timezone: Tz,
    /// Fit mode used when a rule does not override it.
    pub fit_mode: FitMode,
    pub scheduler: SchedulerOptions,
    pub video: VideoOptions,
    pub platform: PlatformConfig,
}

impl Configuration {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let s = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&s)?)
    }

    /// Validate runtime invariants that cannot be expressed via serde defaults alone.
    pub fn validated(self) -> Result<Self> {
        ensure!(
            !self.library_path.as_os_str().is_empty(),
            "library-path must not be empty"
        );
        self.scheduler.validate()?;
        self.video.validate()?;
        self.platform.validate()?;
        Ok(self)
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            library_path: PathBuf::new(),
            history_path: None,
            timezone: Tz::UTC,
            fit_mode: FitMode::default(),
            scheduler: SchedulerOptions::default(),
            video: VideoOptions::default(),
            platform: PlatformConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct SchedulerOptions {
    /// Period between rule evaluations while the scheduler runs.
    #[serde(with = "humantime_serde")]
    pub tick_interval: Duration,
    /// Minimum spacing between two evaluations that may apply something.
    #[serde(with = "humantime_serde")]
    pub guard_interval: Duration,
    /// Interval used for rules that do not set `interval-minutes`.
    pub default_interval_minutes: u32,
    /// Start the scheduler as soon as the engine launches.
    pub autostart: bool,
    /// Deterministic RNG seed for candidate selection.
    pub random_seed: Option<u64>,
}

impl SchedulerOptions {
    const fn default_tick_interval() -> Duration {
        Duration::from_secs(60)
    }

    const fn default_guard_interval() -> Duration {
        Duration::from_secs(30)
    }

    fn validate(&self) -> Result<()> {
        ensure!(
            self.tick_interval > Duration::ZERO,
            "scheduler.tick-interval must be positive"
        );
        ensure!(
            self.default_interval_minutes >= 1,
            "scheduler.default-interval-minutes must be >= 1"
        );
        Ok(())
    }
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            tick_interval: Self::default_tick_interval(),
            guard_interval: Self::default_guard_interval(),
            default_interval_minutes: 60,
            autostart: true,
            random_seed: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct VideoOptions {
    /// User-facing "save energy" setting: lower bitrate cap and frame rate.
    pub low_power_mode: bool,
    /// Cap on how far ahead players buffer.
    #[serde(with = "humantime_serde")]
    pub forward_buffer: Duration,
    pub peak_bitrate_bps: u64,
    pub low_power_peak_bitrate_bps: u64,
    pub low_power_frame_rate: u32,
    /// How often power state and surface visibility are re-checked.
    #[serde(with = "humantime_serde")]
    pub power_poll_interval: Duration,
}

impl VideoOptions {
    fn validate(&self) -> Result<()> {
        ensure!(
            self.peak_bitrate_bps > 0 && self.low_power_peak_bitrate_bps > 0,
            "video bitrate caps must be positive"
        );
        ensure!(
            self.low_power_frame_rate > 0,
            "video.low-power-frame-rate must be positive"
        );
        ensure!(
            self.power_poll_interval > Duration::ZERO,
            "video.power-poll-interval must be positive"
        );
        Ok(())
    }
}

impl Default for VideoOptions {
    fn default() -> Self {
        Self {
            low_power_mode: false,
            forward_buffer: Duration::from_secs(2),
            peak_bitrate_bps: 20_000_000,
            low_power_peak_bitrate_bps: 8_000_000,
            low_power_frame_rate: 24,
            power_poll_interval: Duration::from_secs(1),
        }
    }
}

/// Shell command templates used by the Wayland host.
///
/// Placeholders are substituted before the command is handed to `sh -c`:
/// `@OUTPUT@`, `@PATH@`, `@FIT@` and `@RESIZE@` for images; `@OUTPUT@`,
/// `@PATH@`, `@WIDTH@`, `@HEIGHT@`, `@FPS@`, `@BITRATE@` and
/// `@PLAYER_OPTIONS@` for videos.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct PlatformConfig {
    pub display_command: String,
    pub image_command: String,
    pub video_command: String,
    /// Prints the active power profile; `power-saver` counts as low power.
    pub power_command: Option<String>,
    #[serde(with = "humantime_serde")]
    pub display_poll_interval: Duration,
}

impl PlatformConfig {
    fn validate(&self) -> Result<()> {
        for (label, value) in [
            ("display-command", &self.display_command),
            ("image-command", &self.image_command),
            ("video-command", &self.video_command),
        ] {
            ensure!(
                !value.trim().is_empty(),
                "platform.{} must not be blank",
                label
            );
        }
        ensure!(
            self.image_command.contains("@PATH@"),
            "platform.image-command must reference @PATH@"
        );
        ensure!(
            self.video_command.contains("@PATH@"),
            "platform.video-command must reference @PATH@"
        );
        if let Some(command) = &self.power_command {
            ensure!(
                !command.trim().is_empty(),
                "platform.power-command must not be blank when provided"
            );
        }
        ensure!(
            self.display_poll_interval > Duration::ZERO,
            "platform.display-poll-interval must be positive"
        );
        Ok(())
    }
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            display_command: "wlr-randr".to_string(),
            image_command: "swww img --outputs @OUTPUT@ --resize @RESIZE@ @PATH@".to_string(),
            video_command: "mpvpaper -o @PLAYER_OPTIONS@ @OUTPUT@ @PATH@".to_string(),
            power_command: Some("powerprofilesctl get".to_string()),
            display_poll_interval: Duration::from_secs(5),
        }
    }
}
