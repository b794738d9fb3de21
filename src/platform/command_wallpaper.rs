use std::path::Path;

use rule_model::FitMode;
use tracing::{debug, warn};

use crate::collaborators::WallpaperSetter;
use crate::displays::{DisplayHandle, DisplayRegistry};
use crate::error::ApplyError;
use crate::platform::shell::{CommandRunner, CommandTemplate, default_runner};

/// Static wallpaper setter driven by a command template (`swww img` by default).
pub struct CommandWallpaperSetter {
    template: CommandTemplate,
    displays: DisplayRegistry,
    runner: CommandRunner,
}

/// `swww --resize` vocabulary for each fit mode.
fn resize_keyword(fit: FitMode) -> &'static str {
    match fit {
        FitMode::Fill => "crop",
        FitMode::Fit => "fit",
        FitMode::Stretch => "stretch",
        FitMode::Center | FitMode::Tile => "no",
    }
}

impl CommandWallpaperSetter {
    pub fn new(template: impl Into<String>, displays: DisplayRegistry) -> Self {
        Self::with_runner(template, displays, default_runner())
    }

    pub fn with_runner(
        template: impl Into<String>,
        displays: DisplayRegistry,
        runner: CommandRunner,
    ) -> Self {
        Self {
            template: CommandTemplate::new(template),
            displays,
            runner,
        }
    }

    fn run_for(&self, path: &Path, output: Option<&str>, fit: FitMode) -> Result<(), ApplyError> {
        let path = path.to_string_lossy();
        let command = self.template.render(&[
            ("@OUTPUT@", output.unwrap_or_default()),
            ("@PATH@", &*path),
            ("@FIT@", fit.as_str()),
            ("@RESIZE@", resize_keyword(fit)),
        ]);
        let result = (self.runner)(&command)
            .map_err(|err| ApplyError::PlatformApplyFailed(format!("{err:#}")))?;
        if !result.success() {
            warn!(
                exit_code = result.exit_label(),
                stderr = result.stderr.trim(),
                command = command,
                "wallpaper command failed"
            );
            return Err(ApplyError::PlatformApplyFailed(format!(
                "wallpaper command exited with {}: {}",
                result.exit_label(),
                result.stderr.trim()
            )));
        }
        debug!(command = command, output, "wallpaper command succeeded");
        Ok(())
    }
}

impl WallpaperSetter for CommandWallpaperSetter {
    fn apply_image(
        &self,
        path: &Path,
        display: Option<&DisplayHandle>,
        fit: FitMode,
    ) -> Result<(), ApplyError> {
        // The output name is what the compositor tools address, not the derived id.
        if let Some(display) = display {
            return self.run_for(path, Some(display.name.as_str()), fit);
        }
        if !self.template.uses("@OUTPUT@") {
            return self.run_for(path, None, fit);
        }

        let displays = self.displays.list_displays();
        if displays.is_empty() {
            return Err(ApplyError::PlatformApplyFailed(
                "no displays attached".to_string(),
            ));
        }
        let mut failures = Vec::new();
        for display in &displays {
            if let Err(err) = self.run_for(path, Some(display.name.as_str()), fit) {
                failures.push(format!("{}: {err}", display.id));
            }
        }
        if failures.len() == displays.len() {
            return Err(ApplyError::PlatformApplyFailed(failures.join("; ")));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::displays::{DisplayFrame, RawDisplay, StaticDisplays};
    use crate::platform::shell::testing::StubRunner;
    use std::sync::Arc;

    fn registry() -> DisplayRegistry {
        let raw = |name: &str, serial: u32| RawDisplay {
            hardware_id: Some(serial),
            name: name.to_string(),
            frame: DisplayFrame {
                x: 0.0,
                y: 0.0,
                width: 1920.0,
                height: 1080.0,
            },
            scale: 1.0,
        };
        DisplayRegistry::new(Arc::new(StaticDisplays::new(vec![
            raw("HDMI-A-1", 11),
            raw("DP-1", 12),
        ])))
    }

    const TEMPLATE: &str = "swww img --outputs @OUTPUT@ --resize @RESIZE@ @PATH@";

    #[test]
    fn targets_named_output() {
        let stub = StubRunner::default();
        let setter = CommandWallpaperSetter::with_runner(TEMPLATE, registry(), stub.runner());
        let display = registry().by_id("12").unwrap();
        setter
            .apply_image(Path::new("/walls/dunes.png"), Some(&display), FitMode::Fit)
            .unwrap();
        assert_eq!(
            stub.calls(),
            vec!["swww img --outputs DP-1 --resize fit /walls/dunes.png".to_string()]
        );
    }

    #[test]
    fn global_apply_fans_out_over_outputs() {
        let stub = StubRunner::default();
        let setter = CommandWallpaperSetter::with_runner(TEMPLATE, registry(), stub.runner());
        setter
            .apply_image(Path::new("/walls/dunes.png"), None, FitMode::Fill)
            .unwrap();
        let calls = stub.calls();
        assert_eq!(calls.len(), 2);
        assert!(calls[0].contains("HDMI-A-1") && calls[0].contains("--resize crop"));
    }

    #[test]
    fn template_without_output_runs_once() {
        let stub = StubRunner::default();
        let setter =
            CommandWallpaperSetter::with_runner("swaybg -i @PATH@ -m @FIT@", registry(), stub.runner());
        setter
            .apply_image(Path::new("/walls/tiles.png"), None, FitMode::Tile)
            .unwrap();
        assert_eq!(stub.calls(), vec!["swaybg -i /walls/tiles.png -m tile".to_string()]);
    }

    #[test]
    fn non_zero_exit_is_platform_failure() {
        let command = "swww img --outputs DP-1 --resize no /walls/x.png";
        let stub = StubRunner::default().respond(command, 1, "");
        let setter = CommandWallpaperSetter::with_runner(TEMPLATE, registry(), stub.runner());
        let display = registry().by_id("12").unwrap();
        let err = setter
            .apply_image(Path::new("/walls/x.png"), Some(&display), FitMode::Center)
            .unwrap_err();
        assert_eq!(err.kind(), "platform-apply-failed");
    }
}
