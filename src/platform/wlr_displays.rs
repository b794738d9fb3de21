//! Display enumeration through `wlr-randr`.

use anyhow::{Result, bail};
use tracing::{debug, warn};

use crate::displays::{DisplayFrame, DisplayProvider, RawDisplay};
use crate::platform::shell::{CommandRunner, default_runner};

pub struct WlrDisplays {
    command: String,
    runner: CommandRunner,
}

impl WlrDisplays {
    pub fn new(command: impl Into<String>) -> Self {
        Self::with_runner(command, default_runner())
    }

    pub fn with_runner(command: impl Into<String>, runner: CommandRunner) -> Self {
        Self {
            command: command.into(),
            runner,
        }
    }
}

impl DisplayProvider for WlrDisplays {
    fn enumerate(&self) -> Result<Vec<RawDisplay>> {
        let output = (self.runner)(&self.command)?;
        if !output.success() {
            bail!(
                "{} exited with {}: {}",
                self.command,
                output.exit_label(),
                output.stderr.trim()
            );
        }
        let displays = parse_wlr_randr(&output.stdout);
        if displays.is_empty() {
            warn!(command = %self.command, "no enabled outputs reported");
        }
        Ok(displays)
    }
}

#[derive(Debug, Default)]
struct HeadBlock {
    name: String,
    enabled: bool,
    serial: Option<String>,
    mode: Option<(f64, f64)>,
    position: (f64, f64),
    scale: f64,
    rotated: bool,
}

impl HeadBlock {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            enabled: true,
            scale: 1.0,
            ..Self::default()
        }
    }

    fn into_display(self) -> Option<RawDisplay> {
        if !self.enabled {
            debug!(output = %self.name, "skipping disabled output");
            return None;
        }
        let Some((mut width, mut height)) = self.mode else {
            debug!(output = %self.name, "skipping output without a current mode");
            return None;
        };
        if self.rotated {
            std::mem::swap(&mut width, &mut height);
        }
        let scale = if self.scale > 0.0 { self.scale } else { 1.0 };
        Some(RawDisplay {
            hardware_id: self.serial.as_deref().and_then(|s| s.parse::<u32>().ok()),
            name: self.name,
            frame: DisplayFrame {
                x: self.position.0,
                y: self.position.1,
                width: width / scale,
                height: height / scale,
            },
            scale,
        })
    }
}

/// Parses the block format printed by `wlr-randr`: an unindented header per
/// output followed by indented `Key: value` lines and a `Modes:` list.
pub fn parse_wlr_randr(stdout: &str) -> Vec<RawDisplay> {
    let mut displays = Vec::new();
    let mut current: Option<HeadBlock> = None;

    for line in stdout.lines() {
        if line.trim().is_empty() {
            continue;
        }
        if !line.starts_with(char::is_whitespace) {
            if let Some(head) = current.take() {
                displays.extend(head.into_display());
            }
            let name = line.split_whitespace().next().unwrap_or_default();
            current = Some(HeadBlock::new(name));
            continue;
        }
        let Some(head) = current.as_mut() else {
            continue;
        };
        let trimmed = line.trim();
        if let Some((key, value)) = trimmed.split_once(':') {
            let value = value.trim();
            match key {
                "Enabled" => head.enabled = value == "yes",
                "Serial" => head.serial = Some(value.to_string()),
                "Position" => {
                    if let Some(position) = parse_pair(value, ',') {
                        head.position = position;
                    }
                }
                "Scale" => head.scale = value.parse().unwrap_or(1.0),
                "Transform" => head.rotated = matches!(value, "90" | "270" | "flipped-90" | "flipped-270"),
                _ => {}
            }
        } else if trimmed.contains("current") {
            if let Some(size) = trimmed.split_whitespace().next() {
                head.mode = parse_pair(size, 'x');
            }
        }
    }
    if let Some(head) = current {
        displays.extend(head.into_display());
    }
    displays
}

fn parse_pair(value: &str, separator: char) -> Option<(f64, f64)> {
    let (a, b) = value.split_once(separator)?;
    Some((a.trim().parse().ok()?, b.trim().parse().ok()?))
}
