use std::fs;
use std::path::PathBuf;

use tracing::{debug, warn};

use crate::collaborators::PowerSource;
use crate::platform::shell::{CommandRunner, default_runner};

const PLATFORM_PROFILE: &str = "/sys/firmware/acpi/platform_profile";

/// Reads the active power profile, first from a command such as
/// `powerprofilesctl get`, then from the ACPI platform profile in sysfs.
pub struct ProfilePowerSource {
    command: Option<String>,
    sysfs: PathBuf,
    runner: CommandRunner,
}

impl ProfilePowerSource {
    pub fn new(command: Option<String>) -> Self {
        Self::with_runner(command, PathBuf::from(PLATFORM_PROFILE), default_runner())
    }

    pub fn with_runner(command: Option<String>, sysfs: PathBuf, runner: CommandRunner) -> Self {
        Self {
            command,
            sysfs,
            runner,
        }
    }

    fn profile_from_command(&self) -> Option<String> {
        let command = self.command.as_deref()?;
        match (self.runner)(command) {
            Ok(output) if output.success() => Some(output.stdout.trim().to_string()),
            Ok(output) => {
                debug!(
                    command,
                    exit_code = output.exit_label(),
                    "power profile command failed"
                );
                None
            }
            Err(err) => {
                warn!(command, error = %err, "failed to query power profile");
                None
            }
        }
    }

    fn profile_from_sysfs(&self) -> Option<String> {
        fs::read_to_string(&self.sysfs)
            .ok()
            .map(|value| value.trim().to_string())
    }
}

impl PowerSource for ProfilePowerSource {
    fn is_low_power(&self) -> bool {
        match self
            .profile_from_command()
            .or_else(|| self.profile_from_sysfs())
        {
            Some(profile) => matches!(profile.as_str(), "power-saver" | "low-power" | "quiet"),
            None => false,
        }
    }
}
