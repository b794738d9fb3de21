use std::fmt;
use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, warn};

/// Logical placement of a display in the global desktop coordinate space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayFrame {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// A display as reported by the platform, before an identifier is derived.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDisplay {
    /// Hardware-stable numeric id when the platform exposes one.
    pub hardware_id: Option<u32>,
    /// Localized or connector name.
    pub name: String,
    pub frame: DisplayFrame,
    pub scale: f64,
}

/// Non-owning reference to an attached display.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayHandle {
    pub id: String,
    pub name: String,
    pub frame: DisplayFrame,
    pub scale: f64,
}

impl DisplayHandle {
    /// Backing pixel dimensions (logical frame times scale).
    pub fn pixel_size(&self) -> (u32, u32) {
        let scale = if self.scale.is_finite() && self.scale > 0.0 {
            self.scale
        } else {
            1.0
        };
        (
            (self.frame.width * scale).round().max(0.0) as u32,
            (self.frame.height * scale).round().max(0.0) as u32,
        )
    }
}

impl From<RawDisplay> for DisplayHandle {
    fn from(raw: RawDisplay) -> Self {
        let id = match raw.hardware_id {
            Some(hardware_id) => hardware_id.to_string(),
            None => raw.name.clone(),
        };
        Self {
            id,
            name: raw.name,
            frame: raw.frame,
            scale: raw.scale,
        }
    }
}

/// Platform hook that lists attached displays.
pub trait DisplayProvider: Send + Sync {
    fn enumerate(&self) -> Result<Vec<RawDisplay>>;
}

/// Live view of attached displays. Every call re-enumerates; nothing is cached
/// because displays can be attached or removed at any time.
#[derive(Clone)]
pub struct DisplayRegistry {
    provider: Arc<dyn DisplayProvider>,
}

impl fmt::Debug for DisplayRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DisplayRegistry").finish_non_exhaustive()
    }
}

impl DisplayRegistry {
    pub fn new(provider: Arc<dyn DisplayProvider>) -> Self {
        Self { provider }
    }

    pub fn list_displays(&self) -> Vec<DisplayHandle> {
        match self.provider.enumerate() {
            Ok(raw) => {
                let displays: Vec<DisplayHandle> = raw.into_iter().map(Into::into).collect();
                debug!(count = displays.len(), "enumerated displays");
                displays
            }
            Err(err) => {
                warn!(error = ?err, "display enumeration failed");
                Vec::new()
            }
        }
    }

    pub fn by_id(&self, id: &str) -> Option<DisplayHandle> {
        self.list_displays()
            .into_iter()
            .find(|display| display.id == id)
    }
}

/// Fixed display list, used by the dry run and by tests.
#[derive(Debug, Clone, Default)]
pub struct StaticDisplays {
    displays: Vec<RawDisplay>,
}

impl StaticDisplays {
    pub fn new(displays: Vec<RawDisplay>) -> Self {
        Self { displays }
    }
}

impl DisplayProvider for StaticDisplays {
    fn enumerate(&self) -> Result<Vec<RawDisplay>> {
        Ok(self.displays.clone())
    }
}
