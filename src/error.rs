use thiserror::Error;

/// Why a wallpaper application did not happen.
#[derive(Debug, Error)]
pub enum ApplyError {
    /// The requested display id does not match any attached display.
    #[error("display {0} is not attached")]
    DisplayNotFound(String),

    /// The media file could not be opened for the duration of the apply.
    #[error("access denied to {path}: {reason}")]
    AccessDenied { path: String, reason: String },

    /// The platform refused to set the wallpaper.
    #[error("platform apply failed: {0}")]
    PlatformApplyFailed(String),

    /// The candidate pool for a rule was empty.
    #[error("no candidates for rule {0}")]
    NoCandidates(String),

    /// The rule/media store could not be read.
    #[error("media library unavailable: {0:#}")]
    Store(anyhow::Error),
}

impl ApplyError {
    /// Short machine-friendly label used in logs and history records.
    pub fn kind(&self) -> &'static str {
        match self {
            ApplyError::DisplayNotFound(_) => "not-found",
            ApplyError::AccessDenied { .. } => "access-denied",
            ApplyError::PlatformApplyFailed(_) => "platform-apply-failed",
            ApplyError::NoCandidates(_) => "no-candidates",
            ApplyError::Store(_) => "store",
        }
    }
}
