/// Requests delivered to the engine task from signals and other host plumbing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCommand {
    /// Start (or restart) the scheduler and evaluate immediately.
    Start,
    Stop,
    /// Evaluate once now, subject to the debounce guard.
    ApplyNow,
    Pause,
    Resume,
    TogglePause,
    /// Display geometry changed; rebuild any video session.
    DisplaysChanged,
    /// Power state changed; re-check without waiting for the poll.
    PowerChanged,
    /// The player on this display reached the end of its media.
    EndOfMedia(String),
}
