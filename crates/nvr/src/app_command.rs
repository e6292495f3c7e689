/// Commands sent to the main application loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppCommand {
    /// Run a retention sweep with the configured retention.
    Sweep,
    /// Stop all sessions and exit.
    Shutdown,
}
