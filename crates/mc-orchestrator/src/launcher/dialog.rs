//! Dialog-handler collaborator

/// Dismisses interactive dialogs a freshly launched instance may raise
/// (license prompts, missing-library warnings) while the launcher waits for
/// it to bind a port.
pub trait DialogHandler: Send + Sync {
    /// Begin watching the process with the given pid
    fn start(&self, pid: u32);

    /// Stop watching; called once polling finishes, whatever the outcome
    fn stop(&self);
}
