//! Progress reporting for long loads.

/// Callback surface for directory and file loading. `notify` is the
/// cancellation boundary: long passes call it between units of work and
/// stop when it returns `false`.
pub trait LoadObserver: Send + Sync {
    /// Report liveness; return `false` to cancel the load.
    fn notify(&self) -> bool;

    /// Loading completed.
    fn finish(&self);

    /// Loading failed; `message` carries the parser diagnostic.
    fn error(&self, message: &str);
}

/// Observer that ignores everything and never cancels.
#[derive(Debug, Default)]
pub struct NullObserver;

impl LoadObserver for NullObserver {
    fn notify(&self) -> bool {
        true
    }

    fn finish(&self) {}

    fn error(&self, message: &str) {
        tracing::debug!(message, "load error with no observer attached");
    }
}
