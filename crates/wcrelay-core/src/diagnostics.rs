//! Diagnostics sink for failures that have no caller to report to.

/// Fire-and-forget logging sink. Implementations must never panic.
pub trait Diagnostics: Send + Sync + 'static {
    fn log(&self, message: &str);
    fn error(&self, message: &str);
}

/// Forwards diagnostics to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingDiagnostics;

impl Diagnostics for TracingDiagnostics {
    fn log(&self, message: &str) {
        tracing::info!(target: "wcrelay", "{message}");
    }

    fn error(&self, message: &str) {
        tracing::error!(target: "wcrelay", "{message}");
    }
}
