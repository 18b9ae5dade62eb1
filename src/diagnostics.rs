//! Sink for the initializer's human-readable diagnostics.

/// Receives info and error diagnostics.
///
/// Injected into [`Connector`](crate::Connector) so the lifecycle messages can
/// be routed anywhere, including a recorder in tests.
pub trait Diagnostics: Send + Sync + 'static {
    fn info(&self, message: &str);

    fn error(&self, message: &str);
}

/// Forwards diagnostics to [`tracing`] at `INFO` and `ERROR` level.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingDiagnostics;

impl Diagnostics for TracingDiagnostics {
    fn info(&self, message: &str) {
        tracing::info!(target: "push_socket", "{message}");
    }

    fn error(&self, message: &str) {
        tracing::error!(target: "push_socket", "{message}");
    }
}
