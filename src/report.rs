//! Error-tracking sink for listing-phase failures.
//!
//! The sink is a seam: production wires in [`LogSink`], tests record captured
//! errors, and a real exporter (Sentry or similar) can slot in without
//! touching the sync logic.

use tracing::error;

pub trait ErrorSink: Send + Sync {
    fn capture(&self, err: &anyhow::Error);
}

/// Sink that writes captured errors to the tracing pipeline.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl ErrorSink for LogSink {
    fn capture(&self, err: &anyhow::Error) {
        error!(?err, "captured error");
    }
}
