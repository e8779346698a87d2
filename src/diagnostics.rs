//! # Diagnostic sinks for fault reports.
//!
//! When an iteration panics, the loop renders a [`FaultReport`](crate::FaultReport)
//! to text and hands it to the loop's [`DiagnosticSink`], if one is configured.
//! Without a sink the report is dropped (the fault itself still propagates).
//!
//! Provided sinks:
//! - any `Fn(&str) + Send + Sync` closure
//! - [`WriterSink`] around an [`std::io::Write`] (file, stderr, buffer)
//! - [`NoopSink`] which discards everything
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use loopvisor::{DiagnosticSink, WriterSink};
//!
//! let sink: Arc<dyn DiagnosticSink> = Arc::new(WriterSink::new(std::io::stderr()));
//! let from_closure: Arc<dyn DiagnosticSink> = Arc::new(|report: &str| eprintln!("{report}"));
//! # let _ = (sink, from_closure);
//! ```

use std::io::Write;
use std::sync::{Mutex, PoisonError};

/// Accepts raw diagnostic text.
///
/// Called from the faulting loop's execution context; keep it quick.
pub trait DiagnosticSink: Send + Sync + 'static {
    /// Writes one report.
    fn write_report(&self, report: &str);
}

impl<F> DiagnosticSink for F
where
    F: Fn(&str) + Send + Sync + 'static,
{
    fn write_report(&self, report: &str) {
        self(report)
    }
}

/// Sink writing each report to an [`std::io::Write`], followed by a newline.
///
/// Write errors are logged and otherwise ignored.
#[derive(Debug)]
pub struct WriterSink<W> {
    inner: Mutex<W>,
}

impl<W> WriterSink<W> {
    /// Wraps a writer.
    pub fn new(writer: W) -> Self {
        Self {
            inner: Mutex::new(writer),
        }
    }

    /// Returns the wrapped writer.
    pub fn into_inner(self) -> W {
        self.inner
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl<W> DiagnosticSink for WriterSink<W>
where
    W: Write + Send + 'static,
{
    fn write_report(&self, report: &str) {
        let mut w = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let res = w
            .write_all(report.as_bytes())
            .and_then(|_| w.write_all(b"\n"))
            .and_then(|_| w.flush());
        if let Err(err) = res {
            tracing::warn!(%err, "failed to write fault report");
        }
    }
}

/// Sink that discards every report.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl DiagnosticSink for NoopSink {
    fn write_report(&self, _report: &str) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writer_sink_appends_newline() {
        let sink = WriterSink::new(Vec::new());
        sink.write_report("first");
        sink.write_report("second");
        assert_eq!(sink.into_inner(), b"first\nsecond\n");
    }

    #[test]
    fn closures_are_sinks() {
        let seen = std::sync::Arc::new(Mutex::new(Vec::new()));
        let store = std::sync::Arc::clone(&seen);
        let sink = move |r: &str| store.lock().unwrap().push(r.to_owned());
        sink.write_report("x");
        assert_eq!(*seen.lock().unwrap(), vec!["x".to_owned()]);
    }
}
