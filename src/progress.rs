//! Progress reporting as an injected capability.
//!
//! The pipeline never depends on a sink for correctness, only for
//! observability, so callers can pass whatever surface fits: the default
//! forwards to `tracing`, tests usually pass [`NullSink`].

/// Receives coarse progress updates and noteworthy log lines from the
/// orchestrator and stages.
pub trait ProgressSink {
    /// A step-level status line ("separating vocals", "processing chunk 3").
    fn progress(&self, message: &str);

    /// A noteworthy event worth surfacing alongside the progress line.
    fn log(&self, message: &str);
}

/// Default sink: forwards everything to the tracing subscriber.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl ProgressSink for TracingSink {
    fn progress(&self, message: &str) {
        tracing::info!("{message}");
    }

    fn log(&self, message: &str) {
        tracing::info!("{message}");
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn progress(&self, _message: &str) {}

    fn log(&self, _message: &str) {}
}

#[cfg(test)]
mod tests {
    use super::{NullSink, ProgressSink, TracingSink};

    #[test]
    fn sinks_accept_messages() {
        let sinks: [&dyn ProgressSink; 2] = [&TracingSink, &NullSink];
        for sink in sinks {
            sink.progress("processing chunk 1");
            sink.log("skipped a malformed segment");
        }
    }

    #[test]
    fn sink_is_object_safe() {
        fn takes_dyn(_: &dyn ProgressSink) {}
        takes_dyn(&NullSink);
    }
}
