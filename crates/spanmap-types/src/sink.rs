// Tracer-scoped diagnostic sink.
//
// The engine must never crash the host application over logging, so every
// call site goes through `emit`, which tolerates the absence of a sink.

use serde_json::Value;
use std::io::Write;

/// Severity levels accepted by the diagnostic sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Debug,
    Info,
    Warning,
    Error,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warning => "warning",
            Level::Error => "error",
        }
    }
}

/// Destination for diagnostics produced by the compiler and the runtime.
///
/// Implementations must be callable from multiple threads.
pub trait DiagnosticSink: Send + Sync {
    fn emit(&self, level: Level, message: &str);

    /// Emit with optional structured payload. The default ignores the
    /// payload; sinks that forward to a structured backend override this.
    fn emit_with(&self, level: Level, message: &str, data: Option<&Value>) {
        let _ = data;
        self.emit(level, message);
    }
}

/// Emit through an optional sink; absence of a sink is not an error.
pub fn emit(sink: Option<&dyn DiagnosticSink>, level: Level, message: &str) {
    if let Some(sink) = sink {
        sink.emit(level, message);
    }
}

/// Sink that discards every diagnostic.
pub struct NullSink;

impl DiagnosticSink for NullSink {
    fn emit(&self, _level: Level, _message: &str) {}
}

/// Sink that writes to stderr, filtered by a minimum level. Used by the
/// CLI; write failures (e.g. a closed pipe) are ignored.
pub struct StderrSink {
    pub min_level: Level,
}

impl StderrSink {
    pub fn new(min_level: Level) -> Self {
        Self { min_level }
    }
}

impl DiagnosticSink for StderrSink {
    fn emit(&self, level: Level, message: &str) {
        if level >= self.min_level {
            let mut stderr = std::io::stderr().lock();
            let _ = writeln!(stderr, "[{}] {}", level.as_str(), message);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct CollectingSink {
        messages: Mutex<Vec<(Level, String)>>,
    }

    impl DiagnosticSink for CollectingSink {
        fn emit(&self, level: Level, message: &str) {
            self.messages
                .lock()
                .unwrap()
                .push((level, message.to_string()));
        }
    }

    #[test]
    fn test_emit_without_sink_is_noop() {
        emit(None, Level::Error, "lost");
    }

    #[test]
    fn test_emit_forwards_to_sink() {
        let sink = CollectingSink {
            messages: Mutex::new(Vec::new()),
        };
        emit(Some(&sink), Level::Warning, "heads up");
        let messages = sink.messages.lock().unwrap();
        assert_eq!(messages.as_slice(), &[(Level::Warning, "heads up".to_string())]);
    }

    #[test]
    fn test_level_ordering() {
        assert!(Level::Debug < Level::Info);
        assert!(Level::Info < Level::Warning);
        assert!(Level::Warning < Level::Error);
    }
}
