//! Run trace: an explicit logging handle threaded through the engine.
//!
//! There is no global logger.  A [`RunTrace`] is created per run invocation,
//! records the events that matter for diagnosing suspended executions, and
//! can optionally flush each event as a JSON line to a writer.

use crate::state::Status;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TraceEvent {
    BurstStart { pc: usize },
    BurstEnd { status: Status, steps: u64 },
    CognitiveCall { pc: usize, prompt: String },
    ErrorRecovered { pc: usize, message: String },
}

/// In-memory trace with an optional flushed JSON-lines writer.
pub struct RunTrace {
    entries: Vec<TraceEvent>,
    writer: Option<Box<dyn Write + Send>>,
    write_failures: usize,
}

impl RunTrace {
    /// An in-memory-only trace.
    pub fn new() -> Self {
        RunTrace {
            entries: Vec::new(),
            writer: None,
            write_failures: 0,
        }
    }

    /// A trace that appends JSON lines to the given file.
    pub fn with_file(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        Ok(RunTrace {
            entries: Vec::new(),
            writer: Some(Box::new(std::io::BufWriter::new(file))),
            write_failures: 0,
        })
    }

    /// A trace with a custom writer (useful for testing).
    pub fn with_writer(writer: Box<dyn Write + Send>) -> Self {
        RunTrace {
            entries: Vec::new(),
            writer: Some(writer),
            write_failures: 0,
        }
    }

    /// Record an event.  Write failures never interrupt execution; they are
    /// counted and the in-memory entry is kept regardless.
    pub fn record(&mut self, event: TraceEvent) {
        if let Some(ref mut w) = self.writer {
            let flushed = serde_json::to_string(&event)
                .map_err(std::io::Error::other)
                .and_then(|json| writeln!(w, "{json}").and_then(|_| w.flush()));
            if flushed.is_err() {
                self.write_failures += 1;
            }
        }
        self.entries.push(event);
    }

    pub fn entries(&self) -> &[TraceEvent] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn write_failures(&self) -> usize {
        self.write_failures
    }
}

impl Default for RunTrace {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Writer that shares its buffer so the test can inspect what was
    /// flushed.
    #[derive(Clone)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn records_in_memory() {
        let mut trace = RunTrace::new();
        trace.record(TraceEvent::BurstStart { pc: 0 });
        trace.record(TraceEvent::BurstEnd {
            status: Status::Complete,
            steps: 3,
        });
        assert_eq!(trace.len(), 2);
        assert_eq!(trace.entries()[0], TraceEvent::BurstStart { pc: 0 });
    }

    #[test]
    fn flushes_json_lines() {
        let buf = SharedBuf(Arc::new(Mutex::new(Vec::new())));
        let mut trace = RunTrace::with_writer(Box::new(buf.clone()));
        trace.record(TraceEvent::CognitiveCall {
            pc: 4,
            prompt: "what next?".into(),
        });
        let written = String::from_utf8(buf.0.lock().unwrap().clone()).unwrap();
        assert!(written.contains("\"event\":\"cognitive_call\""));
        assert!(written.contains("what next?"));
        assert_eq!(trace.write_failures(), 0);
    }

    #[test]
    fn write_failure_is_counted_not_fatal() {
        struct FailWriter;
        impl Write for FailWriter {
            fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
                Err(std::io::Error::other("disk full"))
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }
        let mut trace = RunTrace::with_writer(Box::new(FailWriter));
        trace.record(TraceEvent::BurstStart { pc: 0 });
        assert_eq!(trace.write_failures(), 1);
        assert_eq!(trace.len(), 1);
    }
}
