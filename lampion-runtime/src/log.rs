//! Per-invocation function log sink.
//!
//! Handler output destined for the platform's log capture goes to standard
//! output, one line per entry, stamped with the request id. The runtime's
//! own diagnostics use `tracing` and are not routed through this sink.

use std::io::{self, LineWriter, Stdout, Write};

use chrono::Utc;
use once_cell::sync::Lazy;
use parking_lot::Mutex;

static STDOUT_SINK: Lazy<Mutex<LogSink<Stdout>>> = Lazy::new(|| Mutex::new(LogSink::stdout()));

/// Writes one line to the shared stdout sink. Write failures are discarded;
/// stdout itself failing leaves nowhere to report to.
pub(crate) fn write_line(request_id: &str, message: &str) {
    let _ = STDOUT_SINK.lock().log(request_id, message);
}

/// Line-buffered writer for handler log output.
pub struct LogSink<W: Write> {
    writer: LineWriter<W>,
}

impl LogSink<Stdout> {
    /// Sink writing to standard output, which the platform captures.
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> LogSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: LineWriter::new(writer),
        }
    }

    /// Writes one timestamped log line for the given request.
    pub fn log(&mut self, request_id: &str, message: &str) -> io::Result<()> {
        writeln!(
            self.writer,
            "{}\t{}\t{}",
            Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ"),
            request_id,
            message
        )
    }

    pub fn into_inner(self) -> io::Result<W> {
        self.writer.into_inner().map_err(io::IntoInnerError::into_error)
    }
}
