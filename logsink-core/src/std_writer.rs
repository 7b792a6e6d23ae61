use std::io::{self, Write};

use serde_json::Value;

use crate::{
    config::LOGSINK_CONFIG,
    error::{ErrorReporter, LogReporter, WriterError, raise},
    message::Message,
    writer::{Writer, format_default},
};

/// Writable standard streams of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StdStream {
    Out,
    Err,
}

impl StdStream {
    /// Resolves `out`, `err` (any case, surrounding whitespace ignored).
    pub fn resolve(name: &str) -> Result<Self, WriterError> {
        let symbol = format!("STD{}", name.trim().to_uppercase());
        match symbol.as_str() {
            "STDOUT" => Ok(StdStream::Out),
            "STDERR" => Ok(StdStream::Err),
            _ => Err(WriterError::UnknownStream(symbol)),
        }
    }

    fn write_all(self, bytes: &[u8]) -> io::Result<()> {
        match self {
            StdStream::Out => {
                let mut out = io::stdout().lock();
                out.write_all(bytes)?;
                out.flush()
            }
            StdStream::Err => {
                let mut err = io::stderr().lock();
                err.write_all(bytes)?;
                err.flush()
            }
        }
    }
}

/// Writes one line per message to stdout or stderr.
#[derive(Debug)]
pub struct StdWriter {
    stream: StdStream,
}

impl Default for StdWriter {
    /// Uses `LOGSINK_STD_STREAM`, falling back to stderr if it does not resolve.
    fn default() -> Self {
        let stream = StdStream::resolve(&LOGSINK_CONFIG.STD_STREAM).unwrap_or_else(|e| {
            LogReporter.report(&e);
            StdStream::Err
        });
        Self { stream }
    }
}

impl StdWriter {
    pub fn new(name: &str, reporter: &dyn ErrorReporter) -> Result<Self, WriterError> {
        let stream = StdStream::resolve(name).map_err(|e| raise(reporter, e))?;
        Ok(Self { stream })
    }

    pub fn stream(&self) -> StdStream {
        self.stream
    }
}

/// Formats `message` as exactly one terminated line.
fn render_line(message: &Message) -> String {
    let mut line = format_default(message).trim_matches('\n').to_string();
    line.push('\n');
    line
}

impl Writer for StdWriter {
    fn write(&self, message: &Message, _params: Option<&Value>) -> bool {
        self.stream
            .write_all(render_line(message).as_bytes())
            .is_ok()
    }
}
