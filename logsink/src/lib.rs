//! # logsink
//! Route the `log` facade into a single file, mail or standard stream sink.
//!
//! ## Usage
//! ```toml
//! // Cargo.toml
//! ...
//! [dependencies]
//! logsink = "0.1.0"
//! ```
//!
//! ```rust
//! use logsink::logger_config;
//!
//! logger_config()
//!     .with_name("main")
//!     .init_global()
//!     .expect("a logger is already installed");
//! log::info!("Hello, world!");
//! ```
//!
//! ## Logging to files
//! The log file is created if it does not exist and appended to if it does.
//! Pointing at a directory with rotation places files in `<year>/<month>` or
//! `<year>/<week>` folders created on demand.
//!
//! ```rust,no_run
//! use logsink::{Rotation, logger_config};
//!
//! logger_config()
//!     .with_rotating_dir("/var/log/app", Rotation::Month)
//!     .expect("log directory is not writable")
//!     .init_global()
//!     .unwrap();
//! log::warn!("disk almost full");
//! ```

mod utils;

use std::path::Path;

use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};

pub use logsink_core::{
    ErrorReporter, FileWriter, FileWriterConfig, LogReporter, MailRoute, MailWriter, Message,
    NoOpReporter, Rotation, RotationFlag, StdWriter, Writer, WriterError,
};

use utils::format_record;

/// Crates whose records are never fed back into a sink.
const OWN_CRATES: [&str; 2] = ["logsink_core", "logsink"];

fn is_own_target(target: &str) -> bool {
    OWN_CRATES.iter().any(|krate| {
        target
            .strip_prefix(krate)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with("::"))
    })
}

/// `log::Log` implementation that hands every record to one writer.
pub struct SinkLogger<W> {
    writer: W,
    name: Option<String>,
    level: LevelFilter,
}

impl<W: Writer> SinkLogger<W> {
    pub fn new(writer: W, name: Option<String>, level: LevelFilter) -> Self {
        Self {
            writer,
            name,
            level,
        }
    }

    pub fn writer(&self) -> &W {
        &self.writer
    }
}

impl<W: Writer> Log for SinkLogger<W> {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level && !is_own_target(metadata.target())
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = format_record(
            &record.args().to_string(),
            record.level(),
            self.name.as_deref(),
        );
        self.writer.log(&Message::Text(line));
    }

    fn flush(&self) {}
}

/// Builder for configuring and initializing the logger.
pub struct ConfigBuilder {
    writer: Option<Box<dyn Writer>>,
    log_level: LevelFilter,
    name: Option<String>,
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self {
            writer: None,
            log_level: LevelFilter::Info,
            name: None,
        }
    }
}

impl ConfigBuilder {
    /// Builds the logger. Without a configured sink, records go to the
    /// stream named by `LOGSINK_STD_STREAM`.
    pub fn build(self) -> SinkLogger<Box<dyn Writer>> {
        let Self {
            writer,
            log_level,
            name,
        } = self;
        let writer = writer.unwrap_or_else(|| Box::new(StdWriter::default()));
        SinkLogger::new(writer, name, log_level)
    }

    /// Sets a log file.
    pub fn with_log_file<P: AsRef<Path>>(self, path: P) -> Result<Self, WriterError> {
        let writer = FileWriter::new(FileWriterConfig::new(path.as_ref()), &LogReporter)?;
        Ok(self.with_writer(writer))
    }

    /// Logs into dated files below `dir`.
    pub fn with_rotating_dir<P: AsRef<Path>, R: Into<RotationFlag>>(
        self,
        dir: P,
        rotation: R,
    ) -> Result<Self, WriterError> {
        let config = FileWriterConfig::new(dir.as_ref()).with_rotation(rotation);
        let writer = FileWriter::new(config, &LogReporter)?;
        Ok(self.with_writer(writer))
    }

    /// Logs to a standard stream, `"out"` or `"err"`.
    pub fn with_std(self, name: &str) -> Result<Self, WriterError> {
        let writer = StdWriter::new(name, &LogReporter)?;
        Ok(self.with_writer(writer))
    }

    /// Uses any writer, replacing a previously configured one.
    pub fn with_writer<W: Writer + 'static>(self, writer: W) -> Self {
        Self {
            writer: Some(Box::new(writer)),
            ..self
        }
    }

    /// Sets a log name
    pub fn with_name(self, name: &str) -> Self {
        Self {
            name: Some(name.into()),
            ..self
        }
    }

    /// Maybe sets a log name
    pub fn maybe_with_name(self, name: Option<&str>) -> Self {
        Self {
            name: name.map(String::from),
            ..self
        }
    }

    pub fn with_level(self, log_level: LevelFilter) -> Self {
        Self { log_level, ..self }
    }

    /// Installs the logger for the whole process.
    pub fn init_global(self) -> Result<(), SetLoggerError> {
        let level = self.log_level;
        log::set_boxed_logger(Box::new(self.build()))?;
        log::set_max_level(level);
        Ok(())
    }
}

/// Returns a default ConfigBuilder for configuring the logger.
pub fn logger_config() -> ConfigBuilder {
    ConfigBuilder::default()
}
