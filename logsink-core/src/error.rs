use std::path::PathBuf;

use thiserror::Error;

/// How serious a reported failure is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
}

/// Failures raised while constructing a writer.
///
/// These are fatal to the writer being built. Failures while writing are
/// reported through the `bool` result of [`crate::Writer::write`] instead.
#[derive(Debug, Error)]
pub enum WriterError {
    #[error("log file dir: {} does not exist or is not writable", .0.display())]
    DirectoryNotWritable(PathBuf),
    #[error("rotation value: {0:?} is not a valid rotation flag (expected one of d, w, m)")]
    InvalidRotation(String),
    #[error("std type: {0} is not defined")]
    UnknownStream(String),
}

impl WriterError {
    /// Stable numeric code identifying the failure site.
    pub fn code(&self) -> u32 {
        match self {
            WriterError::DirectoryNotWritable(_) => 1_180_101,
            WriterError::InvalidRotation(_) => 1_180_102,
            WriterError::UnknownStream(_) => 1_200_101,
        }
    }

    pub fn severity(&self) -> Severity {
        Severity::Error
    }
}

/// Observer notified of every construction failure before it is returned.
pub trait ErrorReporter: Send + Sync {
    fn report(&self, error: &WriterError);
}

/// Forwards failures to the `log` facade.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogReporter;

impl ErrorReporter for LogReporter {
    fn report(&self, error: &WriterError) {
        match error.severity() {
            Severity::Error => log::error!("[{}] {error}", error.code()),
        }
    }
}

/// Discards failures. Useful in tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpReporter;

impl ErrorReporter for NoOpReporter {
    fn report(&self, _error: &WriterError) {}
}

/// Hands `error` to `reporter` and gives it back for propagation.
pub(crate) fn raise(reporter: &dyn ErrorReporter, error: WriterError) -> WriterError {
    reporter.report(&error);
    error
}
