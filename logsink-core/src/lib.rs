//! # logsink-core
//! Interchangeable log sinks behind one [`Writer`] contract.
//!
//! ```rust
//! use logsink_core::{FileWriter, FileWriterConfig, NoOpReporter, Writer};
//!
//! let dir = std::env::temp_dir();
//! let writer = FileWriter::new(
//!     FileWriterConfig::new(dir.join("logsink-doc.log")),
//!     &NoOpReporter,
//! )
//! .expect("temp dir is writable");
//! assert!(writer.log(&"Hello, world!".into()));
//! ```
//!
//! With rotation enabled the file lands in `<dir>/<year>[/<month>|/<week>]/<pattern>.log`,
//! recomputed from the current time on every write:
//!
//! ```rust
//! use logsink_core::{FileWriter, FileWriterConfig, LogReporter, Rotation, Writer};
//!
//! let dir = std::env::temp_dir().join("logsink-doc-rotation");
//! std::fs::create_dir_all(&dir).unwrap();
//! let writer = FileWriter::new(
//!     FileWriterConfig::new(&dir).with_rotation(Rotation::Month),
//!     &LogReporter,
//! )
//! .unwrap();
//! writer.log(&serde_json::json!({"event": "boot"}).into());
//! std::fs::remove_dir_all(&dir).unwrap();
//! ```

mod clock;
mod config;
mod error;
mod file_writer;
mod mail_writer;
mod message;
mod std_writer;
mod writer;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{LOGSINK_CONFIG, LogsinkConfig};
pub use error::{ErrorReporter, LogReporter, NoOpReporter, Severity, WriterError};
pub use file_writer::{FileWriter, FileWriterConfig, Rotation, RotationFlag};
pub use mail_writer::{
    ComposedMail, MailComposer, MailRoute, MailTransport, MailWriter, Recipients, Senders,
    SendmailTransport,
};
pub use message::{LINE_END, Message, format};
pub use std_writer::{StdStream, StdWriter};
pub use writer::Writer;
