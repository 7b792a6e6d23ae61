use std::sync::Arc;

use serde_json::Value;

use crate::message::{self, LINE_END, Message};

/// A sink for formatted log text.
pub trait Writer: Send + Sync {
    /// Persists `message`. Returns whether the write fully succeeded.
    fn write(&self, message: &Message, params: Option<&Value>) -> bool;

    fn format(&self, message: &Message, prefix: &str, suffix: &str) -> String {
        message::format(message, prefix, suffix)
    }

    fn log(&self, message: &Message) -> bool {
        self.write(message, None)
    }
}

/// Separators used when a writer has no reason to pick its own.
pub(crate) fn format_default(message: &Message) -> String {
    message::format(message, LINE_END, LINE_END)
}

impl<W: Writer + ?Sized> Writer for Box<W> {
    fn write(&self, message: &Message, params: Option<&Value>) -> bool {
        (**self).write(message, params)
    }
}

impl<W: Writer + ?Sized> Writer for Arc<W> {
    fn write(&self, message: &Message, params: Option<&Value>) -> bool {
        (**self).write(message, params)
    }
}
