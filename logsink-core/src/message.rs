//! Message model and the formatter shared by every writer.

use std::fmt::Display;

use serde_json::Value;

/// Line terminator used by the default separators.
pub const LINE_END: &str = "\n";

/// Anything a caller can hand to a writer.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Text(String),
    Structured(Value),
    /// An error with its chain of causes, outermost first.
    Error {
        message: String,
        context: Vec<String>,
    },
}

impl Message {
    /// Captures `error` together with its `source()` chain.
    pub fn from_error(error: &(dyn std::error::Error + 'static)) -> Self {
        let mut context = Vec::new();
        let mut source = error.source();
        while let Some(cause) = source {
            context.push(cause.to_string());
            source = cause.source();
        }
        Message::Error {
            message: error.to_string(),
            context,
        }
    }

    /// Best-effort coercion of any displayable value.
    pub fn display(value: impl Display) -> Self {
        Message::Text(value.to_string())
    }

    fn body(&self) -> String {
        match self {
            Message::Text(text) => text.clone(),
            Message::Structured(Value::Null) => String::new(),
            Message::Structured(Value::String(s)) => s.clone(),
            Message::Structured(value) => {
                serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
            }
            Message::Error { message, context } => {
                let mut out = message.clone();
                for cause in context {
                    out.push_str(LINE_END);
                    out.push_str("caused by: ");
                    out.push_str(cause);
                }
                out
            }
        }
    }
}

impl From<&str> for Message {
    fn from(value: &str) -> Self {
        Message::Text(value.to_string())
    }
}

impl From<String> for Message {
    fn from(value: String) -> Self {
        Message::Text(value)
    }
}

impl From<Value> for Message {
    fn from(value: Value) -> Self {
        Message::Structured(value)
    }
}

/// Renders `message` as text wrapped in `prefix` and `suffix`.
pub fn format(message: &Message, prefix: &str, suffix: &str) -> String {
    let body = message.body();
    let mut out = String::with_capacity(prefix.len() + body.len() + suffix.len());
    out.push_str(prefix);
    out.push_str(&body);
    out.push_str(suffix);
    out
}
