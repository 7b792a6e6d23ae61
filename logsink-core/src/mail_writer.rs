use std::{
    io::{self, Write},
    path::PathBuf,
    process::{Command, Stdio},
    sync::{Arc, LazyLock},
};

use regex::Regex;
use serde_json::Value;

use crate::{config::LOGSINK_CONFIG, message::Message, writer::Writer};

static RECIPIENT_SEPARATOR: LazyLock<Regex> = LazyLock::new(|| Regex::new("[,;]").unwrap());

const DEFAULT_PRIORITY: i32 = 3;
const DEFAULT_ENCODING: &str = "utf-8";

/// A message prepared by a [`MailComposer`].
#[derive(Debug, Clone, PartialEq)]
pub struct ComposedMail {
    pub body: String,
    pub subject: String,
    pub body_override: Option<String>,
    pub from: Vec<String>,
    pub priority: i32,
}

/// External collaborator that owns recipients and delivery.
pub trait MailComposer: Send + Sync {
    fn compose(
        &self,
        body: &str,
        subject: &str,
        body_override: Option<&str>,
        from: &[String],
        priority: i32,
    ) -> ComposedMail;

    /// Delivers `mail`; a positive result means success.
    fn dispatch(&self, mail: &ComposedMail) -> i64;
}

/// Single-recipient send primitive.
pub trait MailTransport: Send + Sync {
    fn send(&self, to: &str, subject: &str, body: &str, headers: &str) -> bool;
}

/// Pipes each message into a sendmail-compatible binary.
#[derive(Debug, Clone)]
pub struct SendmailTransport {
    program: PathBuf,
}

impl Default for SendmailTransport {
    fn default() -> Self {
        Self::new(&LOGSINK_CONFIG.SENDMAIL_PATH)
    }
}

impl SendmailTransport {
    pub fn new<P: Into<PathBuf>>(program: P) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn deliver(&self, to: &str, subject: &str, body: &str, headers: &str) -> io::Result<bool> {
        let mut child = Command::new(&self.program)
            .arg("-i")
            .arg("--")
            .arg(to)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .spawn()?;
        // stdin is closed before waiting, and the child is reaped even if writing failed.
        let written = match child.stdin.take() {
            Some(mut stdin) => write_message(&mut stdin, to, subject, body, headers),
            None => Ok(()),
        };
        let status = child.wait()?;
        written?;
        Ok(status.success())
    }
}

fn write_message(
    out: &mut impl Write,
    to: &str,
    subject: &str,
    body: &str,
    headers: &str,
) -> io::Result<()> {
    write!(out, "To: {to}\r\nSubject: {subject}\r\n")?;
    if !headers.is_empty() {
        write!(out, "{headers}\r\n")?;
    }
    write!(out, "\r\n{body}")
}

impl MailTransport for SendmailTransport {
    fn send(&self, to: &str, subject: &str, body: &str, headers: &str) -> bool {
        self.deliver(to, subject, body, headers).unwrap_or_else(|e| {
            log::warn!("unable to run {}: {e}", self.program.display());
            false
        })
    }
}

/// Normalized list of recipient addresses.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Recipients(Vec<String>);

impl Recipients {
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    fn normalize<'a>(raw: impl IntoIterator<Item = &'a str>) -> Self {
        Self(
            raw.into_iter()
                .map(|address| address.trim().to_lowercase())
                .filter(|address| !address.is_empty())
                .collect(),
        )
    }
}

impl From<&str> for Recipients {
    fn from(value: &str) -> Self {
        Self::normalize(RECIPIENT_SEPARATOR.split(value))
    }
}

impl From<String> for Recipients {
    fn from(value: String) -> Self {
        Self::from(value.as_str())
    }
}

impl From<Vec<String>> for Recipients {
    fn from(value: Vec<String>) -> Self {
        Self::normalize(value.iter().map(String::as_str))
    }
}

impl From<&[&str]> for Recipients {
    fn from(value: &[&str]) -> Self {
        Self::normalize(value.iter().copied())
    }
}

impl<const N: usize> From<[&str; N]> for Recipients {
    fn from(value: [&str; N]) -> Self {
        Self::normalize(value)
    }
}

/// Sender addresses in order, trimmed but otherwise kept as given.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Senders(Vec<String>);

impl Senders {
    fn collect<S: AsRef<str>>(raw: impl IntoIterator<Item = S>) -> Self {
        Self(
            raw.into_iter()
                .map(|address| address.as_ref().trim().to_string())
                .filter(|address| !address.is_empty())
                .collect(),
        )
    }
}

impl From<&str> for Senders {
    fn from(value: &str) -> Self {
        Self::collect([value])
    }
}

impl From<String> for Senders {
    fn from(value: String) -> Self {
        Self::collect([value])
    }
}

impl From<Vec<String>> for Senders {
    fn from(value: Vec<String>) -> Self {
        Self::collect(value)
    }
}

impl From<&[&str]> for Senders {
    fn from(value: &[&str]) -> Self {
        Self::collect(value)
    }
}

impl<const N: usize> From<[&str; N]> for Senders {
    fn from(value: [&str; N]) -> Self {
        Self::collect(value)
    }
}

/// How a [`MailWriter`] delivers, decided once at construction.
pub enum MailRoute {
    Composer(Arc<dyn MailComposer>),
    Direct {
        recipients: Recipients,
        transport: Arc<dyn MailTransport>,
    },
}

impl MailRoute {
    pub fn composer(composer: Arc<dyn MailComposer>) -> Self {
        MailRoute::Composer(composer)
    }

    pub fn direct<R: Into<Recipients>>(recipients: R, transport: Arc<dyn MailTransport>) -> Self {
        MailRoute::Direct {
            recipients: recipients.into(),
            transport,
        }
    }

    /// Direct delivery through [`SendmailTransport::default`].
    pub fn sendmail<R: Into<Recipients>>(recipients: R) -> Self {
        Self::direct(recipients, Arc::new(SendmailTransport::default()))
    }
}

/// Sends every log message as an email.
pub struct MailWriter {
    route: MailRoute,
    subject: String,
    from: Vec<String>,
    priority: i32,
    encoding: String,
    headers: Vec<String>,
}

impl MailWriter {
    pub fn new(route: MailRoute, subject: &str) -> Self {
        Self {
            route,
            subject: subject.trim().to_string(),
            from: Vec::new(),
            priority: DEFAULT_PRIORITY,
            encoding: DEFAULT_ENCODING.into(),
            headers: Vec::new(),
        }
    }

    /// Sender address or addresses. Only the first one ends up in a direct `From:` header.
    pub fn with_from<F: Into<Senders>>(self, from: F) -> Self {
        Self {
            from: from.into().0,
            ..self
        }
    }

    /// 1 is the highest priority, 3 is normal.
    pub fn with_priority(self, priority: i32) -> Self {
        Self { priority, ..self }
    }

    pub fn with_encoding(self, encoding: &str) -> Self {
        Self {
            encoding: encoding.trim().to_lowercase(),
            ..self
        }
    }

    /// Extra header lines appended after the generated ones.
    pub fn with_headers<I, S>(self, headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            headers: headers.into_iter().map(Into::into).collect(),
            ..self
        }
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Header block used for direct delivery, lines joined by CRLF.
    pub fn header_block(&self) -> String {
        let mut headers = vec![
            "MIME-Version: 1.0".to_string(),
            format!("Content-type: text/plain; charset={}", self.encoding),
            format!("X-Mailer: logsink/{}", env!("CARGO_PKG_VERSION")),
        ];
        if let Some(from) = self.from.first() {
            headers.push(format!("From: {}", from.trim()));
        }
        if self.priority == 1 {
            headers.push("X-Priority: 1 (Highest)".into());
            headers.push("X-MSMail-Priority: High".into());
            headers.push("Importance: High".into());
        }
        headers.extend(self.headers.iter().cloned());
        headers.join("\r\n")
    }
}

impl Writer for MailWriter {
    fn write(&self, message: &Message, _params: Option<&Value>) -> bool {
        let body = self.format(message, "\n", "\n\n");
        match &self.route {
            MailRoute::Composer(composer) => {
                let mail =
                    composer.compose(&body, &self.subject, None, &self.from, self.priority);
                composer.dispatch(&mail) > 0
            }
            MailRoute::Direct {
                recipients,
                transport,
            } => {
                let headers = self.header_block();
                // Every recipient is attempted even after a failure.
                let failed = recipients
                    .as_slice()
                    .iter()
                    .filter(|to| !transport.send(to, &self.subject, &body, &headers))
                    .count();
                if failed > 0 {
                    log::warn!(
                        "mail delivery failed for {failed} of {} recipients",
                        recipients.as_slice().len()
                    );
                }
                failed == 0
            }
        }
    }
}
