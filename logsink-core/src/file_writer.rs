use std::{
    fmt::Write as _,
    fs::{self, OpenOptions},
    io::{self, Write},
    path::{Path, PathBuf},
    sync::Arc,
};

use chrono::{Datelike, NaiveDateTime};
use serde_json::Value;

use crate::{
    clock::{Clock, SystemClock},
    config::LOGSINK_CONFIG,
    error::{ErrorReporter, WriterError, raise},
    message::Message,
    writer::{Writer, format_default},
};

/// Mode for rotation folders: world writable with the setgid bit.
const DIR_MODE: u32 = 0o2777;
/// Mode for freshly created log files.
const FILE_MODE: u32 = 0o666;
const FALLBACK_PATTERN: &str = "%Y%m%d";

/// Time bucket used to place log files below the base directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Rotation {
    #[default]
    None,
    /// `<year>/<file>`; the day lives in the file name.
    Day,
    /// `<year>/<iso week>/<file>`
    Week,
    /// `<year>/<month>/<file>`
    Month,
}

/// Raw rotation setting as a caller provides it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RotationFlag {
    Enabled(bool),
    Letter(String),
}

impl Default for RotationFlag {
    fn default() -> Self {
        RotationFlag::Enabled(false)
    }
}

impl From<bool> for RotationFlag {
    fn from(value: bool) -> Self {
        RotationFlag::Enabled(value)
    }
}

impl From<&str> for RotationFlag {
    fn from(value: &str) -> Self {
        RotationFlag::Letter(value.to_string())
    }
}

impl From<String> for RotationFlag {
    fn from(value: String) -> Self {
        RotationFlag::Letter(value)
    }
}

impl From<Rotation> for RotationFlag {
    fn from(value: Rotation) -> Self {
        match value {
            Rotation::None => RotationFlag::Enabled(false),
            Rotation::Day => "d".into(),
            Rotation::Week => "w".into(),
            Rotation::Month => "m".into(),
        }
    }
}

impl Rotation {
    pub fn from_flag(flag: &RotationFlag) -> Result<Self, WriterError> {
        match flag {
            RotationFlag::Enabled(true) => Ok(Rotation::Day),
            RotationFlag::Enabled(false) => Ok(Rotation::None),
            RotationFlag::Letter(raw) => match raw.trim().to_lowercase().as_str() {
                "" => Ok(Rotation::None),
                "d" => Ok(Rotation::Day),
                "w" => Ok(Rotation::Week),
                "m" => Ok(Rotation::Month),
                _ => Err(WriterError::InvalidRotation(raw.clone())),
            },
        }
    }

    pub fn is_enabled(self) -> bool {
        self != Rotation::None
    }
}

/// Configuration for a [`FileWriter`].
#[derive(Debug, Clone)]
pub struct FileWriterConfig {
    /// Either a log file (its parent becomes the base directory) or a directory.
    pub path: PathBuf,
    pub rotation: RotationFlag,
    /// strftime pattern for synthesized file names, `.log` is appended.
    pub file_name_pattern: String,
}

impl FileWriterConfig {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            rotation: RotationFlag::default(),
            file_name_pattern: LOGSINK_CONFIG.FILE_NAME_PATTERN.clone(),
        }
    }

    pub fn with_rotation<R: Into<RotationFlag>>(self, rotation: R) -> Self {
        Self {
            rotation: rotation.into(),
            ..self
        }
    }

    pub fn with_file_name_pattern(self, pattern: &str) -> Self {
        Self {
            file_name_pattern: pattern.into(),
            ..self
        }
    }
}

enum FileName {
    Fixed(String),
    /// Synthesized from the clock on every write.
    Dated,
}

/// Appends formatted messages to a log file, optionally placed in
/// year/month/week folders derived from the current time.
pub struct FileWriter {
    base_dir: PathBuf,
    file_name: FileName,
    pattern: String,
    rotation: Rotation,
    clock: Arc<dyn Clock>,
}

impl FileWriter {
    pub fn new(
        config: FileWriterConfig,
        reporter: &dyn ErrorReporter,
    ) -> Result<Self, WriterError> {
        Self::with_clock(config, Arc::new(SystemClock), reporter)
    }

    pub fn with_clock(
        config: FileWriterConfig,
        clock: Arc<dyn Clock>,
        reporter: &dyn ErrorReporter,
    ) -> Result<Self, WriterError> {
        let FileWriterConfig {
            path,
            rotation,
            file_name_pattern,
        } = config;

        let (base_dir, explicit_name) = if path.is_dir() {
            (path, None)
        } else {
            let name = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned());
            let parent = match path.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
                _ => PathBuf::from("."),
            };
            (parent, name)
        };
        if !is_writable_dir(&base_dir) {
            return Err(raise(reporter, WriterError::DirectoryNotWritable(base_dir)));
        }
        let rotation = Rotation::from_flag(&rotation).map_err(|e| raise(reporter, e))?;

        let file_name = match (rotation, explicit_name) {
            (Rotation::None, Some(name)) => FileName::Fixed(name),
            (Rotation::None, None) => {
                FileName::Fixed(synthesize_name(&file_name_pattern, clock.now()))
            }
            _ => FileName::Dated,
        };
        log::debug!(
            "file writer ready in {} (rotation: {rotation:?})",
            base_dir.display()
        );
        Ok(Self {
            base_dir,
            file_name,
            pattern: file_name_pattern,
            rotation,
            clock,
        })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn rotation(&self) -> Rotation {
        self.rotation
    }

    /// Path the next write would go to. Nothing is created.
    pub fn target_path(&self) -> PathBuf {
        let now = self.clock.now();
        self.rotation_dir(now, false)
            .unwrap_or_else(|_| self.base_dir.clone())
            .join(self.file_name_at(now))
    }

    fn file_name_at(&self, now: NaiveDateTime) -> String {
        match &self.file_name {
            FileName::Fixed(name) => name.clone(),
            FileName::Dated => synthesize_name(&self.pattern, now),
        }
    }

    /// Directory for `now`, creating each rotation level when `create` is set.
    fn rotation_dir(&self, now: NaiveDateTime, create: bool) -> io::Result<PathBuf> {
        let mut dir = self.base_dir.clone();
        if !self.rotation.is_enabled() {
            return Ok(dir);
        }
        dir.push(format!("{:04}", now.year()));
        if create {
            ensure_dir(&dir)?;
        }
        let sub = match self.rotation {
            Rotation::Month => format!("{:02}", now.month()),
            Rotation::Week => format!("{:02}", now.iso_week().week()),
            Rotation::Day | Rotation::None => return Ok(dir),
        };
        dir.push(sub);
        if create {
            ensure_dir(&dir)?;
        }
        Ok(dir)
    }

    fn persist(&self, text: &str, now: NaiveDateTime) -> io::Result<(PathBuf, usize)> {
        let path = self.rotation_dir(now, true)?.join(self.file_name_at(now));
        let written = append(&path, text)?;
        Ok((path, written))
    }
}

impl Writer for FileWriter {
    fn write(&self, message: &Message, _params: Option<&Value>) -> bool {
        let text = format_default(message);
        match self.persist(&text, self.clock.now()) {
            Ok((_, written)) => written > 0 && written == text.len(),
            Err(e) => {
                log::warn!("unable to write log file in {}: {e}", self.base_dir.display());
                false
            }
        }
    }
}

/// Existing directory the current process may create entries in.
fn is_writable_dir(dir: &Path) -> bool {
    if !dir.is_dir() {
        return false;
    }
    has_write_access(dir)
}

#[cfg(unix)]
fn has_write_access(dir: &Path) -> bool {
    use nix::unistd::{AccessFlags, access};
    access(dir, AccessFlags::W_OK).is_ok()
}

#[cfg(not(unix))]
fn has_write_access(dir: &Path) -> bool {
    fs::metadata(dir)
        .map(|meta| !meta.permissions().readonly())
        .unwrap_or(false)
}

fn synthesize_name(pattern: &str, now: NaiveDateTime) -> String {
    let mut name = String::new();
    if write!(name, "{}", now.format(pattern)).is_err() {
        log::warn!("invalid file name pattern {pattern:?}, using {FALLBACK_PATTERN}");
        name = now.format(FALLBACK_PATTERN).to_string();
    }
    name.push_str(".log");
    name
}

/// Creates `dir` unless it already exists, tolerating a concurrent creator.
fn ensure_dir(dir: &Path) -> io::Result<()> {
    match fs::create_dir(dir) {
        Ok(()) => {
            set_mode(dir, DIR_MODE);
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists && dir.is_dir() => Ok(()),
        Err(e) => Err(e),
    }
}

/// Appends through `O_APPEND` so concurrent processes do not clobber each other.
fn append(path: &Path, text: &str) -> io::Result<usize> {
    let existed = path.is_file();
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(text.as_bytes())?;
    if !existed {
        set_mode(path, FILE_MODE);
    }
    Ok(text.len())
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) {
    use std::os::unix::fs::PermissionsExt;
    if let Err(e) = fs::set_permissions(path, fs::Permissions::from_mode(mode)) {
        log::debug!("unable to chmod {:o} {}: {e}", mode, path.display());
    }
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) {}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::{clock::ManualClock, error::NoOpReporter, error::testing::RecordingReporter};

    fn at(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn writer_at(
        config: FileWriterConfig,
        now: NaiveDateTime,
    ) -> (FileWriter, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(now));
        let writer = FileWriter::with_clock(config, clock.clone(), &NoOpReporter).unwrap();
        (writer, clock)
    }

    #[test]
    fn test_day_rotation_example() {
        let dir = tempfile::tempdir().unwrap();
        let (writer, _) = writer_at(
            FileWriterConfig::new(dir.path())
                .with_rotation("d")
                .with_file_name_pattern("%Y%m%d"),
            at(2024, 1, 15),
        );
        assert!(writer.log(&"boot ok".into()));
        let file = dir.path().join("2024").join("20240115.log");
        assert_eq!(fs::read_to_string(file).unwrap(), "\nboot ok\n");
    }

    #[test]
    fn test_appends_in_call_order_without_rotation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");
        let writer = FileWriter::new(FileWriterConfig::new(&path), &NoOpReporter).unwrap();
        assert_eq!(writer.base_dir(), dir.path());
        assert_eq!(writer.rotation(), Rotation::None);
        assert!(writer.log(&"first".into()));
        assert!(writer.log(&"second".into()));
        assert_eq!(fs::read_to_string(&path).unwrap(), "\nfirst\n\nsecond\n");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_directory_without_rotation_synthesizes_name_once() {
        let dir = tempfile::tempdir().unwrap();
        let (writer, clock) = writer_at(FileWriterConfig::new(dir.path()), at(2024, 3, 9));
        clock.set(at(2024, 3, 10));
        assert!(writer.log(&"hello".into()));
        assert!(dir.path().join("20240309.log").is_file());
        assert_eq!(writer.target_path(), dir.path().join("20240309.log"));
    }

    #[test]
    fn test_missing_directory_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let reporter = RecordingReporter::default();
        let result = FileWriter::new(
            FileWriterConfig::new(dir.path().join("missing").join("app.log")),
            &reporter,
        );
        let err = result.err().unwrap();
        assert!(matches!(err, WriterError::DirectoryNotWritable(_)));
        assert_eq!(err.code(), 1180101);
        assert_eq!(*reporter.codes.lock().unwrap(), vec![1180101]);
    }

    #[test]
    fn test_parent_that_is_a_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let not_a_dir = dir.path().join("plain.txt");
        fs::write(&not_a_dir, "x").unwrap();
        let err = FileWriter::new(FileWriterConfig::new(not_a_dir.join("app.log")), &NoOpReporter)
            .err()
            .unwrap();
        assert_eq!(err.code(), 1180101);
    }

    #[cfg(unix)]
    #[test]
    fn test_unwritable_directory_is_rejected() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let locked = dir.path().join("locked");
        fs::create_dir(&locked).unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o555)).unwrap();
        // root ignores permission bits
        if nix::unistd::geteuid().is_root() {
            return;
        }
        let reporter = RecordingReporter::default();
        let err = FileWriter::new(FileWriterConfig::new(&locked), &reporter)
            .err()
            .unwrap();
        assert!(matches!(err, WriterError::DirectoryNotWritable(_)));
        assert_eq!(*reporter.codes.lock().unwrap(), vec![1180101]);
        let err = FileWriter::new(FileWriterConfig::new(locked.join("app.log")), &NoOpReporter)
            .err()
            .unwrap();
        assert_eq!(err.code(), 1180101);
    }

    #[test]
    fn test_rotation_flags() {
        let dir = tempfile::tempdir().unwrap();
        let cases: Vec<(RotationFlag, Rotation)> = vec![
            (true.into(), Rotation::Day),
            (false.into(), Rotation::None),
            ("".into(), Rotation::None),
            (" D ".into(), Rotation::Day),
            ("w".into(), Rotation::Week),
            ("M".into(), Rotation::Month),
        ];
        for (flag, expected) in cases {
            let writer = FileWriter::new(
                FileWriterConfig::new(dir.path()).with_rotation(flag),
                &NoOpReporter,
            )
            .unwrap();
            assert_eq!(writer.rotation(), expected);
        }
    }

    #[test]
    fn test_invalid_rotation_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        for flag in ["x", "day", "dw"] {
            let reporter = RecordingReporter::default();
            let result = FileWriter::new(
                FileWriterConfig::new(dir.path()).with_rotation(flag),
                &reporter,
            );
            let err = result.err().unwrap();
            assert_eq!(err.code(), 1180102);
            assert_eq!(*reporter.codes.lock().unwrap(), vec![1180102]);
        }
    }

    #[test]
    fn test_rotation_overrides_explicit_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let (writer, _) = writer_at(
            FileWriterConfig::new(dir.path().join("custom.log")).with_rotation(true),
            at(2024, 1, 15),
        );
        assert!(writer.log(&"x".into()));
        assert!(dir.path().join("2024").join("20240115.log").is_file());
        assert!(!dir.path().join("custom.log").exists());
    }

    #[test]
    fn test_month_rotation_rolls_over() {
        let dir = tempfile::tempdir().unwrap();
        let (writer, clock) = writer_at(
            FileWriterConfig::new(dir.path()).with_rotation("m"),
            at(2024, 1, 31),
        );
        assert!(writer.log(&"january".into()));
        clock.set(at(2024, 2, 1));
        assert!(writer.log(&"february".into()));

        let jan = dir.path().join("2024").join("01").join("20240131.log");
        let feb = dir.path().join("2024").join("02").join("20240201.log");
        assert_eq!(fs::read_to_string(jan).unwrap(), "\njanuary\n");
        assert_eq!(fs::read_to_string(feb).unwrap(), "\nfebruary\n");
        assert_eq!(writer.base_dir(), dir.path());
    }

    #[test]
    fn test_year_rollover_with_day_rotation() {
        let dir = tempfile::tempdir().unwrap();
        let (writer, clock) = writer_at(
            FileWriterConfig::new(dir.path()).with_rotation("d"),
            at(2023, 12, 31),
        );
        assert!(writer.log(&"old".into()));
        clock.set(at(2024, 1, 1));
        assert!(writer.log(&"new".into()));
        assert!(dir.path().join("2023").join("20231231.log").is_file());
        assert!(dir.path().join("2024").join("20240101.log").is_file());
    }

    #[test]
    fn test_week_rotation_uses_iso_week() {
        let dir = tempfile::tempdir().unwrap();
        let (writer, _) = writer_at(
            FileWriterConfig::new(dir.path()).with_rotation("w"),
            at(2024, 1, 15),
        );
        let expected = dir.path().join("2024").join("03").join("20240115.log");
        assert_eq!(writer.target_path(), expected);
        assert!(!expected.exists());
        assert!(writer.log(&"week".into()));
        assert!(expected.is_file());
    }

    #[test]
    fn test_rotation_dirs_are_reused() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("2024")).unwrap();
        let (writer, clock) = writer_at(
            FileWriterConfig::new(dir.path()).with_rotation("m"),
            at(2024, 5, 2),
        );
        assert!(writer.log(&"one".into()));
        clock.set(at(2024, 5, 2) + chrono::Duration::hours(3));
        assert!(writer.log(&"two".into()));
        let file = dir.path().join("2024").join("05").join("20240502.log");
        assert_eq!(fs::read_to_string(file).unwrap(), "\none\n\ntwo\n");
    }

    #[test]
    fn test_existing_dir_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let year = dir.path().join("2024");
        ensure_dir(&year).unwrap();
        ensure_dir(&year).unwrap();
        assert!(year.is_dir());
    }

    #[test]
    fn test_concurrent_writers_create_the_same_dirs() {
        use std::{sync::Barrier, thread};

        let dir = tempfile::tempdir().unwrap();
        let barrier = Arc::new(Barrier::new(8));
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let base = dir.path().to_path_buf();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    let (writer, _) = writer_at(
                        FileWriterConfig::new(base).with_rotation("m"),
                        at(2024, 7, 4),
                    );
                    barrier.wait();
                    writer.log(&format!("writer {i}").into())
                })
            })
            .collect();
        for handle in handles {
            assert!(handle.join().unwrap());
        }
        let file = dir.path().join("2024").join("07").join("20240704.log");
        let content = fs::read_to_string(file).unwrap();
        for i in 0..8 {
            assert!(content.contains(&format!("\nwriter {i}\n")));
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_created_modes() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let (writer, _) = writer_at(
            FileWriterConfig::new(dir.path()).with_rotation("d"),
            at(2024, 1, 15),
        );
        assert!(writer.log(&"x".into()));
        let year = fs::metadata(dir.path().join("2024")).unwrap();
        assert_eq!(year.permissions().mode() & 0o777, 0o777);
        let file = fs::metadata(dir.path().join("2024").join("20240115.log")).unwrap();
        assert_eq!(file.permissions().mode() & 0o777, 0o666);
    }

    #[test]
    fn test_write_failure_is_reported_as_false() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("logs");
        fs::create_dir(&base).unwrap();
        let writer =
            FileWriter::new(FileWriterConfig::new(base.join("app.log")), &NoOpReporter).unwrap();
        fs::remove_dir_all(&base).unwrap();
        assert!(!writer.log(&"lost".into()));
        fs::create_dir(&base).unwrap();
        assert!(writer.log(&"back".into()));
    }

    #[test]
    fn test_structured_message_is_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");
        let writer = FileWriter::new(FileWriterConfig::new(&path), &NoOpReporter).unwrap();
        assert!(writer.log(&serde_json::json!({"event": "start"}).into()));
        assert!(fs::read_to_string(path).unwrap().contains("\"event\": \"start\""));
    }
}
