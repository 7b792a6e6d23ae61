use chrono::Utc;
use log::Level;

pub(crate) fn format_record(message: &str, level: Level, name: Option<&str>) -> String {
    let time = Utc::now().format("%Y-%m-%dT%H:%M:%S%.3f");
    let level = match level {
        Level::Error => "ERROR",
        Level::Warn => "WARN",
        Level::Info => "INFO",
        Level::Debug => "DEBUG",
        Level::Trace => "TRACE",
    };
    if let Some(name) = name {
        format!("[{time} {name} {level}] {message}")
    } else {
        format!("[{time} {level}] {message}")
    }
}

#[test]
fn test_format_record() {
    let line = format_record("Hello, world!", Level::Warn, Some("main"));
    assert!(line.starts_with('['));
    assert!(line.ends_with(" main WARN] Hello, world!"));
    let line = format_record("bye", Level::Error, None);
    assert!(line.ends_with(" ERROR] bye"));
}
