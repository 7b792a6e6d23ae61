use std::{path::PathBuf, sync::Arc};

use chrono::NaiveDate;
use logsink::{FileWriterConfig, Rotation, logger_config};
use logsink_core::{FileWriter, LogReporter, ManualClock};

fn main() {
    let dir = PathBuf::from("/tmp/logsink_example_rotation");
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();

    let start = NaiveDate::from_ymd_opt(2024, 1, 30)
        .unwrap()
        .and_hms_opt(9, 0, 0)
        .unwrap();
    let clock = Arc::new(ManualClock::new(start));
    let writer = FileWriter::with_clock(
        FileWriterConfig::new(&dir).with_rotation(Rotation::Month),
        clock.clone(),
        &LogReporter,
    )
    .unwrap();

    logger_config()
        .with_name("rotation-demo")
        .with_writer(writer)
        .init_global()
        .unwrap();

    for day in 0..5 {
        clock.set(start + chrono::Duration::days(day));
        log::info!(target: "demo", "Log message for day {day}");
    }

    println!("\n--- Rotation Summary ---");
    println!("Log directory: {}", dir.display());
    for month in ["01", "02"] {
        let folder = dir.join("2024").join(month);
        let files: Vec<String> = std::fs::read_dir(&folder)
            .unwrap()
            .flatten()
            .map(|e| e.file_name().to_string_lossy().to_string())
            .collect();
        println!("  2024/{month}: {files:?}");
    }
}
