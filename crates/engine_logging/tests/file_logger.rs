use std::fs;

use engine_logging::{engine_debug, engine_info, initialize, LogDestination};
use log::LevelFilter;
use tempfile::TempDir;

#[test]
fn file_destination_receives_messages_at_or_above_level() {
    let temp = TempDir::new().unwrap();
    let log_path = temp.path().join("harvest.log");

    initialize(LogDestination::File(log_path.clone()), LevelFilter::Info);
    engine_info!("flushed {} rows", 42);
    engine_debug!("this line stays below the threshold");
    log::logger().flush();

    let content = fs::read_to_string(&log_path).unwrap();
    assert!(content.contains("flushed 42 rows"));
    assert!(!content.contains("below the threshold"));
}
