use std::fs;

use parcel_engine::{recover_output, CommitMarker, Recovery};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

const TABLE_HEADER: &str = "parcel_id,parcel_objectid,api_status,extra_data\n";

#[test]
fn marker_cuts_everything_past_the_committed_length() {
    let temp = TempDir::new().unwrap();
    let output = temp.path().join("out.csv");
    let committed = format!("{TABLE_HEADER}P1,1,SUCCESS,\n");
    let torn = "P2,2,SUCC";
    fs::write(&output, format!("{committed}{torn}")).unwrap();
    CommitMarker::for_output(&output)
        .store(committed.len() as u64)
        .unwrap();

    let recovery = recover_output(&output).unwrap();

    assert_eq!(
        recovery,
        Recovery {
            before: (committed.len() + torn.len()) as u64,
            after: committed.len() as u64,
            tracked: true,
        }
    );
    assert_eq!(fs::read_to_string(&output).unwrap(), committed);
}

#[test]
fn committed_output_is_left_untouched() {
    let temp = TempDir::new().unwrap();
    let output = temp.path().join("out.csv");
    let content = format!("{TABLE_HEADER}P1,1,SUCCESS,\n");
    fs::write(&output, &content).unwrap();
    CommitMarker::for_output(&output)
        .store(content.len() as u64)
        .unwrap();

    assert_eq!(recover_output(&output).unwrap().discarded(), 0);
    assert_eq!(fs::read_to_string(&output).unwrap(), content);
}

#[test]
fn missing_output_drops_a_stale_marker() {
    let temp = TempDir::new().unwrap();
    let output = temp.path().join("out.csv");
    let marker = CommitMarker::for_output(&output);
    marker.store(120).unwrap();
    assert!(marker.path().exists());

    let recovery = recover_output(&output).unwrap();

    assert_eq!(recovery.after, 0);
    assert!(!marker.path().exists());
    assert!(!output.exists());
}

#[test]
fn without_marker_a_table_is_cut_after_its_last_complete_record() {
    let temp = TempDir::new().unwrap();
    let output = temp.path().join("out.csv");
    let complete = format!("{TABLE_HEADER}P1,1,SUCCESS,\"{{\"\"a\"\":\"\"x\ny\"\"}}\"\n");
    fs::write(&output, format!("{complete}P2,2,SUCCESS,\"{{\"\"ne")).unwrap();

    let recovery = recover_output(&output).unwrap();

    assert!(!recovery.tracked);
    assert_eq!(recovery.after, complete.len() as u64);
    assert_eq!(fs::read_to_string(&output).unwrap(), complete);
}

#[test]
fn marker_longer_than_the_file_is_ignored() {
    let temp = TempDir::new().unwrap();
    let output = temp.path().join("out.csv");
    let content = format!("{TABLE_HEADER}P1,1,SUCCESS,\nP2,2,");
    fs::write(&output, &content).unwrap();
    CommitMarker::for_output(&output).store(10_000).unwrap();

    let recovery = recover_output(&output).unwrap();

    assert!(!recovery.tracked);
    assert_eq!(
        fs::read_to_string(&output).unwrap(),
        format!("{TABLE_HEADER}P1,1,SUCCESS,\n")
    );
}

#[test]
fn foreign_file_without_marker_is_left_alone() {
    let temp = TempDir::new().unwrap();
    let output = temp.path().join("out.csv");
    fs::write(&output, "something,else\nx,\"y").unwrap();

    let recovery = recover_output(&output).unwrap();

    assert_eq!(recovery.discarded(), 0);
    assert_eq!(fs::read_to_string(&output).unwrap(), "something,else\nx,\"y");
}
