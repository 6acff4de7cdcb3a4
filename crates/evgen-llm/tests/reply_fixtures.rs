use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use evgen_llm::{parse_events, GenerationError};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct Snapshot {
    events: Vec<SnapshotEvent>,
    failures: Vec<SnapshotFailure>,
}

#[derive(Debug, Deserialize)]
struct SnapshotEvent {
    title: String,
    date: String,
    tags: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct SnapshotFailure {
    title: String,
    reason_contains: String,
}

fn replies_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../../fixtures/replies")
        .canonicalize()
        .expect("fixtures dir")
}

fn read(name: &str) -> String {
    std::fs::read_to_string(replies_dir().join(name)).expect("read fixture")
}

#[test]
fn mixed_reply_matches_snapshot() {
    let outcome = parse_events(&read("mixed.json")).expect("outcome");
    let snapshot: Snapshot = serde_json::from_str(&read("mixed.snapshot.json")).expect("snapshot");

    assert_eq!(outcome.events.len(), snapshot.events.len());
    for (event, expected) in outcome.events.iter().zip(&snapshot.events) {
        assert_eq!(event.title, expected.title);
        assert_eq!(event.date.format("%Y-%m-%dT%H:%M:%S").to_string(), expected.date);
        let actual_tags: BTreeSet<&str> = event.tags.iter().map(|t| t.display_name()).collect();
        let expected_tags: BTreeSet<&str> = expected.tags.iter().map(String::as_str).collect();
        assert_eq!(actual_tags, expected_tags, "tags for {}", event.title);
    }

    assert_eq!(outcome.failures.len(), snapshot.failures.len());
    for (failure, expected) in outcome.failures.iter().zip(&snapshot.failures) {
        assert_eq!(failure.candidate.title, expected.title);
        assert!(
            failure.reason.contains(&expected.reason_contains),
            "reason {:?} lacks {:?}",
            failure.reason,
            expected.reason_contains
        );
    }
}

#[test]
fn happy_fixture_parses_to_single_event() {
    let outcome = parse_events(&read("happy.json")).expect("outcome");
    assert_eq!(outcome.events.len(), 1);
    assert_eq!(outcome.events[0].title, "Fake Rock Concert");
}

#[test]
fn fenced_empty_fixture_is_empty() {
    let outcome = parse_events(&read("fenced_empty.txt")).expect("outcome");
    assert!(outcome.events.is_empty());
    assert!(outcome.failures.is_empty());
}

#[test]
fn missing_events_fixture_is_rejected() {
    let err = parse_events(&read("missing_events.json")).unwrap_err();
    assert!(matches!(err, GenerationError::MissingEventsField));
}
