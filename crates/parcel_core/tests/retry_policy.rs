use std::time::Duration;

use parcel_core::{ApiStatus, FetchOutcome, FetchResolution, RetryDecision, RetryPolicy};
use pretty_assertions::assert_eq;

fn policy() -> RetryPolicy {
    RetryPolicy {
        max_retries: 5,
        rate_limit_base: Duration::from_millis(200),
        transient_delay: Duration::from_millis(50),
    }
}

#[test]
fn definitive_outcomes_are_terminal_on_first_attempt() {
    let policy = policy();
    for outcome in [
        FetchOutcome::Success(vec![serde_json::json!({"id": 1})]),
        FetchOutcome::NoData,
        FetchOutcome::NotFound,
        FetchOutcome::JsonError("eof".into()),
    ] {
        assert_eq!(policy.decide(&outcome, 1), RetryDecision::Terminal, "{outcome}");
    }
}

#[test]
fn rate_limit_backoff_grows_linearly_with_attempt() {
    let policy = policy();
    let delays: Vec<RetryDecision> = (1..=4)
        .map(|attempt| policy.decide(&FetchOutcome::RateLimited, attempt))
        .collect();
    assert_eq!(
        delays,
        vec![
            RetryDecision::RetryAfter(Duration::from_millis(200)),
            RetryDecision::RetryAfter(Duration::from_millis(400)),
            RetryDecision::RetryAfter(Duration::from_millis(600)),
            RetryDecision::RetryAfter(Duration::from_millis(800)),
        ]
    );
}

#[test]
fn other_transient_faults_use_fixed_delay() {
    let policy = policy();
    for outcome in [
        FetchOutcome::HttpError(503),
        FetchOutcome::HttpError(400),
        FetchOutcome::ConnectionError("reset".into()),
    ] {
        assert_eq!(
            policy.decide(&outcome, 3),
            RetryDecision::RetryAfter(Duration::from_millis(50))
        );
    }
}

#[test]
fn last_attempt_gives_up_without_sleeping() {
    let policy = policy();
    assert_eq!(policy.decide(&FetchOutcome::RateLimited, 5), RetryDecision::GiveUp);
    assert_eq!(policy.decide(&FetchOutcome::HttpError(500), 5), RetryDecision::GiveUp);
    // A definitive answer on the last attempt still counts.
    assert_eq!(policy.decide(&FetchOutcome::NotFound, 5), RetryDecision::Terminal);
}

#[test]
fn always_rate_limited_entity_makes_exactly_max_retries_attempts() {
    let policy = policy();
    let mut attempts = 0;
    loop {
        attempts += 1;
        match policy.decide(&FetchOutcome::RateLimited, attempts) {
            RetryDecision::RetryAfter(_) => continue,
            RetryDecision::GiveUp => break,
            RetryDecision::Terminal => panic!("429 must never be terminal"),
        }
    }
    assert_eq!(attempts, policy.max_retries);

    let resolution = FetchResolution {
        outcome: FetchOutcome::RateLimited,
        attempts,
        exhausted: true,
    };
    assert_eq!(resolution.status(), ApiStatus::FailedAfterRetries);
}

#[test]
fn response_classification_covers_status_codes() {
    assert_eq!(
        FetchOutcome::from_response(200, br#"{"data":[{"id":7}]}"#),
        FetchOutcome::Success(vec![serde_json::json!({"id": 7})])
    );
    assert_eq!(FetchOutcome::from_response(200, br#"{"data":[]}"#), FetchOutcome::NoData);
    assert_eq!(FetchOutcome::from_response(200, br#"{"message":"ok"}"#), FetchOutcome::NoData);
    assert_eq!(FetchOutcome::from_response(200, br#"{"data":null}"#), FetchOutcome::NoData);
    assert!(matches!(
        FetchOutcome::from_response(200, b"<html>"),
        FetchOutcome::JsonError(_)
    ));
    assert_eq!(FetchOutcome::from_response(404, b""), FetchOutcome::NotFound);
    assert_eq!(FetchOutcome::from_response(429, b""), FetchOutcome::RateLimited);
    assert_eq!(FetchOutcome::from_response(502, b""), FetchOutcome::HttpError(502));
}

#[test]
fn status_strings_parse_back() {
    for status in ApiStatus::ALL {
        assert_eq!(ApiStatus::parse(status.as_str()), Some(status));
    }
    assert_eq!(ApiStatus::NoData.as_str(), "NO_DATA_IN_LIST");
    assert_eq!(ApiStatus::parse("RATE_LIMIT"), None);
}
