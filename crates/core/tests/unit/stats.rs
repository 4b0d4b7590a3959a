//! # Speed-Up Statistics Tests

use std::time::Duration;

use evset_core::stats::SpeedUpStats;
use pretty_assertions::assert_eq;

fn ns(n: u64) -> Duration {
    Duration::from_nanos(n)
}

#[test]
fn empty_stats_have_no_mean_or_rate() {
    let stats = SpeedUpStats::default();
    assert_eq!(stats.mean(), None);
    assert_eq!(stats.acceptance_rate(), None);
    assert_eq!(stats.trials(), 0);
}

#[test]
fn accepted_and_rejected_trials_are_kept_apart() {
    let mut stats = SpeedUpStats::default();
    stats.record_accept(ns(100));
    stats.record_accept(ns(50));
    stats.record_accept(ns(150));
    stats.record_reject();

    assert_eq!(stats.accepted, 3);
    assert_eq!(stats.rejected, 1);
    assert_eq!(stats.sum, ns(300));
    assert_eq!(stats.max, ns(150));
    assert_eq!(stats.mean(), Some(ns(100)));
    assert_eq!(stats.acceptance_rate(), Some(0.75));
}

#[test]
fn display_is_a_single_line_in_nanoseconds() {
    let mut stats = SpeedUpStats::default();
    stats.record_accept(ns(90));
    stats.record_reject();
    assert_eq!(
        stats.to_string(),
        "accepted=1 rejected=1 sum=90ns mean=90ns max=90ns"
    );
}

#[test]
fn serializes_durations_as_integers() {
    let mut stats = SpeedUpStats::default();
    stats.record_accept(ns(1_500));
    let json = serde_json::to_value(stats).unwrap();
    assert_eq!(
        json,
        serde_json::json!({ "sum": 1500, "accepted": 1, "rejected": 0, "max": 1500 })
    );
}
