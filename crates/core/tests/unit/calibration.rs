//! # Calibration Tests

use std::time::Duration;

use evset_core::CacheProfiler;
use evset_core::calibration::{CalibrationResult, CalibrationVerdict, measure_cache_miss_penalty};
use evset_core::common::{EvictionError, LineAddr};
use evset_core::config::{CalibrationConfig, Config};
use evset_core::evictor::ProbeContext;
use evset_core::sim::SimMachine;
use pretty_assertions::assert_eq;
use rstest::rstest;

use crate::common::harness::{
    NoopVictim, PatternClock, config_for, eight_lines, initialized_buffer, seeded, small_llc,
};

fn scripted(pattern: &[u64], fuel: u32) -> CalibrationResult {
    let mut profiler = CacheProfiler::new(
        &config_for(small_llc(), 10),
        PatternClock::new(pattern),
        NoopVictim,
        seeded(8),
    )
    .unwrap();
    profiler.measure_cache_miss_penalty(fuel).unwrap()
}

#[test]
fn steady_gap_is_discriminating() {
    let result = scripted(&[200, 4], 50);
    assert_eq!(result.try_count, 50);
    assert_eq!(result.speed_up_count, 50);
    assert_eq!(result.error_count, 0);
    assert_eq!(result.zero_count, 0);
    assert_eq!(result.ave_speed_up, Some(Duration::from_nanos(196)));
    assert_eq!(result.sum_speed_up, Duration::from_nanos(50 * 196));
    assert_eq!(result.speed_ups.len(), 50);
    assert_eq!(result.verdict, CalibrationVerdict::Discriminating);
}

#[test]
fn zero_deltas_mean_a_coarse_timer() {
    let result = scripted(&[0, 0], 20);
    assert_eq!(result.zero_count, 20);
    assert_eq!(result.speed_up_count, 20);
    assert_eq!(result.ave_speed_up, Some(Duration::ZERO));
    assert_eq!(
        result.verdict,
        CalibrationVerdict::TimerTooCoarse { zero_fraction: 1.0 }
    );
    assert!(!result.verdict.is_usable());
}

#[test]
fn faster_misses_are_indistinguishable() {
    let result = scripted(&[4, 200], 20);
    assert_eq!(result.error_count, 20);
    assert_eq!(result.speed_up_count, 0);
    assert_eq!(result.ave_speed_up, None);
    assert!(result.speed_ups.is_empty());
    assert_eq!(result.verdict, CalibrationVerdict::Indistinguishable);
}

#[rstest]
#[case::half_errors(&[200, 4, 4, 200], CalibrationVerdict::Indistinguishable)]
#[case::mostly_positive(&[200, 4, 200, 4, 4, 200], CalibrationVerdict::Discriminating)]
fn verdict_weighs_errors_against_positive_deltas(
    #[case] pattern: &[u64],
    #[case] expected: CalibrationVerdict,
) {
    assert_eq!(scripted(pattern, 60).verdict, expected);
}

#[test]
fn zero_fuel_is_rejected_before_the_buffer_is_touched() {
    let geometry = eight_lines();
    let mut buffer = initialized_buffer(&geometry);
    buffer.link_cycle(&[LineAddr(8)]).unwrap();
    let mut clock = PatternClock::new(&[200, 4]);
    let mut victim = NoopVictim;
    let mut rng = seeded(1);
    let mut ctx = ProbeContext::new(&mut buffer, &mut clock, &mut victim, &mut rng);

    let config = CalibrationConfig {
        fuel: 0,
        ..CalibrationConfig::default()
    };
    assert!(matches!(
        measure_cache_miss_penalty(&mut ctx, &config),
        Err(EvictionError::InvalidParameter { name: "fuel", .. })
    ));
    assert_eq!(buffer.walk_cycle(LineAddr(8)).unwrap(), 1);
}

#[test]
fn simulated_machine_shows_the_configured_latency_gap() {
    let config = Config::default();
    let machine = SimMachine::new(&config.sim).unwrap();
    let mut profiler = machine.profiler(&config).unwrap();

    let result = profiler.measure_cache_miss_penalty(25).unwrap();
    assert_eq!(result.verdict, CalibrationVerdict::Discriminating);
    assert_eq!(result.error_count, 0);
    assert!(
        result
            .speed_ups
            .iter()
            .all(|delta| *delta == Duration::from_nanos(196))
    );
}

#[test]
fn result_serializes_durations_as_nanoseconds() {
    let result = scripted(&[0, 0], 10);
    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["verdict"]["kind"], "timer_too_coarse");
    assert_eq!(json["verdict"]["zero_fraction"], 1.0);
    assert_eq!(json["sum_speed_up"], 0);
    assert_eq!(json["speed_ups"].as_array().map(Vec::len), Some(10));

    let json = serde_json::to_value(scripted(&[4, 200], 3)).unwrap();
    assert!(json["ave_speed_up"].is_null());
    assert_eq!(json["verdict"]["kind"], "indistinguishable");
}
