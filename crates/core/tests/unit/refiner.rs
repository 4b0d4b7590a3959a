//! # Refiner Tests
//!
//! Drives the two-phase search with scripted clocks and checks the squatter
//! selection, the index-bit filter and the sliced execution.

use std::time::Duration;

use evset_core::common::{EvictionError, LineAddr};
use evset_core::config::GeometryConfig;
use evset_core::evictor::{EvictionSetEntry, ProbeContext};
use evset_core::memory::EvictionBuffer;
use evset_core::refiner::{SearchPhase, SearchProgress, SlicedSearch, congruent_universe};
use evset_core::{CacheProfiler, EvictionSetResult};
use pretty_assertions::assert_eq;
use rand::rngs::SmallRng;
use rstest::rstest;

use crate::common::harness::{
    NoopVictim, PatternClock, THRESHOLD, config_for, init_tracing, initialized_buffer, seeded,
    small_llc,
};

type ScriptedProfiler = CacheProfiler<PatternClock, NoopVictim, SmallRng>;

fn profiler(clock: PatternClock, coarse_fuel: u32, seed: u64) -> ScriptedProfiler {
    CacheProfiler::new(
        &config_for(small_llc(), coarse_fuel),
        clock,
        NoopVictim,
        seeded(seed),
    )
    .unwrap()
}

// ══════════════════════════════════════════════════════════
// 1. Index-bit filter
// ══════════════════════════════════════════════════════════

#[rstest]
#[case::first_line(LineAddr(0))]
#[case::mid_page(LineAddr(0x9c0))]
#[case::word_inside_line(LineAddr(0x12_3458))]
#[case::last_line(LineAddr((1 << 22) - 8))]
fn default_geometry_keeps_one_in_sixty_four(#[case] squatter: LineAddr) {
    let geometry = GeometryConfig::default();
    let pool = congruent_universe(&geometry, squatter);
    assert_eq!(pool.len(), 8192);
    assert!(pool.iter().any(|addr| addr == squatter));
    assert!(
        pool.iter()
            .all(|addr| addr.shares_index_with(squatter, geometry.set_index_mask))
    );
}

// ══════════════════════════════════════════════════════════
// 2. Blocking search
// ══════════════════════════════════════════════════════════

#[test]
fn accepting_clock_refines_to_the_last_lines_index() {
    init_tracing();
    let mut profiler = profiler(PatternClock::always_accept(), 20, 1);
    let result = profiler.find_eviction_set(30, THRESHOLD).unwrap();

    // The first coarse trial pops the highest line; later ties keep it.
    assert_eq!(result.squatter.address, LineAddr(0xff8));
    assert_eq!(result.squatter.speed_up, Duration::from_nanos(990));
    assert_eq!(result.coarse.accepted, 20);
    assert_eq!(result.reduced_pool_len, 8);

    let mut pool = result.pool.clone();
    pool.sort();
    let expected: Vec<LineAddr> = (0xfc0..=0xff8).step_by(8).map(LineAddr).collect();
    assert_eq!(pool, expected);

    assert_eq!(result.eviction_set.len(), 30);
    assert_eq!(result.speed_up_count, 30);
    assert_eq!(result.error_count, 0);
    assert_eq!(result.sum_speed_up, Duration::from_nanos(30 * 990));
    assert_eq!(result.ave_speed_up, Some(Duration::from_nanos(990)));

    let mut addresses = result.addresses();
    addresses.sort();
    assert_eq!(addresses, expected);
}

#[test]
fn addresses_keep_first_acceptance_order() {
    let mut result = profiler(PatternClock::always_accept(), 20, 1)
        .find_eviction_set(10, THRESHOLD)
        .unwrap();
    result.eviction_set = [0xfd0, 0xfc8, 0xfd0, 0xff8, 0xfc8, 0xff8]
        .into_iter()
        .map(|offset| EvictionSetEntry {
            address: LineAddr(offset),
            speed_up: Duration::from_nanos(990),
        })
        .collect();
    assert_eq!(
        result.addresses(),
        vec![LineAddr(0xfd0), LineAddr(0xfc8), LineAddr(0xff8)]
    );
}

#[test]
fn rejecting_clock_finds_no_squatter() {
    let mut profiler = profiler(PatternClock::always_reject(), 25, 1);
    let err = profiler.find_eviction_set(100, THRESHOLD).unwrap_err();
    assert_eq!(err, EvictionError::NoCongruentAddressFound { tries: 25 });
    assert!(!err.is_fatal());
}

#[rstest]
#[case::no_fuel(0, 10, "fuel")]
#[case::no_coarse_fuel(10, 0, "coarse_fuel")]
fn zero_budget_is_rejected_before_the_buffer_is_touched(
    #[case] fuel: u32,
    #[case] coarse_fuel: u32,
    #[case] expected: &str,
) {
    let geometry = small_llc();
    let mut buffer = initialized_buffer(&geometry);
    let order = [LineAddr(0x40), LineAddr(0x10), LineAddr(0x80)];
    buffer.link_cycle(&order).unwrap();

    let err = SlicedSearch::start(&mut buffer, &geometry, coarse_fuel, fuel, THRESHOLD)
        .unwrap_err();
    assert!(matches!(err, EvictionError::InvalidParameter { name, .. } if name == expected));
    assert_eq!(buffer.cycle_from(LineAddr(0x40)).unwrap(), order.to_vec());
}

// ══════════════════════════════════════════════════════════
// 3. Sliced search
// ══════════════════════════════════════════════════════════

fn run_sliced(profiler: &mut ScriptedProfiler, slice: u32) -> (EvictionSetResult, usize) {
    profiler.begin_search(30, THRESHOLD).unwrap();
    let mut slices = 0;
    loop {
        slices += 1;
        match profiler.advance(slice).unwrap() {
            SearchProgress::Pending { .. } => assert!(profiler.is_searching()),
            SearchProgress::Complete(result) => return (*result, slices),
        }
    }
}

#[rstest]
#[case::single_trials(1)]
#[case::uneven_slices(7)]
#[case::one_slice(u32::MAX)]
fn sliced_search_matches_blocking_search(#[case] slice: u32) {
    let blocking = profiler(PatternClock::always_accept(), 20, 9)
        .find_eviction_set(30, THRESHOLD)
        .unwrap();

    let mut sliced = profiler(PatternClock::always_accept(), 20, 9);
    let (result, slices) = run_sliced(&mut sliced, slice);

    assert_eq!(result, blocking);
    assert!(!sliced.is_searching());
    if slice == 1 {
        assert!(slices >= 50);
    }
}

#[test]
fn first_slice_reports_coarse_progress() {
    let mut profiler = profiler(PatternClock::always_reject(), 100, 4);
    profiler.begin_search(30, THRESHOLD).unwrap();
    assert_eq!(
        profiler.advance(10).unwrap(),
        SearchProgress::Pending {
            phase: SearchPhase::Coarse,
            tries: 10,
            fuel: 100,
            pool_len: 502,
        }
    );
}

#[test]
fn slice_ending_on_the_phase_boundary_reports_precise() {
    let geometry = small_llc();
    let mut buffer = EvictionBuffer::new(&geometry).unwrap();
    let mut search = SlicedSearch::start(&mut buffer, &geometry, 5, 30, THRESHOLD).unwrap();
    assert_eq!(search.phase(), Some(SearchPhase::Coarse));

    let mut clock = PatternClock::always_accept();
    let mut victim = NoopVictim;
    let mut rng = seeded(2);
    let mut ctx = ProbeContext::new(&mut buffer, &mut clock, &mut victim, &mut rng);

    assert_eq!(
        search.advance(&mut ctx, 5).unwrap(),
        SearchProgress::Pending {
            phase: SearchPhase::Precise,
            tries: 0,
            fuel: 30,
            pool_len: 8,
        }
    );
    assert!(matches!(
        search.advance(&mut ctx, 100).unwrap(),
        SearchProgress::Complete(_)
    ));
    assert!(search.is_done());
    assert!(search.pool().is_none());
    assert!(matches!(
        search.advance(&mut ctx, 1),
        Err(EvictionError::InvalidParameter { name: "search", .. })
    ));
}

#[test]
fn advancing_without_a_search_is_an_error() {
    let mut profiler = profiler(PatternClock::always_accept(), 20, 1);
    assert!(matches!(
        profiler.advance(10),
        Err(EvictionError::InvalidParameter { name: "search", .. })
    ));
}

#[test]
fn failed_search_is_dropped() {
    let mut profiler = profiler(PatternClock::always_reject(), 5, 1);
    profiler.begin_search(30, THRESHOLD).unwrap();
    assert!(matches!(
        profiler.advance(100),
        Err(EvictionError::NoCongruentAddressFound { tries: 5 })
    ));
    assert!(!profiler.is_searching());
}

#[test]
fn rejected_restart_keeps_the_running_search() {
    let mut profiler = profiler(PatternClock::always_accept(), 20, 1);
    profiler.begin_search(30, THRESHOLD).unwrap();
    let _ = profiler.advance(3).unwrap();
    assert!(profiler.begin_search(0, THRESHOLD).is_err());
    assert!(profiler.is_searching());
}

#[test]
fn precise_phase_walks_the_shuffled_pool() {
    let geometry = small_llc();
    let mut buffer = EvictionBuffer::new(&geometry).unwrap();
    let mut search = SlicedSearch::start(&mut buffer, &geometry, 5, 30, THRESHOLD).unwrap();
    assert_eq!(search.pool().unwrap().len(), 512);

    let mut clock = PatternClock::always_accept();
    let mut victim = NoopVictim;
    let mut rng = seeded(2);
    let mut ctx = ProbeContext::new(&mut buffer, &mut clock, &mut victim, &mut rng);
    let _ = search.advance(&mut ctx, 5).unwrap();
    assert_eq!(search.phase(), Some(SearchPhase::Precise));

    let order = search.pool().unwrap().to_vec();
    let mut ascending = order.clone();
    ascending.sort();
    let expected: Vec<LineAddr> = (0xfc0..=0xff8).step_by(8).map(LineAddr).collect();
    assert_eq!(ascending, expected);
    assert_ne!(order, ascending);
    assert_eq!(buffer.cycle_from(order[0]).unwrap(), order);
}

#[test]
fn blocking_search_ends_the_sliced_search() {
    let mut profiler = profiler(PatternClock::always_accept(), 20, 1);
    profiler.begin_search(30, THRESHOLD).unwrap();
    let _ = profiler.advance(3).unwrap();

    let result = profiler.find_eviction_set(30, THRESHOLD).unwrap();
    assert_eq!(result.speed_up_count, 30);
    assert!(!profiler.is_searching());
    assert!(matches!(
        profiler.advance(5),
        Err(EvictionError::InvalidParameter { name: "search", .. })
    ));
}
