//! # Simulated Machine Tests
//!
//! End-to-end searches against the deterministic cache model, checked against
//! the model's own ground truth.

use evset_core::EvictionSetResult;
use evset_core::common::{EvictionError, LineAddr};
use evset_core::config::{Config, SimConfig};
use evset_core::refiner::SearchProgress;
use evset_core::sim::SimMachine;
use pretty_assertions::assert_eq;

use crate::common::harness::{THRESHOLD, init_tracing};

fn seeded_config(seed: u64) -> Config {
    let mut config = Config::default();
    config.search.seed = Some(seed);
    config
}

fn search(config: &Config, fuel: u32) -> (SimMachine, EvictionSetResult) {
    let machine = SimMachine::new(&config.sim).unwrap();
    let result = machine
        .profiler(config)
        .unwrap()
        .find_eviction_set(fuel, THRESHOLD)
        .unwrap();
    (machine, result)
}

#[test]
fn lru_search_finds_the_whole_victim_set() {
    init_tracing();
    let config = seeded_config(7);
    let (machine, result) = search(&config, 64);

    assert!(machine.is_congruent(result.squatter.address));
    assert_eq!(result.reduced_pool_len, 8);

    let addresses = result.addresses();
    assert_eq!(addresses.len(), config.sim.cache.ways);
    assert!(addresses.iter().all(|addr| machine.is_congruent(*addr)));
    assert_eq!(result.speed_up_count, 64);
    assert_eq!(result.error_count, 0);
}

#[test]
fn found_set_evicts_the_victim() {
    let config = seeded_config(11);
    let (machine, result) = search(&config, 32);

    machine.flush();
    let _ = machine.access(0x4000_09c0);
    assert!(machine.victim_cached());
    for addr in result.addresses() {
        let _ = machine.access(machine.line_address(addr));
    }
    assert!(!machine.victim_cached());
}

#[test]
fn one_line_short_of_the_set_keeps_the_victim() {
    let config = seeded_config(11);
    let (machine, result) = search(&config, 32);

    machine.flush();
    let _ = machine.access(0x4000_09c0);
    for addr in result.addresses().iter().skip(1) {
        let _ = machine.access(machine.line_address(*addr));
    }
    assert!(machine.victim_cached());
}

#[test]
fn sliced_search_matches_blocking_search() {
    let config = seeded_config(3);
    let (_, blocking) = search(&config, 40);

    let machine = SimMachine::new(&config.sim).unwrap();
    let mut profiler = machine.profiler(&config).unwrap();
    profiler.begin_search(40, THRESHOLD).unwrap();
    let sliced = loop {
        if let SearchProgress::Complete(result) = profiler.advance(config.search.slice_len).unwrap()
        {
            break *result;
        }
    };
    assert_eq!(sliced, blocking);
}

#[test]
fn buffer_reads_reach_the_simulated_cache() {
    let config = Config::default();
    let machine = SimMachine::new(&config.sim).unwrap();
    let profiler = machine.profiler(&config).unwrap();
    let before = machine.cycles();

    let lines = profiler.buffer().walk_cycle(LineAddr(0));
    // The buffer starts zeroed, so line 0 links to itself.
    assert_eq!(lines, Ok(1));
    assert_eq!(machine.counters(), (0, 1));
    assert_eq!(machine.cycles() - before, config.sim.miss_latency);
}

#[test]
fn unusable_sim_cache_is_rejected() {
    let mut config = SimConfig::default();
    config.cache.ways = 0;
    assert!(matches!(
        SimMachine::new(&config),
        Err(EvictionError::InvalidGeometry(_))
    ));
}

#[test]
fn buffer_wrapping_the_address_space_is_rejected() {
    let config = SimConfig {
        buffer_base: u64::MAX - 16,
        ..SimConfig::default()
    };
    assert!(matches!(
        SimMachine::new(&config),
        Err(EvictionError::InvalidGeometry(_))
    ));
}

#[test]
fn profiler_geometry_must_fit_above_the_machine_base() {
    let mut config = Config::default();
    config.sim.buffer_base = u64::MAX - config.sim.geometry.llc_size as u64;
    let machine = SimMachine::new(&config.sim).unwrap();
    assert_eq!(
        machine.line_address(LineAddr(8)),
        config.sim.buffer_base + 8
    );

    config.sim.geometry.llc_size *= 2;
    assert!(matches!(
        machine.profiler(&config),
        Err(EvictionError::InvalidGeometry(_))
    ));
}
