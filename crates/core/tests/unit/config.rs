//! # Configuration Tests

use std::io::Write;

use evset_core::common::{EvictionError, constants};
use evset_core::config::{CacheConfig, Config, GeometryConfig, ReplacementPolicy};
use pretty_assertions::assert_eq;
use rstest::rstest;

#[test]
fn defaults_describe_the_reference_llc() {
    let config = Config::default();
    assert_eq!(config.geometry.llc_size, 4 * 1024 * 1024);
    assert_eq!(config.geometry.line_size, 8);
    assert_eq!(config.geometry.associativity, 16);
    assert_eq!(config.geometry.set_index_mask, 0xfc0);
    assert_eq!(config.geometry.line_count(), 1 << 19);
    assert_eq!(config.search.coarse_fuel, 500);
    assert_eq!(config.search.threshold().as_nanos(), 40);
    assert_eq!(config.search.seed, None);
    assert_eq!(config.calibration.fuel, 1000);
    assert_eq!(config.sim.cache.num_sets(), 64);
    assert_eq!(config.sim.geometry.line_count(), 512);
    assert!(config.validate().is_ok());
}

#[test]
fn reference_llc_constants_agree() {
    assert_eq!(
        constants::NUM_CACHE_SETS * constants::LLC_ASSOCIATIVITY * constants::CACHE_LINE_SIZE as usize,
        constants::LLC_SIZE
    );
    assert_eq!(constants::SET_INDEX_MASK, 0xfc0);
}

#[test]
fn partial_json_keeps_remaining_defaults() {
    let config = Config::from_json(r#"{ "search": { "threshold_ns": 15 } }"#).unwrap();
    assert_eq!(config.search.threshold_ns, 15);
    assert_eq!(config.search.fuel, 10_000);
    assert_eq!(config.geometry, GeometryConfig::default());

    let empty = Config::from_json("{}").unwrap();
    assert_eq!(empty.search, Config::default().search);
}

#[rstest]
#[case::upper("LRU", ReplacementPolicy::Lru)]
#[case::capitalized("Plru", ReplacementPolicy::Plru)]
#[case::fifo("FIFO", ReplacementPolicy::Fifo)]
fn policy_names_accept_both_spellings(#[case] name: &str, #[case] expected: ReplacementPolicy) {
    let json = format!(r#"{{ "sim": {{ "cache": {{ "policy": "{name}" }} }} }}"#);
    assert_eq!(Config::from_json(&json).unwrap().sim.cache.policy, expected);
}

#[test]
fn unknown_policy_is_a_parse_error() {
    assert!(Config::from_json(r#"{ "sim": { "cache": { "policy": "MRU" } } }"#).is_err());
}

#[rstest]
#[case::odd_line(r#"{ "geometry": { "line_size": 24 } }"#)]
#[case::ragged_llc(r#"{ "geometry": { "llc_size": 1001 } }"#)]
#[case::no_ways(r#"{ "geometry": { "associativity": 0 } }"#)]
#[case::bad_sim_geometry(r#"{ "sim": { "geometry": { "line_size": 2 } } }"#)]
#[case::too_many_ways(r#"{ "sim": { "cache": { "ways": 128 } } }"#)]
#[case::no_sets(r#"{ "sim": { "cache": { "size_bytes": 64, "ways": 8 } } }"#)]
#[case::buffer_past_address_space(r#"{ "sim": { "buffer_base": 18446744073709551600 } }"#)]
fn validation_rejects_unusable_geometry(#[case] json: &str) {
    let config = Config::from_json(json).unwrap();
    assert!(matches!(
        config.validate(),
        Err(EvictionError::InvalidGeometry(_))
    ));
}

#[test]
fn cache_validation_checks_line_size() {
    let cache = CacheConfig {
        line_bytes: 48,
        ..CacheConfig::default()
    };
    assert!(cache.validate().is_err());
    assert!(CacheConfig::default().validate().is_ok());
}

#[test]
fn config_loads_from_a_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"{{ "geometry": {{ "llc_size": 65536, "line_size": 64 }}, "search": {{ "seed": 42 }} }}"#
    )
    .unwrap();

    let text = std::fs::read_to_string(file.path()).unwrap();
    let config = Config::from_json(&text).unwrap();
    assert_eq!(config.geometry.line_count(), 1024);
    assert_eq!(config.search.seed, Some(42));
    assert!(config.validate().is_ok());
}
