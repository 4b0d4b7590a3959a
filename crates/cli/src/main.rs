//! Eviction set finder CLI.
//!
//! This binary hosts the search outside a browser. It provides:
//! 1. **find:** Search for an eviction set of a heap-allocated victim on this machine.
//! 2. **calibrate:** Measure whether the host timer separates cache misses from hits.
//! 3. **simulate:** Run the search against the simulated cache and check the result
//!    against ground truth.
//!
//! Logs go to stderr and are filtered with `RUST_LOG` (default `info`). Reports go
//! to stdout, as text or, with `--json`, as one JSON document.

use std::path::{Path, PathBuf};
use std::process;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::{error, info};

use evset_core::calibration::CalibrationResult;
use evset_core::config::{Config, ReplacementPolicy};
use evset_core::profiler::rng_from_seed;
use evset_core::sim::SimMachine;
use evset_core::timing::{HeapVictim, MonotonicClock, Victim};
use evset_core::{CacheProfiler, EvictionError, EvictionSetResult};

/// Exit code for a failed run.
const EXIT_FAILURE: i32 = 1;

/// Exit code for an unusable configuration.
const EXIT_CONFIG: i32 = 2;

#[derive(Parser, Debug)]
#[command(
    name = "evset",
    author,
    version,
    about = "Find last-level cache eviction sets by timing",
    long_about = "Find a set of addresses that evicts a victim from the last-level cache, using only timing.\n\nExamples:\n  evset find --fuel 10000 --threshold-ns 40\n  evset calibrate --fuel 1000\n  evset simulate --seed 7 --json\n  evset --config geometry.json find"
)]
struct Cli {
    /// JSON configuration file; missing fields use defaults.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Print the report as JSON.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Search for an eviction set on this machine.
    Find {
        #[command(flatten)]
        search: SearchArgs,
    },

    /// Measure the cache miss penalty seen by the host timer.
    Calibrate {
        /// Number of miss-versus-hit trials.
        #[arg(long)]
        fuel: Option<u32>,

        /// Seed for start-address selection.
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Search against the simulated cache and verify the result.
    Simulate {
        #[command(flatten)]
        search: SearchArgs,

        /// Replacement policy of the simulated cache.
        #[arg(long, value_enum)]
        policy: Option<PolicyArg>,
    },
}

/// Overrides for the search settings.
#[derive(clap::Args, Debug)]
struct SearchArgs {
    /// Precise phase trial budget.
    #[arg(long)]
    fuel: Option<u32>,

    /// Coarse phase trial budget.
    #[arg(long)]
    coarse_fuel: Option<u32>,

    /// Minimum accepted speed-up in nanoseconds.
    #[arg(long)]
    threshold_ns: Option<u64>,

    /// Seed for start-address selection and shuffling.
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum PolicyArg {
    Lru,
    Plru,
    Fifo,
}

impl From<PolicyArg> for ReplacementPolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::Lru => Self::Lru,
            PolicyArg::Plru => Self::Plru,
            PolicyArg::Fifo => Self::Fifo,
        }
    }
}

impl SearchArgs {
    /// Applies the overrides to `config`.
    fn apply(&self, config: &mut Config) {
        if let Some(fuel) = self.fuel {
            config.search.fuel = fuel;
        }
        if let Some(coarse_fuel) = self.coarse_fuel {
            config.search.coarse_fuel = coarse_fuel;
        }
        if let Some(threshold_ns) = self.threshold_ns {
            config.search.threshold_ns = threshold_ns;
        }
        if self.seed.is_some() {
            config.search.seed = self.seed;
        }
    }
}

/// Report printed by `simulate`.
#[derive(Serialize, Debug)]
struct SimulationReport<'a> {
    result: &'a EvictionSetResult,
    distinct: usize,
    congruent: usize,
    associativity: usize,
    victim_evicted_by_set: bool,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(message) => {
            error!("{message}");
            process::exit(EXIT_CONFIG);
        }
    };

    let outcome = match cli.command {
        Commands::Find { search } => {
            search.apply(&mut config);
            cmd_find(&config, cli.json)
        }
        Commands::Calibrate { fuel, seed } => {
            if let Some(fuel) = fuel {
                config.calibration.fuel = fuel;
            }
            if seed.is_some() {
                config.search.seed = seed;
            }
            cmd_calibrate(&config, cli.json)
        }
        Commands::Simulate { search, policy } => {
            search.apply(&mut config);
            if let Some(policy) = policy {
                config.sim.cache.policy = policy.into();
            }
            cmd_simulate(&config, cli.json)
        }
    };

    match outcome {
        Ok(true) => {}
        Ok(false) => process::exit(EXIT_FAILURE),
        Err(err) => {
            error!("{err}");
            let code = match err {
                EvictionError::InvalidGeometry(_) | EvictionError::InvalidParameter { .. } => {
                    EXIT_CONFIG
                }
                _ => EXIT_FAILURE,
            };
            process::exit(code);
        }
    }
}

/// Reads and validates the configuration, falling back to defaults without a file.
fn load_config(path: Option<&Path>) -> Result<Config, String> {
    let config = match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .map_err(|e| format!("cannot read {}: {e}", path.display()))?;
            Config::from_json(&text).map_err(|e| format!("invalid config {}: {e}", path.display()))?
        }
        None => Config::default(),
    };
    config.validate().map_err(|e| e.to_string())?;
    Ok(config)
}

/// Searches for an eviction set of a heap victim on the host.
fn cmd_find(config: &Config, json: bool) -> Result<bool, EvictionError> {
    let victim = HeapVictim::new();
    info!("victim allocated at {:#x}", victim.addr());
    let mut profiler = CacheProfiler::new(
        config,
        MonotonicClock::new(),
        victim,
        rng_from_seed(config.search.seed),
    )?;
    let result = profiler.find_eviction_set(config.search.fuel, config.search.threshold())?;
    if json {
        print_json(&result);
    } else {
        print_result(&result, config.geometry.associativity);
    }
    Ok(true)
}

/// Measures the miss penalty of a heap victim on the host.
fn cmd_calibrate(config: &Config, json: bool) -> Result<bool, EvictionError> {
    let mut profiler = CacheProfiler::new(
        config,
        MonotonicClock::new(),
        HeapVictim::new(),
        rng_from_seed(config.search.seed),
    )?;
    let result = profiler.measure_cache_miss_penalty(config.calibration.fuel)?;
    if json {
        print_json(&result);
    } else {
        print_calibration(&result);
    }
    Ok(true)
}

/// Searches against the simulated machine and checks the result.
///
/// Returns `false` when the found set does not evict the victim on its own.
fn cmd_simulate(config: &Config, json: bool) -> Result<bool, EvictionError> {
    let machine = SimMachine::new(&config.sim)?;
    let mut profiler = machine.profiler(config)?;
    let result = profiler.find_eviction_set(config.search.fuel, config.search.threshold())?;

    let addresses = result.addresses();
    let congruent = addresses
        .iter()
        .filter(|addr| machine.is_congruent(**addr))
        .count();

    // Ground truth: prime with the found set alone, then see whether the victim survives.
    machine.flush();
    machine.victim().touch();
    for addr in &addresses {
        let _ = machine.access(machine.line_address(*addr));
    }
    let victim_evicted_by_set = !machine.victim_cached();

    let report = SimulationReport {
        result: &result,
        distinct: addresses.len(),
        congruent,
        associativity: config.sim.cache.ways,
        victim_evicted_by_set,
    };
    if json {
        print_json(&report);
    } else {
        print_result(&result, config.sim.cache.ways);
        println!(
            "Ground truth: {congruent}/{} congruent, victim evicted by set: {victim_evicted_by_set}",
            addresses.len()
        );
    }
    Ok(victim_evicted_by_set)
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{text}"),
        Err(e) => error!("cannot serialize report: {e}"),
    }
}

fn print_result(result: &EvictionSetResult, associativity: usize) {
    let addresses = result.addresses();
    println!(
        "Squatter: {} (speed-up {}ns), reduced pool: {} lines",
        result.squatter.address,
        result.squatter.speed_up.as_nanos(),
        result.reduced_pool_len
    );
    println!(
        "Eviction set: {} distinct of {} expected, {} accepted / {} rejected trials",
        addresses.len(),
        associativity,
        result.speed_up_count,
        result.error_count
    );
    if let Some(mean) = result.ave_speed_up {
        println!("Mean speed-up: {}ns", mean.as_nanos());
    }
    for addr in addresses {
        println!("  {addr}");
    }
}

fn print_calibration(result: &CalibrationResult) {
    println!(
        "Trials: {}  accepted: {}  errors: {}  zero deltas: {}",
        result.try_count, result.speed_up_count, result.error_count, result.zero_count
    );
    let mean = result.ave_speed_up.unwrap_or(Duration::ZERO);
    println!("Mean miss penalty: {}ns", mean.as_nanos());
    println!("Verdict: {}", result.verdict);
}
