//! WebAssembly bindings for the eviction set finder.
//!
//! Exposes [`CacheProfiler`] to JavaScript, timed with `performance.now()` and
//! probing a victim word in its own heap allocation. Results cross the boundary
//! as JSON strings.
//!
//! A page that must stay responsive uses the sliced API instead of
//! `findEvictionSet`:
//!
//! ```js
//! profiler.beginSearch(10000, 40);
//! function tick() {
//!     if (profiler.advance(250)) {
//!         show(JSON.parse(profiler.takeResult()));
//!     } else {
//!         setTimeout(tick, 0);
//!     }
//! }
//! tick();
//! ```

use std::time::Duration;

use evset_core::config::Config;
use evset_core::profiler::rng_from_seed;
use evset_core::refiner::{SearchPhase, SearchProgress};
use evset_core::timing::{HeapVictim, TimingOracle};
use evset_core::{EvictionSetResult, profiler};
use rand::rngs::SmallRng;
use wasm_bindgen::prelude::*;

/// [`TimingOracle`] backed by the page's `Performance` object.
///
/// Browsers clamp `performance.now()` to a coarse resolution; this is
/// tolerated and shows up as rejected candidates, not errors.
#[derive(Debug, Clone)]
struct PerformanceClock {
    performance: web_sys::Performance,
}

impl TimingOracle for PerformanceClock {
    fn now(&mut self) -> Duration {
        let ms = self.performance.now();
        Duration::from_nanos((ms * 1_000_000.0) as u64)
    }
}

/// Converts a JavaScript threshold in nanoseconds.
fn threshold(ns: f64) -> Duration {
    Duration::from_nanos(ns as u64)
}

fn log(message: &str) {
    web_sys::console::log_1(&JsValue::from_str(message));
}

/// Browser-facing eviction set finder.
#[wasm_bindgen]
#[derive(Debug)]
pub struct CacheProfiler {
    inner: profiler::CacheProfiler<PerformanceClock, HeapVictim, SmallRng>,
    slice_len: u32,
    finished: Option<EvictionSetResult>,
}

#[wasm_bindgen]
impl CacheProfiler {
    /// Allocates the eviction buffer and the victim.
    ///
    /// `config` is an optional JSON configuration; missing fields use defaults.
    #[wasm_bindgen(constructor)]
    pub fn new(
        performance: web_sys::Performance,
        config: Option<String>,
    ) -> Result<CacheProfiler, JsError> {
        let config = match config {
            Some(json) => Config::from_json(&json)?,
            None => Config::default(),
        };
        config.validate()?;
        let inner = profiler::CacheProfiler::new(
            &config,
            PerformanceClock { performance },
            HeapVictim::new(),
            rng_from_seed(config.search.seed),
        )?;
        Ok(Self {
            inner,
            slice_len: config.search.slice_len,
            finished: None,
        })
    }

    /// Runs the whole search, blocking the calling thread.
    ///
    /// Returns the result as JSON.
    #[wasm_bindgen(js_name = findEvictionSet)]
    pub fn find_eviction_set(&mut self, fuel: u32, threshold_ns: f64) -> Result<String, JsError> {
        let result = self.inner.find_eviction_set(fuel, threshold(threshold_ns))?;
        Ok(serde_json::to_string(&result)?)
    }

    /// Measures the miss-versus-hit gap. Returns the result as JSON.
    #[wasm_bindgen(js_name = measureCacheMissPenalty)]
    pub fn measure_cache_miss_penalty(&mut self, fuel: u32) -> Result<String, JsError> {
        let result = self.inner.measure_cache_miss_penalty(fuel)?;
        Ok(serde_json::to_string(&result)?)
    }

    /// Starts a sliced search, discarding any unclaimed result.
    ///
    /// A rejected start keeps both the running search and the unclaimed result.
    #[wasm_bindgen(js_name = beginSearch)]
    pub fn begin_search(&mut self, fuel: u32, threshold_ns: f64) -> Result<(), JsError> {
        self.inner.begin_search(fuel, threshold(threshold_ns))?;
        self.finished = None;
        Ok(())
    }

    /// Runs one slice of the search in progress.
    ///
    /// `slice_len` defaults to the configured slice length. Returns `true` once
    /// the result is ready for [`take_result`](Self::take_result).
    pub fn advance(&mut self, slice_len: Option<u32>) -> Result<bool, JsError> {
        match self.inner.advance(slice_len.unwrap_or(self.slice_len))? {
            SearchProgress::Pending {
                phase,
                tries,
                fuel,
                pool_len,
            } => {
                let phase = match phase {
                    SearchPhase::Coarse => "coarse",
                    SearchPhase::Precise => "precise",
                };
                log(&format!("{phase}: {tries}/{fuel} trials, pool {pool_len}"));
                Ok(false)
            }
            SearchProgress::Complete(result) => {
                log(&format!(
                    "search complete: {} distinct addresses",
                    result.addresses().len()
                ));
                self.finished = Some(*result);
                Ok(true)
            }
        }
    }

    /// Returns the finished result as JSON, once.
    #[wasm_bindgen(js_name = takeResult)]
    pub fn take_result(&mut self) -> Result<Option<String>, JsError> {
        match self.finished.take() {
            Some(result) => Ok(Some(serde_json::to_string(&result)?)),
            None => Ok(None),
        }
    }

    /// Returns `true` while a sliced search is in progress.
    #[wasm_bindgen(getter, js_name = isSearching)]
    pub fn is_searching(&self) -> bool {
        self.inner.is_searching()
    }
}

/// Installs the panic hook that forwards panics to the browser console.
#[wasm_bindgen]
pub fn init() {
    console_error_panic_hook::set_once();
}
