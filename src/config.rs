//! Configuration for a frequency scan.

use std::ops::RangeInclusive;

/// How worker threads are assigned to logical cores.
///
/// On machines where hyperthread siblings have consecutive cpu numbers
/// (cpu0/cpu1 on the same physical core), `ConsecutivePairs` keeps one
/// sibling per physical core busy. `Alternating` assumes siblings are
/// numbered `core` and `core + num_physical` and simply uses 0, 1, 2, ...
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CorePlacement {
    /// Worker `i` runs on logical core `i`.
    #[default]
    Alternating,

    /// Worker `i` runs on logical core `2 * i`.
    ConsecutivePairs,
}

impl CorePlacement {
    /// Logical core id assigned to the given worker index.
    pub fn core_id(&self, worker: usize) -> usize {
        match self {
            CorePlacement::Alternating => worker,
            CorePlacement::ConsecutivePairs => 2 * worker,
        }
    }
}

/// Configuration options for a scan.
#[derive(Debug, Clone)]
pub struct Config {
    /// Maximum core count to scale up to. The default of 0 calibrates and
    /// reports the base frequency only, running no trials.
    pub max_cores: u32,

    /// Core count at which to start (default: 1; values below 1 are
    /// clamped up).
    pub start_cores: u32,

    /// Iterations of the sampling loop per worker (default: 100 million).
    /// Identical across every core in a trial; the engine never varies it
    /// per thread.
    pub iterations: u64,

    /// Worker-to-core placement policy (default: alternating).
    pub placement: CorePlacement,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_cores: 0,
            start_cores: 1,
            iterations: 100_000_000,
            placement: CorePlacement::Alternating,
        }
    }
}

impl Config {
    /// Create the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum core count to scale up to.
    pub fn max_cores(mut self, n: u32) -> Self {
        self.max_cores = n;
        self
    }

    /// Set the starting core count (clamped to at least 1).
    pub fn start_cores(mut self, n: u32) -> Self {
        self.start_cores = n.max(1);
        self
    }

    /// Set the sampling-loop iteration count, in millions.
    pub fn iterations_millions(mut self, n: u64) -> Self {
        self.iterations = n * 1_000_000;
        self
    }

    /// Set the worker-to-core placement policy.
    pub fn placement(mut self, placement: CorePlacement) -> Self {
        self.placement = placement;
        self
    }

    /// Core counts the scan will evaluate, in ascending order.
    ///
    /// Empty when `max_cores` is 0 or `start_cores` exceeds it.
    pub fn trial_counts(&self) -> RangeInclusive<u32> {
        self.start_cores.max(1)..=self.max_cores
    }
}
