//! The concurrent fan-out driver.
//!
//! For each core count in the configured range the driver spawns one thread
//! per participating core, waits for all of them, and folds their samples
//! into a single frequency estimate. Threads are created fresh for every
//! trial and joined before the next one begins (no pool, no reuse), so a
//! trial never inherits another trial's power-state history, and the join
//! is the only synchronization barrier the samples need.

use std::thread;

use log::debug;

use crate::arch::SamplingMode;
use crate::config::Config;
use crate::error::Error;
use crate::measurement::{run_worker, Calibration, CoreSample, INSTRUCTIONS_PER_ITERATION};
use crate::result::TrialResult;

/// Per-trial averages across all participating cores.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Aggregate {
    /// Average elapsed cycle-counter delta (integer).
    pub cycles: u64,
    /// Average APERF delta (integer; zero outside hardware-counter mode).
    pub aperf: u64,
}

/// Average the per-core samples of one trial. One sample per participating
/// core; panics on an empty slice.
pub fn aggregate(samples: &[CoreSample]) -> Aggregate {
    let n = samples.len() as u64;
    let cycles: u64 = samples.iter().map(|s| s.elapsed_cycles).sum();
    let aperf: u64 = samples.iter().map(|s| s.aperf_delta).sum();
    Aggregate {
        cycles: cycles / n,
        aperf: aperf / n,
    }
}

/// Frequency from elapsed cycles and the architecture's peak retirement
/// rate: the workload is assumed to retire at exactly that rate, so any
/// extra elapsed cycles are attributed entirely to frequency scaling.
pub fn derive_retirement_freq(
    expected_cycles: u64,
    base_frequency_hz: u64,
    actual_cycles: u64,
) -> u64 {
    (expected_cycles as f64 * base_frequency_hz as f64 / actual_cycles as f64) as u64
}

/// Frequency from the APERF delta cross-calibrated against the wallclock
/// equivalent of the elapsed cycles: the hardware counter ticks at the true
/// running frequency, and `actual_cycles * ns_per_cycle / 1e9` is the
/// elapsed time in seconds.
pub fn derive_hw_counter_freq(aperf_cycles: u64, actual_cycles: u64, ns_per_cycle: f64) -> u64 {
    (aperf_cycles as f64 / (actual_cycles as f64 * ns_per_cycle / 1e9)) as u64
}

fn derive_frequency(
    mode: SamplingMode,
    iterations: u64,
    calibration: &Calibration,
    agg: &Aggregate,
) -> u64 {
    match mode {
        SamplingMode::Retirement { per_cycle } => {
            let expected_cycles = iterations * INSTRUCTIONS_PER_ITERATION / per_cycle;
            derive_retirement_freq(expected_cycles, calibration.cycles_per_sec, agg.cycles)
        }
        SamplingMode::HwCounter => {
            derive_hw_counter_freq(agg.aperf, agg.cycles, calibration.ns_per_cycle)
        }
    }
}

/// Run one trial: spawn `idx` pinned workers, join them all, hand back
/// their samples.
///
/// Every spawned worker is joined before any failure is acted on, so
/// thread lifetimes stay strictly nested within the trial. The first
/// failure observed wins; any worker failure aborts the whole run.
fn run_trial(config: &Config, idx: u32, mode: SamplingMode) -> Result<Vec<CoreSample>, Error> {
    debug!("trial {idx}: spawning {idx} worker(s)");

    let mut workers: Vec<(usize, thread::JoinHandle<Result<CoreSample, Error>>)> =
        Vec::with_capacity(idx as usize);
    let mut failure: Option<Error> = None;

    for worker in 0..idx as usize {
        let core = config.placement.core_id(worker);
        let iterations = config.iterations;
        let spawned = thread::Builder::new()
            .name(format!("turbofreq-core{core}"))
            .spawn(move || run_worker(core, iterations, mode));
        match spawned {
            Ok(handle) => workers.push((core, handle)),
            Err(e) => {
                failure = Some(Error::Spawn(e));
                break;
            }
        }
    }

    let mut samples = Vec::with_capacity(workers.len());
    for (core, handle) in workers {
        match handle.join() {
            Ok(Ok(sample)) => samples.push(sample),
            Ok(Err(e)) => {
                if failure.is_none() {
                    failure = Some(e);
                }
            }
            Err(_) => {
                if failure.is_none() {
                    failure = Some(Error::WorkerPanic { core });
                }
            }
        }
    }

    debug!("trial {idx}: joined {} worker(s)", samples.len());

    match failure {
        Some(e) => Err(e),
        None => Ok(samples),
    }
}

/// Evaluate every configured core count in ascending order.
///
/// Runs zero trials when the configured range is empty (`max_cores` 0, or
/// `start_cores` past `max_cores`). The calibration must already have been
/// taken; it is read-only from here on.
pub fn run_scan(
    config: &Config,
    calibration: &Calibration,
    mode: SamplingMode,
) -> Result<Vec<TrialResult>, Error> {
    let mut trials = Vec::new();
    for idx in config.trial_counts() {
        let samples = run_trial(config, idx, mode)?;
        let agg = aggregate(&samples);
        let frequency_hz = derive_frequency(mode, config.iterations, calibration, &agg);
        debug!(
            "trial {idx}: avg cycles {}, avg aperf {}, {} MHz",
            agg.cycles,
            agg.aperf,
            frequency_hz / 1_000_000
        );
        trials.push(TrialResult {
            cores: idx,
            frequency_hz,
        });
    }
    Ok(trials)
}
