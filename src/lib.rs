//! # turbofreq
//!
//! Measure the sustained ("turbo") clock frequency a processor holds when
//! 1..N cores are kept simultaneously busy, and report the base ("P1")
//! frequency as the baseline.
//!
//! The engine calibrates the cycle counter against the wallclock once at
//! startup, then for each core count spawns one pinned worker thread per
//! participating core. Every worker ramps its core up to steady state and
//! runs a fixed-instruction-mix loop; the elapsed cycle counts (and, on
//! CPUs that need it, APERF MSR deltas) are averaged into one frequency
//! per core count. Two derivations exist:
//!
//! - **Retirement mode** (default): the loop's instruction count is known
//!   exactly, and so is the architecture's peak retirement rate, so the
//!   cycle count the loop *should* take is known; any excess is attributed
//!   to frequency scaling.
//! - **Hardware-counter mode** (SPR/EMR): the APERF MSR ticks at the true
//!   running frequency and is read around the loop directly.
//!
//! ## Quick Start
//!
//! ```ignore
//! use turbofreq::{measure, Config, CpuArch};
//!
//! let arch = CpuArch::detect().expect("not an x86_64 machine");
//! let config = Config::new().max_cores(4);
//! let result = measure(&config, arch)?;
//!
//! println!("P1 = {} MHz", result.base_frequency_mhz());
//! for trial in &result.trials {
//!     println!("{} cores -> {} MHz", trial.cores, trial.frequency_mhz());
//! }
//! ```
//!
//! Measurements are only as good as the setup: the binary must run with
//! enough privileges for MSR access on hardware-counter CPUs, and anything
//! else competing for the measured cores will show up in the numbers.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod affinity;
mod arch;
mod config;
mod error;
mod result;

pub mod driver;
pub mod measurement;
pub mod output;

pub use arch::{resolve_mode, CpuArch, SamplingMode};
pub use config::{Config, CorePlacement};
pub use error::Error;
pub use measurement::{calibrate_with, Calibration};
pub use result::{ScanResult, TrialResult};

/// Run a complete scan: resolve the sampling mode for `arch`, calibrate,
/// then evaluate every configured core count.
///
/// Calibration runs on whichever core the caller's thread happens to be on,
/// after ramping it up, so the P1 reading reflects steady state. With the
/// default `Config` (max_cores 0) this calibrates and returns no trials.
///
/// # Errors
///
/// Refuses to measure on an architecture with no known retirement rate and
/// no hardware-counter support, and aborts on any worker failure: a
/// failed core pin or a failed mid-measurement MSR read invalidates the
/// whole run, not just one worker.
pub fn measure(config: &Config, arch: CpuArch) -> Result<ScanResult, Error> {
    let mode = resolve_mode(&arch, measurement::aperf_accessible)?;

    measurement::ramp_up();
    let calibration = Calibration::run();

    let trials = driver::run_scan(config, &calibration, mode)?;

    Ok(ScanResult {
        arch,
        base_frequency_hz: calibration.cycles_per_sec,
        trials,
    })
}
