//! Measurement primitives: cycle counting, MSR access, calibration, and
//! the per-core sampling workload.

mod calibrate;
mod msr;
mod tsc;
mod workload;

pub use calibrate::{calibrate_with, Calibration};
pub use msr::{aperf_accessible, read_aperf, read_msr, IA32_APERF};
pub use tsc::{ramp_up, read_cycles, RAMP_UP_CYCLES};
pub use workload::{run_worker, spin_loop, CoreSample, INSTRUCTIONS_PER_ITERATION};
