//! Wallclock calibration of the cycle counter.
//!
//! Times a fixed wallclock window against the cycle counter to derive the
//! counter's frequency. On hardware with an invariant TSC that frequency is
//! the processor's base (P1) frequency, which the engine reports directly
//! and uses as the baseline for every turbo derivation.

use std::sync::atomic::{fence, Ordering};
use std::sync::OnceLock;
use std::time::Instant;

use log::info;

use super::tsc::read_cycles;

/// Wallclock window to time the cycle counter over. A larger window shrinks
/// the relative error from millisecond quantization at the cost of startup
/// latency.
const CALIBRATION_WINDOW_MS: u64 = 500;

/// Cycle-counter-to-wallclock constants, computed once at startup.
///
/// Never mutated after calibration completes; workers receive it by copy
/// and only read it.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Calibration {
    /// Cycle-counter increments per wallclock second.
    pub cycles_per_sec: u64,
    /// Nanoseconds covered by one cycle-counter increment.
    pub ns_per_cycle: f64,
}

impl Calibration {
    /// Calibrate against the real wallclock and cycle counter.
    ///
    /// Runs exactly once, before any worker ramps up. Both internal
    /// busy-waits are unbounded: a wallclock source that stops advancing
    /// hangs the process here. That is the accepted failure mode of a
    /// diagnostic tool, not something this routine times out of.
    pub fn run() -> Self {
        let calibration = calibrate_with(tick_count_ms, read_cycles);
        info!(
            "calibrated: {} cycles/sec ({:.6} ns/cycle)",
            calibration.cycles_per_sec, calibration.ns_per_cycle
        );
        calibration
    }
}

/// Milliseconds since process start, from a monotonic source.
fn tick_count_ms() -> u64 {
    static START: OnceLock<Instant> = OnceLock::new();
    let start = START.get_or_init(Instant::now);
    start.elapsed().as_millis() as u64
}

/// Calibrate against caller-supplied tick and cycle sources.
///
/// Busy-waits until the millisecond tick changes, so the window starts at a
/// tick boundary rather than mid-tick; records the cycle counter at that
/// edge, busy-waits out the window, records again.
/// `cycles_per_sec = cycle_delta * 1000 / ms_delta`.
pub fn calibrate_with<T, C>(mut ticks_ms: T, mut cycles: C) -> Calibration
where
    T: FnMut() -> u64,
    C: FnMut() -> u64,
{
    // Align to a tick edge.
    let mut start_tick = ticks_ms();
    loop {
        let tick = ticks_ms();
        if tick != start_tick {
            start_tick = tick;
            break;
        }
    }

    fence(Ordering::SeqCst);
    let start = cycles();
    fence(Ordering::SeqCst);

    let mut end_tick;
    loop {
        end_tick = ticks_ms();
        if end_tick >= start_tick + CALIBRATION_WINDOW_MS {
            break;
        }
    }

    fence(Ordering::SeqCst);
    let end = cycles();
    fence(Ordering::SeqCst);

    let cycle_delta = end.wrapping_sub(start);
    let ms_delta = end_tick - start_tick;
    let cycles_per_sec = cycle_delta * 1000 / ms_delta;

    Calibration {
        cycles_per_sec,
        ns_per_cycle: 1e9 / cycles_per_sec as f64,
    }
}
