//! End-to-end checks of the measurement engine's observable contracts,
//! exercised without real hardware access: simulated clocks for the
//! calibrator, synthetic samples for aggregation and derivation, and
//! injected probes for mode resolution.

use std::cell::Cell;

use turbofreq::driver::{aggregate, derive_hw_counter_freq, derive_retirement_freq, run_scan};
use turbofreq::measurement::CoreSample;
use turbofreq::{
    calibrate_with, output, resolve_mode, Calibration, Config, CorePlacement, CpuArch, Error,
    SamplingMode, ScanResult, TrialResult,
};

fn arch(family: u32, model: u32) -> CpuArch {
    CpuArch {
        family,
        model,
        stepping: 0,
    }
}

/// Calibration against a simulated monotonic clock must reproduce the
/// injected cycles-per-millisecond ratio.
#[test]
fn calibration_recovers_injected_ratio() {
    let tick = Cell::new(0u64);
    let ticks_ms = || {
        let t = tick.get();
        tick.set(t + 1);
        t
    };
    // 2.5M cycles per simulated millisecond.
    let cycles = || tick.get() * 2_500_000;

    let calibration = calibrate_with(ticks_ms, cycles);

    let expected = 2_500_000_000u64;
    let error = calibration.cycles_per_sec.abs_diff(expected);
    // A couple of cycle reads land between tick observations; allow their
    // worth of skew over the 500 ms window.
    assert!(
        error <= 2 * 2_500_000 * 1000 / 500,
        "cycles_per_sec {} vs expected {}",
        calibration.cycles_per_sec,
        expected
    );
}

/// The retirement-mode formula is an identity when actual cycles equal
/// expected cycles.
#[test]
fn retirement_derivation_identity() {
    // iterations=1M, 200 instructions/iteration, retire 4/cycle.
    let mode = SamplingMode::Retirement { per_cycle: 4 };
    let expected_cycles = mode.expected_cycles(1_000_000).unwrap();
    assert_eq!(expected_cycles, 50_000_000);

    let freq = derive_retirement_freq(expected_cycles, 2_000_000_000, 50_000_000);
    assert_eq!(freq, 2_000_000_000);
}

/// The hardware-counter formula divides counter ticks by wallclock seconds
/// reconstructed from cycles.
#[test]
fn hw_counter_derivation() {
    let freq = derive_hw_counter_freq(3_000_000_000, 1_000_000_000, 0.5);
    assert_eq!(freq, 6_000_000_000);
}

/// Aggregation is an integer average over per-core samples.
#[test]
fn aggregation_integer_average() {
    let samples: Vec<CoreSample> = [100u64, 200, 300]
        .iter()
        .enumerate()
        .map(|(core_id, &elapsed_cycles)| CoreSample {
            core_id,
            elapsed_cycles,
            aperf_delta: 0,
            iterations: 1,
        })
        .collect();
    assert_eq!(aggregate(&samples).cycles, 200);
}

/// Placement policies assign the documented logical core ids.
#[test]
fn placement_policies() {
    let consecutive: Vec<usize> = (0..3)
        .map(|i| CorePlacement::ConsecutivePairs.core_id(i))
        .collect();
    assert_eq!(consecutive, vec![0, 2, 4]);

    let alternating: Vec<usize> = (0..3)
        .map(|i| CorePlacement::Alternating.core_id(i))
        .collect();
    assert_eq!(alternating, vec![0, 1, 2]);
}

/// A start count past the maximum produces zero trials; only the base
/// frequency would be reported.
#[test]
fn start_past_max_runs_zero_trials() {
    let config = Config::new().start_cores(2).max_cores(1);
    assert_eq!(config.trial_counts().count(), 0);

    let calibration = Calibration {
        cycles_per_sec: 2_000_000_000,
        ns_per_cycle: 0.5,
    };
    let trials = run_scan(
        &config,
        &calibration,
        SamplingMode::Retirement { per_cycle: 4 },
    )
    .unwrap();
    assert!(trials.is_empty());
}

/// An architecture absent from the lookup table, with hardware-counter
/// mode inapplicable, is refused before any trial runs.
#[test]
fn unknown_architecture_is_refused() {
    let err = resolve_mode(&arch(6, 199), || false).unwrap_err();
    assert!(matches!(err, Error::UnsupportedArch(_)));
}

/// A hardware-counter-only model whose APERF probe fails is refused before
/// any measurement begins.
#[test]
fn aperf_probe_failure_is_refused() {
    let err = resolve_mode(&arch(6, 143), || false).unwrap_err();
    assert!(matches!(err, Error::AperfUnavailable));
}

/// The text report and the JSON output agree on the same scan.
#[test]
fn report_and_json_agree() {
    colored::control::set_override(false);
    let result = ScanResult {
        arch: arch(6, 85),
        base_frequency_hz: 2_100_000_000,
        trials: vec![TrialResult {
            cores: 3,
            frequency_hz: 3_100_000_000,
        }],
    };

    let report = output::format_report(&result);
    assert!(report.contains("P1 freq = 2100 MHz"));
    assert!(report.contains("3-core turbo\t3100 MHz"));

    let json = output::to_json(&result).unwrap();
    let parsed: ScanResult = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed.base_frequency_hz, result.base_frequency_hz);
    assert_eq!(parsed.trials, result.trials);
}
