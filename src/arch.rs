//! Architecture identification and sampling-mode selection.
//!
//! The engine needs to know, for a given CPU, how many simple instructions
//! retire per cycle so it can back-compute frequency from an elapsed cycle
//! count. That constant is only reliable for a small set of Intel server
//! parts; newer parts (SPR, EMR) instead read the APERF MSR, which counts
//! at the true running frequency. Exactly one of the two modes must be
//! established before any sampling starts.

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::measurement::INSTRUCTIONS_PER_ITERATION;

/// CPU identification consumed as opaque lookup keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpuArch {
    /// CPUID family id.
    pub family: u32,
    /// CPUID model id (with the extended-model bits folded in).
    pub model: u32,
    /// CPUID stepping id.
    pub stepping: u32,
}

impl CpuArch {
    /// Identify the CPU this process is running on.
    ///
    /// Returns `None` when CPUID is unavailable (non-x86 builds).
    #[cfg(target_arch = "x86_64")]
    pub fn detect() -> Option<Self> {
        let cpuid = raw_cpuid::CpuId::new();
        let info = cpuid.get_feature_info()?;
        Some(Self {
            family: u32::from(info.family_id()),
            model: u32::from(info.model_id()),
            stepping: u32::from(info.stepping_id()),
        })
    }

    /// Identify the CPU this process is running on.
    #[cfg(not(target_arch = "x86_64"))]
    pub fn detect() -> Option<Self> {
        None
    }
}

/// How per-core samples are turned into a frequency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplingMode {
    /// Infer frequency from elapsed cycles and the architecture's peak
    /// retirement rate for simple single-cycle instructions.
    Retirement {
        /// Instructions retired per cycle (4 or 5).
        per_cycle: u64,
    },

    /// Bracket the sampling loop with APERF MSR reads and treat the counter
    /// delta as ticks of the true running frequency.
    HwCounter,
}

impl SamplingMode {
    /// Cycle count the sampling loop would take at exactly the peak
    /// retirement rate. `None` in hardware-counter mode.
    pub fn expected_cycles(&self, iterations: u64) -> Option<u64> {
        match self {
            SamplingMode::Retirement { per_cycle } => {
                Some(iterations * INSTRUCTIONS_PER_ITERATION / per_cycle)
            }
            SamplingMode::HwCounter => None,
        }
    }
}

/// Peak retirement rate for simple dependency-free instructions, keyed by
/// (family, model). Intel only.
const RETIREMENT_RATES: &[(u32, u32, u64)] = &[
    (6, 106, 5), // ICX
    (6, 108, 5), // ICX-D
    (6, 63, 4),  // HSX
    (6, 79, 4),  // BDX
    (6, 86, 4),  // BDX-DE
    (6, 85, 4),  // SKX, CLX, CPX
];

/// Models where the retirement heuristic is known to be unreliable and the
/// APERF counter must be used instead.
const HW_COUNTER_MODELS: &[(u32, u32)] = &[
    (6, 143), // SPR
    (6, 207), // EMR
];

fn retirement_rate(arch: &CpuArch) -> Option<u64> {
    RETIREMENT_RATES
        .iter()
        .find(|(family, model, _)| *family == arch.family && *model == arch.model)
        .map(|(_, _, rate)| *rate)
}

fn requires_hw_counter(arch: &CpuArch) -> bool {
    HW_COUNTER_MODELS
        .iter()
        .any(|(family, model)| *family == arch.family && *model == arch.model)
}

/// Establish the sampling mode for the detected CPU.
///
/// `aperf_available` is consulted only for models on the hardware-counter
/// allow-list; it should attempt one APERF read and report whether it
/// succeeded (see [`crate::measurement::aperf_accessible`]). Probe failure
/// on such a model is fatal; there is no retirement-rate fallback for it.
pub fn resolve_mode<P>(arch: &CpuArch, aperf_available: P) -> Result<SamplingMode, Error>
where
    P: FnOnce() -> bool,
{
    if requires_hw_counter(arch) {
        if aperf_available() {
            return Ok(SamplingMode::HwCounter);
        }
        return Err(Error::AperfUnavailable);
    }
    match retirement_rate(arch) {
        Some(per_cycle) => Ok(SamplingMode::Retirement { per_cycle }),
        None => Err(Error::UnsupportedArch(*arch)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arch(family: u32, model: u32) -> CpuArch {
        CpuArch {
            family,
            model,
            stepping: 0,
        }
    }

    #[test]
    fn icx_retires_five_per_cycle() {
        let mode = resolve_mode(&arch(6, 106), || false).unwrap();
        assert_eq!(mode, SamplingMode::Retirement { per_cycle: 5 });
    }

    #[test]
    fn skx_retires_four_per_cycle() {
        let mode = resolve_mode(&arch(6, 85), || false).unwrap();
        assert_eq!(mode, SamplingMode::Retirement { per_cycle: 4 });
    }

    #[test]
    fn spr_uses_hw_counter_when_aperf_readable() {
        let mode = resolve_mode(&arch(6, 143), || true).unwrap();
        assert_eq!(mode, SamplingMode::HwCounter);
    }

    #[test]
    fn spr_fails_without_aperf() {
        let err = resolve_mode(&arch(6, 143), || false).unwrap_err();
        assert!(matches!(err, Error::AperfUnavailable));
    }

    #[test]
    fn unknown_model_is_unsupported() {
        // Not in the retirement table, not on the hardware-counter list:
        // the probe must not even be consulted.
        let err = resolve_mode(&arch(6, 42), || panic!("probe must not run")).unwrap_err();
        assert!(matches!(err, Error::UnsupportedArch(_)));
    }

    #[test]
    fn non_intel_family_is_unsupported() {
        let err = resolve_mode(&arch(25, 1), || false).unwrap_err();
        assert!(matches!(err, Error::UnsupportedArch(_)));
    }

    #[test]
    fn expected_cycles_scales_with_rate() {
        let mode = SamplingMode::Retirement { per_cycle: 4 };
        // 1M iterations * 200 instructions / 4 per cycle
        assert_eq!(mode.expected_cycles(1_000_000), Some(50_000_000));
        assert_eq!(SamplingMode::HwCounter.expected_cycles(1_000_000), None);
    }
}
