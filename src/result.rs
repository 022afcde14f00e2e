//! Scan result types.

use serde::{Deserialize, Serialize};

use crate::arch::CpuArch;

/// Derived frequency for one core count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialResult {
    /// Number of cores kept simultaneously busy.
    pub cores: u32,
    /// Sustained frequency derived for that core count, in Hz.
    pub frequency_hz: u64,
}

impl TrialResult {
    /// Derived frequency in MHz (truncating).
    pub fn frequency_mhz(&self) -> u64 {
        self.frequency_hz / 1_000_000
    }
}

/// Complete result of a frequency scan.
///
/// Trials are ordered by ascending core count. Each trial is independent of
/// the ones before it; they share only the startup calibration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanResult {
    /// CPU the scan ran on.
    pub arch: CpuArch,
    /// Base (P1) frequency from calibration, in Hz.
    pub base_frequency_hz: u64,
    /// One entry per evaluated core count. Empty when the scan was
    /// calibration-only.
    pub trials: Vec<TrialResult>,
}

impl ScanResult {
    /// Base frequency in MHz (truncating).
    pub fn base_frequency_mhz(&self) -> u64 {
        self.base_frequency_hz / 1_000_000
    }
}
