//! JSON serialization for scan results.

use crate::result::ScanResult;

/// Serialize a ScanResult to a compact JSON string.
///
/// # Errors
///
/// Returns an error if serialization fails (should not happen for
/// ScanResult).
pub fn to_json(result: &ScanResult) -> Result<String, serde_json::Error> {
    serde_json::to_string(result)
}

/// Serialize a ScanResult to a pretty-printed JSON string.
///
/// # Errors
///
/// Returns an error if serialization fails (should not happen for
/// ScanResult).
pub fn to_json_pretty(result: &ScanResult) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::CpuArch;
    use crate::result::TrialResult;

    fn make_result() -> ScanResult {
        ScanResult {
            arch: CpuArch {
                family: 6,
                model: 106,
                stepping: 6,
            },
            base_frequency_hz: 2_000_000_000,
            trials: vec![TrialResult {
                cores: 1,
                frequency_hz: 3_500_000_000,
            }],
        }
    }

    #[test]
    fn json_round_trip() {
        let result = make_result();
        let json = to_json(&result).unwrap();
        assert!(json.contains("\"base_frequency_hz\":2000000000"));

        let parsed: ScanResult = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.trials.len(), 1);
        assert_eq!(parsed.trials[0].frequency_hz, 3_500_000_000);
    }

    #[test]
    fn pretty_json_is_multiline() {
        let json = to_json_pretty(&make_result()).unwrap();
        assert!(json.contains('\n'));
        assert!(json.contains("base_frequency_hz"));
    }
}
