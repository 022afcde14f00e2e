//! Human-readable terminal report.

use colored::Colorize;

use crate::result::ScanResult;

/// Format a scan result as the one-line-per-result text report: the base
/// frequency first, then one line per evaluated core count.
pub fn format_report(result: &ScanResult) -> String {
    let mut output = String::new();

    output.push_str(&format!(
        "{}\n",
        format!("P1 freq = {} MHz", result.base_frequency_mhz()).bold()
    ));

    for trial in &result.trials {
        output.push_str(&format!(
            "{}-core turbo\t{} MHz\n",
            trial.cores,
            trial.frequency_mhz()
        ));
    }

    output
}
