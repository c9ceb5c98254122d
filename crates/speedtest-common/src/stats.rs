//! Throughput and latency arithmetic shared by every test type.

/// Bits per megabit, as used for Mbps figures.
const BITS_PER_MEGABIT: f64 = 1_000_000.0;

/// Running throughput in megabits per second.
///
/// Returns 0 when no measurable time has elapsed (including a NaN elapsed
/// time), so early progress updates never report infinite speeds.
pub fn speed_mbps(bytes: u64, elapsed_secs: f64) -> f64 {
    if !(elapsed_secs > 0.0) {
        return 0.0;
    }
    (bytes as f64 * 8.0) / (elapsed_secs * BITS_PER_MEGABIT)
}

/// Share of `total` covered by `done`, in percent, clamped to `[0, 100]`.
///
/// A zero `total` counts as complete.
pub fn progress_percent(done: u64, total: u64) -> f64 {
    if total == 0 {
        return 100.0;
    }
    ((done as f64 / total as f64) * 100.0).clamp(0.0, 100.0)
}

/// Round to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Arithmetic mean. `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Population standard deviation (divides by N). `None` for an empty slice.
pub fn population_std_dev(values: &[f64]) -> Option<f64> {
    let avg = mean(values)?;
    let variance = values.iter().map(|v| (v - avg).powi(2)).sum::<f64>() / values.len() as f64;
    Some(variance.sqrt())
}

/// Human readable byte count with two decimals (`"1.50 MB"`).
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    for unit in UNITS {
        if value < 1024.0 {
            return format!("{value:.2} {unit}");
        }
        value /= 1024.0;
    }
    format!("{value:.2} TB")
}
