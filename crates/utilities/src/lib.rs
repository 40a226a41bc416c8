//! # Utilities
//! Small helpers shared by the capture crates, mostly for producing readable log output.
//!

use core::time::Duration;
use std::time::Instant;

use tracing::debug;

/// Display the duration as a string with units. Display is handled in the following order:
/// 1. `>= 10s` displays seconds only.
/// 1. `>= 1s` displays seconds with 1dp.
/// 1. `>= 1ms` displays milliseconds only.
/// 1. `>= 1µs` displays microseconds only.
/// 1. `< 1µs` displays nanoseconds only.
#[inline]
pub fn display_duration(duration: Duration) -> String {
    if duration.as_secs() >= 10 {
        format!("{}s", duration.as_secs())
    } else if duration.as_secs() >= 1 {
        format!("{:.1}s", duration.as_secs_f32())
    } else if duration.as_millis() >= 1 {
        format!("{}ms", duration.as_millis())
    } else if duration.as_micros() >= 1 {
        format!("{}µs", duration.as_micros())
    } else {
        format!("{}ns", duration.as_nanos())
    }
}

/// Display a byte count using binary units, e.g. `1.8MiB`.
pub fn display_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KiB", "MiB", "GiB", "TiB"];

    if bytes < 1024 {
        return format!("{bytes}B");
    }

    let mut value = bytes as f64 / 1024.0;
    let mut unit = UNITS[0];
    for next in &UNITS[1..] {
        if value < 1024.0 {
            break;
        }
        value /= 1024.0;
        unit = next;
    }

    format!("{value:.1}{unit}")
}

/// Structure that on drop, logs the time since construction.
pub struct DebugTime {
    label: String,
    start: Instant,
}

impl DebugTime {
    /// Start a new debug timer with the given label.
    /// Label is printed in the format `[Timing] {label} took {duration}`
    pub fn start<S: Into<String>>(label: S) -> Self {
        Self {
            label: label.into(),
            start: Instant::now(),
        }
    }

    /// Time since the timer was started.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for DebugTime {
    fn drop(&mut self) {
        debug!(
            "[Timing] {} took {}",
            self.label,
            display_duration(self.start.elapsed())
        )
    }
}

#[cfg(test)]
mod tests {
    use core::time::Duration;

    use super::{display_bytes, display_duration};

    #[test]
    fn duration_units() {
        assert_eq!(display_duration(Duration::from_secs(100)), "100s");
        assert_eq!(display_duration(Duration::from_millis(2500)), "2.5s");
        assert_eq!(display_duration(Duration::from_millis(16)), "16ms");
        assert_eq!(display_duration(Duration::from_micros(250)), "250µs");
        assert_eq!(display_duration(Duration::from_nanos(80)), "80ns");
    }

    #[test]
    fn byte_units() {
        assert_eq!(display_bytes(512), "512B");
        assert_eq!(display_bytes(2048), "2.0KiB");
        assert_eq!(display_bytes(800 * 600 * 4), "1.8MiB");
        assert_eq!(display_bytes(3 * 1024 * 1024 * 1024), "3.0GiB");
    }
}
