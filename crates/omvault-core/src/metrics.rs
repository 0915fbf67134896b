// ── Derived metrics ──
//
// Computations the server doesn't hand us directly, run by the fetch
// methods after normalization. They must tolerate defaulted inputs:
// a zero total, a counter reset, an unparseable uptime.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

/// Bytes in a gibibyte; filesystem sizes are reported in GiB.
pub const GIB: f64 = 1_073_741_824.0;

/// Round to one decimal place.
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Memory usage percentage, zero when the total is unknown.
pub fn memory_usage_pct(used: i64, total: i64) -> f64 {
    if total > 0 {
        round1((used as f64 / total as f64) * 100.0)
    } else {
        0.0
    }
}

/// Parse an uptime report into whole seconds.
///
/// Older firmware reports `"5 days 3 hours 2 minutes 1 seconds"`;
/// newer firmware reports raw seconds as a float, sometimes with an
/// explicit sign. Both must yield the same boot-epoch semantics.
pub fn parse_uptime_secs(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(secs) = trimmed.trim_start_matches('+').parse::<f64>() {
        return Some(secs.abs());
    }

    let mut total = 0.0;
    let mut tokens = trimmed.split_whitespace();
    let mut matched = false;

    while let Some(count) = tokens.next() {
        let unit = tokens.next()?;
        let count: f64 = count.parse().ok()?;
        let secs_per_unit = match unit.trim_end_matches(',') {
            u if u.starts_with("day") => 86_400.0,
            u if u.starts_with("hour") => 3_600.0,
            u if u.starts_with("minute") => 60.0,
            u if u.starts_with("second") => 1.0,
            _ => return None,
        };
        total += count * secs_per_unit;
        matched = true;
    }

    matched.then_some(total)
}

/// Boot time as a unix epoch timestamp, derived from uptime.
pub fn boot_epoch(uptime_secs: f64, now: DateTime<Utc>) -> i64 {
    now.timestamp() - uptime_secs as i64
}

/// Cumulative interface counters from one poll cycle, used as the
/// baseline for the next cycle's throughput delta.
#[derive(Debug, Clone, Copy)]
pub struct CounterSample {
    pub rx_bytes: u64,
    pub tx_bytes: u64,
    pub at: Instant,
}

/// Throughput in bits/second between two cumulative byte readings.
///
/// A counter reset makes the current reading smaller than the previous
/// one; the delta floors at zero instead of going negative.
pub fn throughput_bps(previous: u64, current: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs <= 0.0 {
        return 0.0;
    }
    let delta_bytes = current.saturating_sub(previous);
    round1((delta_bytes as f64 * 8.0) / secs)
}
