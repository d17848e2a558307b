use rand::Rng;
use std::time::Duration;

use crate::models::RangeConfig;

fn sample(range: &RangeConfig) -> u64 {
    if range.max <= range.min {
        return range.min;
    }
    rand::thread_rng().gen_range(range.min..range.max)
}

/// Humanized pre-call delay drawn from `[min, max)` milliseconds.
pub fn jitter_delay(range_ms: &RangeConfig) -> Duration {
    Duration::from_millis(sample(range_ms))
}

/// Penalty length in milliseconds, drawn from `[min, max)` seconds.
pub fn random_cooldown_ms(range_secs: &RangeConfig) -> i64 {
    let lo = range_secs.min.saturating_mul(1000);
    let hi = range_secs.max.saturating_mul(1000);
    sample(&RangeConfig::new(lo, hi)) as i64
}
