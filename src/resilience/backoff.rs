//! Fixed delay with optional jitter.

use std::time::Duration;
use rand::Rng;

/// Compute the sleep between two attempts.
///
/// The base delay is flat. `jitter_ratio` adds a random extra of up to
/// `ratio * delay`; a ratio of `0.0` yields exactly `delay`.
pub fn fixed_delay(delay: Duration, jitter_ratio: f64) -> Duration {
    let ratio = jitter_ratio.clamp(0.0, 1.0);
    if ratio.is_nan() || ratio == 0.0 || delay.is_zero() {
        return delay;
    }

    let factor = rand::thread_rng().gen_range(0.0..=ratio);
    delay.saturating_add(delay.mul_f64(factor))
}
