use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::Duration;

const BASE: Duration = Duration::from_millis(250);
const MAX: Duration = Duration::from_secs(300);
const MAX_DOUBLINGS: u32 = 7; // 250ms * 2^7 = 32s, well under MAX before the cap bites

/// Deterministic jittered exponential back-off for a failed reconcile.
///
/// `attempt` is the number of consecutive failures for `pool_name` so far.
/// The jitter comes from hashing `(pool_name, attempt)` rather than a `rand`
/// dependency — deterministic given the same inputs, which keeps retries
/// reproducible in tests, but still spreads concurrently-failing pools
/// across the retry window instead of synchronizing their retries.
pub fn jittered_backoff(pool_name: &str, attempt: u32) -> Duration {
    let exponent = attempt.min(MAX_DOUBLINGS);
    let capped = BASE.saturating_mul(1u32 << exponent).min(MAX);

    let mut hasher = DefaultHasher::new();
    pool_name.hash(&mut hasher);
    attempt.hash(&mut hasher);
    let jitter_frac = (hasher.finish() % 1000) as f64 / 1000.0; // [0.0, 1.0)

    capped.mul_f64(0.5 + 0.5 * jitter_frac) // 50%-100% of the capped delay
}
