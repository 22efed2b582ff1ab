use chrono::{DateTime, Utc};
use mcp_types::RebootStrategy;

/// Gates the reboot determiner's raw verdict through the pool's reboot
/// strategy (a supplemented behavior: the distilled spec names the
/// `Never`/`IfRequired`/`Always` enum but never wires it into C5).
///
/// `Never` forces no reboot regardless of the verdict; `Always` forces a
/// reboot whenever the node is updating at all; `IfRequired` passes the
/// determiner's verdict through unchanged.
pub fn effective_reboot_required(
    verdict_required: bool,
    strategy: RebootStrategy,
    node_is_updating: bool,
) -> bool {
    match strategy {
        RebootStrategy::Never => false,
        RebootStrategy::Always => node_is_updating,
        RebootStrategy::IfRequired => verdict_required,
    }
}

/// True iff `min_interval_seconds` has elapsed since `last_reboot_required_at`
/// (or no reboot has ever been required on this node, in which case the gate
/// is always open). Supplements `reboot.minIntervalSeconds`, which the
/// distilled spec defines but never enforces.
pub fn min_interval_elapsed(
    last_reboot_required_at: Option<DateTime<Utc>>,
    min_interval_seconds: u64,
    now: DateTime<Utc>,
) -> bool {
    match last_reboot_required_at {
        None => true,
        Some(at) => {
            let elapsed = now.signed_duration_since(at);
            elapsed >= chrono::Duration::seconds(min_interval_seconds as i64)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn never_strategy_suppresses_reboot() {
        assert!(!effective_reboot_required(true, RebootStrategy::Never, true));
    }

    #[test]
    fn always_strategy_forces_reboot_whenever_updating() {
        assert!(effective_reboot_required(false, RebootStrategy::Always, true));
        assert!(!effective_reboot_required(false, RebootStrategy::Always, false));
    }

    #[test]
    fn if_required_passes_verdict_through() {
        assert!(effective_reboot_required(true, RebootStrategy::IfRequired, true));
        assert!(!effective_reboot_required(false, RebootStrategy::IfRequired, true));
    }

    #[test]
    fn min_interval_gate_opens_after_elapsed_seconds() {
        let now = DateTime::parse_from_rfc3339("2026-01-01T00:10:00Z").unwrap().with_timezone(&Utc);
        let last = DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z").unwrap().with_timezone(&Utc);
        assert!(!min_interval_elapsed(Some(last), 3600, now));
        assert!(min_interval_elapsed(Some(last), 300, now));
        assert!(min_interval_elapsed(None, 3600, now));
    }
}
