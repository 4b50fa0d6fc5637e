use std::time::Duration;

use coolhub_domain::policy::HysteresisPolicy;

use crate::backoff::RetryPolicy;

/// Tunables of the control loop, already validated.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub policy: HysteresisPolicy,
    /// How far back a reading may be timestamped relative to the last
    /// accepted one before it is rejected as stale.
    pub stale_timestamp_skew: Duration,
    /// Manual override lifetime, counted from the last button activity.
    pub override_ttl: Duration,
    pub persist_retry: RetryPolicy,
}

impl CoordinatorConfig {
    pub const DEFAULT_STALE_TIMESTAMP_SKEW: Duration = Duration::from_secs(5);
    pub const DEFAULT_OVERRIDE_TTL: Duration = Duration::from_secs(15);

    /// Configuration with default timings around `policy`.
    #[must_use]
    pub fn new(policy: HysteresisPolicy) -> Self {
        Self {
            policy,
            stale_timestamp_skew: Self::DEFAULT_STALE_TIMESTAMP_SKEW,
            override_ttl: Self::DEFAULT_OVERRIDE_TTL,
            persist_retry: RetryPolicy::default(),
        }
    }
}
