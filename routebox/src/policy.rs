//! Write-back policy of the cache-aside handler.

use std::time::Duration;

use routebox_core::ForwardOutcome;
use serde::{Deserialize, Serialize};

/// TTL applied to cached optimization results.
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

/// Decides which forwarded responses are written back and for how long.
///
/// Only a `Success` with status exactly 200 is cached. Upstream errors and
/// transport failures never are, so a transient failure is never served
/// from the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachePolicy {
    /// Time to live of a written entry (e.g. "1h", "30m", "3600s").
    #[serde(with = "humantime_serde")]
    pub ttl: Duration,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self { ttl: DEFAULT_TTL }
    }
}

impl CachePolicy {
    /// Creates a policy with the given TTL.
    pub fn new(ttl: Duration) -> Self {
        Self { ttl }
    }

    /// Whether `outcome` should be written to the store.
    pub fn should_cache(&self, outcome: &ForwardOutcome) -> bool {
        !self.ttl.is_zero() && outcome.is_cacheable()
    }
}
