//! Per-source courtesy rate limiting.
//!
//! Every upstream gets its own governor instance shared across requests, so
//! concurrent searches space their calls to a given API instead of sleeping
//! between sequential calls.

use std::collections::HashMap;
use std::time::Duration;

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};

use crate::apis::SourceId;

type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

fn limiter(period: Duration) -> Option<DirectLimiter> {
    Quota::with_period(period).map(DirectLimiter::direct)
}

fn per_second(n: u32) -> Option<DirectLimiter> {
    limiter(Duration::from_millis(1000 / n.max(1) as u64))
}

/// Collection of per-source rate limiters.
pub struct SourceLimiters {
    limiters: HashMap<SourceId, DirectLimiter>,
}

impl SourceLimiters {
    /// Build limiters for the public API quotas.
    pub fn new(has_s2_api_key: bool) -> Self {
        let mut limiters = HashMap::new();
        let mut insert = |id, l: Option<DirectLimiter>| {
            if let Some(l) = l {
                limiters.insert(id, l);
            }
        };

        // Semantic Scholar: keyed 1/s, keyless ~100 req / 5 min
        if has_s2_api_key {
            insert(SourceId::SemanticScholar, per_second(1));
        } else {
            insert(SourceId::SemanticScholar, limiter(Duration::from_secs(3)));
        }
        insert(SourceId::Arxiv, per_second(3));
        // CORE: 1,000/day on the free plan
        insert(SourceId::Core, per_second(1));
        insert(SourceId::CrossRef, per_second(1));
        insert(SourceId::GoogleScholar, per_second(1));

        Self { limiters }
    }

    /// No limiting at all.
    #[cfg(test)]
    pub fn disabled() -> Self {
        Self {
            limiters: HashMap::new(),
        }
    }

    #[cfg(test)]
    fn with_period(id: SourceId, period: Duration) -> Self {
        let mut limiters = HashMap::new();
        if let Some(l) = limiter(period) {
            limiters.insert(id, l);
        }
        Self { limiters }
    }

    /// Wait until `id` may make another request.
    pub async fn acquire(&self, id: SourceId) {
        if let Some(l) = self.limiters.get(&id) {
            l.until_ready().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn acquire_spaces_requests() {
        let limiters = SourceLimiters::with_period(SourceId::Arxiv, Duration::from_millis(50));
        let start = Instant::now();
        for _ in 0..3 {
            limiters.acquire(SourceId::Arxiv).await;
        }
        assert!(start.elapsed() >= Duration::from_millis(90));
    }

    #[tokio::test]
    async fn unlimited_sources_do_not_wait() {
        let limiters = SourceLimiters::with_period(SourceId::Arxiv, Duration::from_secs(60));
        let start = Instant::now();
        for _ in 0..5 {
            limiters.acquire(SourceId::CrossRef).await;
        }
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn every_source_has_a_limiter() {
        let limiters = SourceLimiters::new(true);
        for id in SourceId::ALL {
            assert!(limiters.limiters.contains_key(&id), "missing limiter for {id}");
        }
    }
}
