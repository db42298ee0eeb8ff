use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;

use crate::apis::{PaperRecord, PaperSource, SourceError, SourceId, Tier, YearFilter};
use crate::rate_limit::SourceLimiters;

/// Records requested from each free source.
pub const FREE_TIER_LIMIT: u32 = 3;
/// Records requested from the metered backup source.
pub const BACKUP_TIER_LIMIT: u32 = 5;
/// The backup tier only runs when the free tier returned fewer than this.
pub const BACKUP_THRESHOLD: usize = 5;
/// Titles sharing this many leading (lowercased) characters are duplicates.
pub const DEDUP_PREFIX_CHARS: usize = 50;

#[derive(Debug, Clone, Default)]
pub struct SearchQuery {
    pub query: String,
    pub year: YearFilter,
    /// `None` queries every configured source.
    pub sources: Option<Vec<SourceId>>,
}

#[derive(Debug, Clone, Default)]
pub struct SearchOutcome {
    pub records: Vec<PaperRecord>,
    pub sources_used: Vec<SourceId>,
}

/// Fans a query out to the configured sources and merges the results.
pub struct Aggregator {
    sources: Vec<Arc<dyn PaperSource>>,
    limiters: Arc<SourceLimiters>,
    timeout: Duration,
}

impl Aggregator {
    pub fn new(
        sources: Vec<Arc<dyn PaperSource>>,
        limiters: Arc<SourceLimiters>,
        timeout: Duration,
    ) -> Self {
        Self {
            sources,
            limiters,
            timeout,
        }
    }

    /// Free sources run concurrently; the backup source runs afterwards, and
    /// only if the free tier came back short. Never fails: a source that
    /// errors or times out contributes nothing.
    pub async fn aggregate(&self, query: &SearchQuery) -> SearchOutcome {
        let text = query.query.trim();
        if text.is_empty() {
            return SearchOutcome::default();
        }

        let active: Vec<&Arc<dyn PaperSource>> = self
            .sources
            .iter()
            .filter(|s| {
                query
                    .sources
                    .as_ref()
                    .map_or(true, |ids| ids.contains(&s.id()))
            })
            .collect();

        tracing::info!(
            "Searching {:?} (year={}) across {} sources",
            text,
            query.year,
            active.len()
        );

        let (free, backup): (Vec<_>, Vec<_>) =
            active.into_iter().partition(|s| s.tier() == Tier::Free);

        let mut sources_used: Vec<SourceId> = free.iter().map(|s| s.id()).collect();
        let handles: Vec<_> = free
            .iter()
            .map(|source| self.spawn_search(source, text, &query.year, FREE_TIER_LIMIT))
            .collect();

        let mut merged = Vec::new();
        for (id, joined) in sources_used.iter().zip(join_all(handles).await) {
            match joined {
                Ok(records) => merged.extend(records),
                Err(e) => tracing::warn!("{} search task panicked: {}", id, e),
            }
        }

        for source in backup {
            if merged.len() >= BACKUP_THRESHOLD {
                tracing::info!(
                    "Skipping {}: free tier returned {} results",
                    source.id(),
                    merged.len()
                );
                continue;
            }
            tracing::info!(
                "Free tier returned {} results, adding {}",
                merged.len(),
                source.id()
            );
            sources_used.push(source.id());
            match self
                .spawn_search(source, text, &query.year, BACKUP_TIER_LIMIT)
                .await
            {
                Ok(records) => merged.extend(records),
                Err(e) => tracing::warn!("{} search task panicked: {}", source.id(), e),
            }
        }

        let mut records = deduplicate(merged);
        rank(&mut records);
        SearchOutcome {
            records,
            sources_used,
        }
    }

    /// Run one source on its own task, rate limited and bounded by the
    /// per-source timeout. Failures are logged and become an empty list.
    fn spawn_search(
        &self,
        source: &Arc<dyn PaperSource>,
        query: &str,
        year: &YearFilter,
        limit: u32,
    ) -> tokio::task::JoinHandle<Vec<PaperRecord>> {
        let source = Arc::clone(source);
        let limiters = Arc::clone(&self.limiters);
        let timeout = self.timeout;
        let query = query.to_string();
        let year = year.clone();

        tokio::spawn(async move {
            let id = source.id();
            let call = async {
                limiters.acquire(id).await;
                source.search(&query, &year, limit).await
            };
            let result = match tokio::time::timeout(timeout, call).await {
                Ok(result) => result,
                Err(_) => Err(SourceError::Timeout(timeout)),
            };
            match result {
                Ok(records) => {
                    tracing::debug!("{} returned {} results", id, records.len());
                    records
                }
                Err(SourceError::RateLimited) => {
                    tracing::warn!("{} rate limited the request, treating as no results", id);
                    Vec::new()
                }
                Err(e) => {
                    tracing::warn!("{} search failed: {}", id, e);
                    Vec::new()
                }
            }
        })
    }
}

fn dedup_key(title: &str) -> String {
    title.to_lowercase().chars().take(DEDUP_PREFIX_CHARS).collect()
}

/// Keep the first record for each title prefix, dropping untitled records.
pub fn deduplicate(records: Vec<PaperRecord>) -> Vec<PaperRecord> {
    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter(|r| !r.title.trim().is_empty())
        .filter(|r| seen.insert(dedup_key(&r.title)))
        .collect()
}

/// Citation count descending. The sort is stable, so ties keep merge order.
pub fn rank(records: &mut [PaperRecord]) {
    records.sort_by(|a, b| b.citations.cmp(&a.citations));
}
