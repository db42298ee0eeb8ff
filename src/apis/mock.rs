//! Mock paper source for aggregator and route tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use super::{PaperRecord, PaperSource, SourceError, SourceId, YearFilter};

/// What a [`MockSource`] does when searched.
#[derive(Clone, Debug)]
pub enum MockResponse {
    Records(Vec<PaperRecord>),
    Error(String),
    /// Sleep longer than any sensible timeout.
    Hang,
}

/// A hand-rolled [`PaperSource`] with call counting and optional latency.
pub struct MockSource {
    id: SourceId,
    response: MockResponse,
    delay: Option<Duration>,
    call_count: AtomicUsize,
}

impl MockSource {
    pub fn new(id: SourceId, response: MockResponse) -> Self {
        Self {
            id,
            response,
            delay: None,
            call_count: AtomicUsize::new(0),
        }
    }

    pub fn with_records(id: SourceId, records: Vec<PaperRecord>) -> Self {
        Self::new(id, MockResponse::Records(records))
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaperSource for MockSource {
    fn id(&self) -> SourceId {
        self.id
    }

    async fn search(
        &self,
        _query: &str,
        year: &YearFilter,
        limit: u32,
    ) -> Result<Vec<PaperRecord>, SourceError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &self.response {
            MockResponse::Records(records) => Ok(records
                .iter()
                .filter(|r| year.matches(&r.year))
                .take(limit as usize)
                .cloned()
                .collect()),
            MockResponse::Error(msg) => Err(SourceError::Api(msg.clone())),
            MockResponse::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(Vec::new())
            }
        }
    }
}

/// Build a record with the given title, citation count and year.
pub fn record(source: SourceId, title: &str, citations: u64, year: &str) -> PaperRecord {
    PaperRecord {
        title: title.to_string(),
        authors: "Test Author".to_string(),
        year: year.to_string(),
        journal: "Test Journal".to_string(),
        abstract_text: super::NO_ABSTRACT.to_string(),
        citations,
        url: "#".to_string(),
        source,
        kind: "Journal Article".to_string(),
    }
}
