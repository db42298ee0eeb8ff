//! CORE (core.ac.uk) open-access aggregator, v3 works search.

use std::time::Duration;

use super::{
    abstract_or_sentinel, check_status, domain_query, http_client, join_authors,
    url_or_placeholder, PaperRecord, PaperSource, SourceError, SourceId, YearFilter, USER_AGENT,
};
use async_trait::async_trait;
use serde::Deserialize;

const BASE_URL: &str = "https://api.core.ac.uk";

pub struct CoreClient {
    client: reqwest::Client,
    base_url: String,
    keyword: String,
}

impl CoreClient {
    pub fn new(keyword: &str, timeout: Duration) -> Self {
        Self {
            client: http_client(USER_AGENT, timeout),
            base_url: BASE_URL.to_string(),
            keyword: keyword.to_string(),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }
}

#[derive(Deserialize)]
struct CoreResponse {
    results: Option<Vec<CoreWork>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CoreWork {
    title: Option<String>,
    authors: Option<Vec<CoreAuthor>>,
    year_published: Option<u32>,
    publisher: Option<String>,
    #[serde(rename = "abstract")]
    abstract_text: Option<String>,
    citation_count: Option<u64>,
    download_url: Option<String>,
    source_fulltext_urls: Option<Vec<String>>,
}

#[derive(Deserialize)]
struct CoreAuthor {
    name: Option<String>,
}

fn work_to_record(w: &CoreWork) -> Option<PaperRecord> {
    let title = w.title.as_deref().map(str::trim).unwrap_or_default();
    if title.is_empty() {
        return None;
    }
    let url = w
        .download_url
        .as_deref()
        .filter(|u| !u.trim().is_empty())
        .or_else(|| {
            w.source_fulltext_urls
                .as_ref()
                .and_then(|urls| urls.first())
                .map(String::as_str)
        });
    Some(PaperRecord {
        title: title.to_string(),
        authors: join_authors(w.authors.iter().flatten().filter_map(|a| a.name.as_deref())),
        year: w.year_published.map(|y| y.to_string()).unwrap_or_default(),
        journal: w.publisher.clone().unwrap_or_default(),
        abstract_text: abstract_or_sentinel(w.abstract_text.as_deref()),
        citations: w.citation_count.unwrap_or(0),
        url: url_or_placeholder(url),
        source: SourceId::Core,
        kind: "Open Access".to_string(),
    })
}

#[async_trait]
impl PaperSource for CoreClient {
    fn id(&self) -> SourceId {
        SourceId::Core
    }

    async fn search(
        &self,
        query: &str,
        year: &YearFilter,
        limit: u32,
    ) -> Result<Vec<PaperRecord>, SourceError> {
        let url = format!("{}/v3/search/works", self.base_url);
        let q = domain_query(query, &self.keyword);
        let limit = limit.to_string();
        let resp = self
            .client
            .get(&url)
            .query(&[("q", q.as_str()), ("limit", limit.as_str())])
            .send()
            .await?;
        let resp: CoreResponse = check_status(resp)?.json().await?;
        Ok(resp
            .results
            .unwrap_or_default()
            .iter()
            .filter_map(work_to_record)
            .filter(|r| year.matches(&r.year))
            .collect())
    }
}
