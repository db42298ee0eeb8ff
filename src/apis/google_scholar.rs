//! Google Scholar through the SerpAPI proxy.
//!
//! SerpAPI is metered, so this source is registered as the backup tier and
//! only built when a key is configured. Scholar's `publication_info.summary`
//! is the familiar composite line `authors - venue, year - host`; the venue
//! and year are recovered from it with the same split/regex rules used for
//! the scraped result pages.

use std::time::Duration;

use super::{
    abstract_or_sentinel, check_status, domain_query, http_client, join_authors,
    url_or_placeholder, PaperRecord, PaperSource, SourceError, SourceId, YearFilter, USER_AGENT,
    UNKNOWN_AUTHORS,
};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

const BASE_URL: &str = "https://serpapi.com";

static YEAR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(?:19|20)\d{2}\b").unwrap());

pub struct GoogleScholarClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    keyword: String,
}

impl GoogleScholarClient {
    pub fn new(api_key: String, keyword: &str, timeout: Duration) -> Self {
        Self {
            client: http_client(USER_AGENT, timeout),
            base_url: BASE_URL.to_string(),
            api_key,
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
struct SerpResponse {
    error: Option<String>,
    organic_results: Option<Vec<SerpItem>>,
}

#[derive(Deserialize)]
struct SerpItem {
    title: Option<String>,
    link: Option<String>,
    snippet: Option<String>,
    publication_info: Option<PubInfo>,
    inline_links: Option<InlineLinks>,
}

#[derive(Deserialize)]
struct PubInfo {
    summary: Option<String>,
    authors: Option<Vec<ScholarAuthor>>,
}

#[derive(Deserialize)]
struct ScholarAuthor {
    name: Option<String>,
}

#[derive(Deserialize)]
struct InlineLinks {
    cited_by: Option<CitedBy>,
}

#[derive(Deserialize)]
struct CitedBy {
    total: Option<u64>,
}

/// Pieces recovered from an `authors - venue, year - host` line.
#[derive(Debug, PartialEq)]
struct Summary {
    authors: String,
    venue: String,
    year: String,
}

fn last_year(text: &str) -> String {
    YEAR_RE
        .find_iter(text)
        .last()
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

fn parse_summary(summary: &str) -> Summary {
    let parts: Vec<&str> = summary.split(" - ").map(str::trim).collect();
    if parts.len() < 2 {
        return Summary {
            authors: String::new(),
            venue: summary.trim().to_string(),
            year: last_year(summary),
        };
    }

    let authors = parts[0].trim_end_matches('…').trim().to_string();
    let right = parts[1];
    let year = last_year(right);
    let venue = match right.strip_suffix(year.as_str()) {
        Some(stripped) if !year.is_empty() => stripped.trim_end_matches([',', ' ']),
        _ => right,
    };
    let venue = venue.trim_start_matches('…').trim().to_string();
    Summary {
        authors,
        venue,
        year,
    }
}

fn item_to_record(item: &SerpItem) -> Option<PaperRecord> {
    let title = item.title.as_deref().map(str::trim).unwrap_or_default();
    if title.is_empty() {
        return None;
    }
    let raw_summary = item
        .publication_info
        .as_ref()
        .and_then(|p| p.summary.as_deref())
        .unwrap_or("");
    let summary = parse_summary(raw_summary);

    let structured = join_authors(
        item.publication_info
            .iter()
            .flat_map(|p| p.authors.iter().flatten())
            .filter_map(|a| a.name.as_deref()),
    );
    let authors = if structured == UNKNOWN_AUTHORS {
        join_authors([summary.authors.as_str()])
    } else {
        structured
    };
    let journal = if summary.venue.is_empty() {
        raw_summary.trim().to_string()
    } else {
        summary.venue
    };

    Some(PaperRecord {
        title: title.to_string(),
        authors,
        year: summary.year,
        journal,
        abstract_text: abstract_or_sentinel(item.snippet.as_deref()),
        citations: item
            .inline_links
            .as_ref()
            .and_then(|l| l.cited_by.as_ref())
            .and_then(|c| c.total)
            .unwrap_or(0),
        url: url_or_placeholder(item.link.as_deref()),
        source: SourceId::GoogleScholar,
        kind: "Journal Article".to_string(),
    })
}

#[async_trait]
impl PaperSource for GoogleScholarClient {
    fn id(&self) -> SourceId {
        SourceId::GoogleScholar
    }

    async fn search(
        &self,
        query: &str,
        year: &YearFilter,
        limit: u32,
    ) -> Result<Vec<PaperRecord>, SourceError> {
        let url = format!("{}/search.json", self.base_url);
        let mut params = vec![
            ("engine", "google_scholar".to_string()),
            ("q", domain_query(query, &self.keyword)),
            ("api_key", self.api_key.clone()),
            ("num", limit.min(20).to_string()),
        ];
        if let Some(y) = year.year() {
            params.push(("as_ylo", y.to_string()));
            params.push(("as_yhi", y.to_string()));
        }
        let resp = self.client.get(&url).query(&params).send().await?;
        let resp: SerpResponse = check_status(resp)?.json().await?;
        if let Some(err) = resp.error {
            return Err(SourceError::Api(err));
        }
        Ok(resp
            .organic_results
            .unwrap_or_default()
            .iter()
            .filter_map(item_to_record)
            .collect())
    }
}
