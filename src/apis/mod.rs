pub mod arxiv;
pub mod core_ac;
pub mod crossref;
pub mod google_scholar;
pub mod semantic_scholar;

#[cfg(test)]
pub mod mock;

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

pub const NO_ABSTRACT: &str = "No abstract available";
pub const UNKNOWN_AUTHORS: &str = "Unknown";
pub const MAX_ABSTRACT_CHARS: usize = 500;
pub const NO_URL: &str = "#";

/// One search hit, normalized from whatever shape the upstream returned.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaperRecord {
    pub title: String,
    pub authors: String,
    pub year: String,
    pub journal: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub citations: u64,
    pub url: String,
    pub source: SourceId,
    #[serde(rename = "type")]
    pub kind: String,
}

/// Upstreams the aggregator knows how to query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SourceId {
    #[serde(rename = "Semantic Scholar")]
    SemanticScholar,
    #[serde(rename = "arXiv")]
    Arxiv,
    #[serde(rename = "CORE")]
    Core,
    #[serde(rename = "CrossRef")]
    CrossRef,
    #[serde(rename = "Google Scholar")]
    GoogleScholar,
}

impl SourceId {
    pub const ALL: [SourceId; 5] = [
        SourceId::SemanticScholar,
        SourceId::Arxiv,
        SourceId::Core,
        SourceId::CrossRef,
        SourceId::GoogleScholar,
    ];

    /// Identifier used in the `sources` query parameter.
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceId::SemanticScholar => "semantic_scholar",
            SourceId::Arxiv => "arxiv",
            SourceId::Core => "core",
            SourceId::CrossRef => "crossref",
            SourceId::GoogleScholar => "google_scholar",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            SourceId::SemanticScholar => "Semantic Scholar",
            SourceId::Arxiv => "arXiv",
            SourceId::Core => "CORE",
            SourceId::CrossRef => "CrossRef",
            SourceId::GoogleScholar => "Google Scholar",
        }
    }

    pub fn tier(&self) -> Tier {
        match self {
            SourceId::GoogleScholar => Tier::Backup,
            _ => Tier::Free,
        }
    }

    /// Parse a comma-separated source list. `None` means "all sources";
    /// unknown ids are skipped.
    pub fn parse_list(raw: &str) -> Option<Vec<SourceId>> {
        let raw = raw.trim();
        if raw.is_empty() || raw.eq_ignore_ascii_case("all") {
            return None;
        }
        let mut ids = Vec::new();
        for part in raw.split(',') {
            match part.parse::<SourceId>() {
                Ok(id) if !ids.contains(&id) => ids.push(id),
                Ok(_) => {}
                Err(_) => tracing::debug!("Ignoring unknown source id {:?}", part.trim()),
            }
        }
        Some(ids)
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for SourceId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        SourceId::ALL
            .into_iter()
            .find(|id| id.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown source: {s}"))
    }
}

/// Cost class of a source. Backup sources are metered and only queried
/// when the free ones come back short.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Free,
    Backup,
}

/// Publication year restriction. Only exact years are supported, never ranges.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum YearFilter {
    #[default]
    All,
    Exact(String),
}

impl YearFilter {
    /// Anything other than exactly four ASCII digits means no filter.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.len() == 4 && raw.bytes().all(|b| b.is_ascii_digit()) {
            YearFilter::Exact(raw.to_string())
        } else {
            YearFilter::All
        }
    }

    pub fn year(&self) -> Option<&str> {
        match self {
            YearFilter::All => None,
            YearFilter::Exact(y) => Some(y),
        }
    }

    pub fn matches(&self, year: &str) -> bool {
        match self {
            YearFilter::All => true,
            YearFilter::Exact(y) => y == year,
        }
    }
}

impl fmt::Display for YearFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            YearFilter::All => f.write_str("all"),
            YearFilter::Exact(y) => f.write_str(y),
        }
    }
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Unexpected HTTP status {0}")]
    Status(u16),
    #[error("Rate limited (429)")]
    RateLimited,
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("API error: {0}")]
    Api(String),
    #[error("Timed out after {0:?}")]
    Timeout(Duration),
}

#[async_trait]
pub trait PaperSource: Send + Sync {
    fn id(&self) -> SourceId;

    fn tier(&self) -> Tier {
        self.id().tier()
    }

    /// Query the upstream. Errors are reported here and collapsed to an
    /// empty result by the aggregator.
    async fn search(
        &self,
        query: &str,
        year: &YearFilter,
        limit: u32,
    ) -> Result<Vec<PaperRecord>, SourceError>;
}

/// Build an HTTP client with the per-upstream timeout applied.
pub(crate) fn http_client(user_agent: &str, timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .build()
        .unwrap_or_else(|e| {
            tracing::warn!("Falling back to default HTTP client: {}", e);
            reqwest::Client::new()
        })
}

pub(crate) const USER_AGENT: &str = concat!("motor-search/", env!("CARGO_PKG_VERSION"));

/// Map 429 and other non-2xx responses to errors.
pub(crate) fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, SourceError> {
    let status = resp.status();
    if status.as_u16() == 429 {
        return Err(SourceError::RateLimited);
    }
    if !status.is_success() {
        return Err(SourceError::Status(status.as_u16()));
    }
    Ok(resp)
}

/// Combine the user's query with the domain keyword.
pub(crate) fn domain_query(query: &str, keyword: &str) -> String {
    let query = query.trim();
    let keyword = keyword.trim();
    if keyword.is_empty() {
        query.to_string()
    } else {
        format!("{} {}", query, keyword)
    }
}

pub(crate) fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

/// Collapse runs of whitespace (including newlines) into single spaces.
pub(crate) fn collapse_ws(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub(crate) fn abstract_or_sentinel(text: Option<&str>) -> String {
    match text.map(str::trim) {
        Some(t) if !t.is_empty() => truncate_chars(t, MAX_ABSTRACT_CHARS),
        _ => NO_ABSTRACT.to_string(),
    }
}

pub(crate) fn join_authors<I, S>(names: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let joined = names
        .into_iter()
        .map(|n| n.as_ref().trim().to_string())
        .filter(|n| !n.is_empty())
        .collect::<Vec<_>>()
        .join(", ");
    if joined.is_empty() {
        UNKNOWN_AUTHORS.to_string()
    } else {
        joined
    }
}

pub(crate) fn url_or_placeholder(url: Option<&str>) -> String {
    match url.map(str::trim) {
        Some(u) if !u.is_empty() => u.to_string(),
        _ => NO_URL.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_year_filter_parse() {
        assert_eq!(YearFilter::parse("all"), YearFilter::All);
        assert_eq!(YearFilter::parse(""), YearFilter::All);
        assert_eq!(YearFilter::parse("20x0"), YearFilter::All);
        assert_eq!(YearFilter::parse("20201"), YearFilter::All);
        assert_eq!(YearFilter::parse(" 2020 "), YearFilter::Exact("2020".into()));
    }

    #[test]
    fn test_year_filter_exact_match_only() {
        let filter = YearFilter::parse("2020");
        assert!(filter.matches("2020"));
        assert!(!filter.matches("2019"));
        assert!(!filter.matches(""));
        assert!(YearFilter::All.matches("2019"));
        assert!(YearFilter::All.matches(""));
    }

    #[test]
    fn test_parse_source_list() {
        assert_eq!(SourceId::parse_list("all"), None);
        assert_eq!(SourceId::parse_list(""), None);
        assert_eq!(
            SourceId::parse_list("arxiv, CrossRef,bogus,arxiv"),
            Some(vec![SourceId::Arxiv, SourceId::CrossRef])
        );
        assert_eq!(SourceId::parse_list("nope"), Some(vec![]));
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        let text = "é".repeat(600);
        let cut = truncate_chars(&text, MAX_ABSTRACT_CHARS);
        assert_eq!(cut.chars().count(), 500);
        assert_eq!(truncate_chars("short", 500), "short");
    }

    #[test]
    fn test_sentinels() {
        assert_eq!(abstract_or_sentinel(None), NO_ABSTRACT);
        assert_eq!(abstract_or_sentinel(Some("   ")), NO_ABSTRACT);
        assert_eq!(join_authors(Vec::<String>::new()), UNKNOWN_AUTHORS);
        assert_eq!(join_authors(["Ada", "", " Grace "]), "Ada, Grace");
        assert_eq!(url_or_placeholder(None), "#");
        assert_eq!(url_or_placeholder(Some("")), "#");
    }

    #[test]
    fn test_record_serializes_with_public_field_names() {
        let record = PaperRecord {
            title: "T".into(),
            authors: "A".into(),
            year: "2020".into(),
            journal: "J".into(),
            abstract_text: NO_ABSTRACT.into(),
            citations: 3,
            url: "#".into(),
            source: SourceId::CrossRef,
            kind: "Journal Article".into(),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["abstract"], NO_ABSTRACT);
        assert_eq!(json["type"], "Journal Article");
        assert_eq!(json["source"], "CrossRef");
        assert_eq!(json["citations"], 3);
    }
}
