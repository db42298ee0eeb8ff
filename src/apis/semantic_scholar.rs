use std::time::Duration;

use super::{
    abstract_or_sentinel, check_status, domain_query, http_client, join_authors,
    url_or_placeholder, PaperRecord, PaperSource, SourceError, SourceId, YearFilter, USER_AGENT,
};
use async_trait::async_trait;
use serde::Deserialize;

const BASE_URL: &str = "https://api.semanticscholar.org/graph/v1";
const FIELDS: &str = "title,authors,year,abstract,citationCount,url,venue,publicationTypes";

pub struct SemanticScholarClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    keyword: String,
}

impl SemanticScholarClient {
    pub fn new(api_key: Option<String>, keyword: &str, timeout: Duration) -> Self {
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

    fn add_auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => req.header("x-api-key", key),
            None => req,
        }
    }
}

#[derive(Deserialize)]
struct S2SearchResponse {
    data: Option<Vec<S2Paper>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct S2Paper {
    title: Option<String>,
    authors: Option<Vec<S2Author>>,
    #[serde(rename = "abstract")]
    abstract_text: Option<String>,
    year: Option<u32>,
    citation_count: Option<u64>,
    url: Option<String>,
    venue: Option<String>,
    publication_types: Option<Vec<String>>,
}

#[derive(Deserialize)]
struct S2Author {
    name: Option<String>,
}

fn s2_to_record(p: &S2Paper) -> Option<PaperRecord> {
    let title = p.title.as_deref().map(str::trim).unwrap_or_default();
    if title.is_empty() {
        return None;
    }
    let is_conference = p
        .publication_types
        .as_ref()
        .is_some_and(|types| types.iter().any(|t| t == "Conference"));
    Some(PaperRecord {
        title: title.to_string(),
        authors: join_authors(
            p.authors
                .iter()
                .flatten()
                .filter_map(|a| a.name.as_deref()),
        ),
        year: p.year.map(|y| y.to_string()).unwrap_or_default(),
        journal: p.venue.clone().unwrap_or_default(),
        abstract_text: abstract_or_sentinel(p.abstract_text.as_deref()),
        citations: p.citation_count.unwrap_or(0),
        url: url_or_placeholder(p.url.as_deref()),
        source: SourceId::SemanticScholar,
        kind: if is_conference { "Conference Paper" } else { "Journal Article" }.to_string(),
    })
}

#[async_trait]
impl PaperSource for SemanticScholarClient {
    fn id(&self) -> SourceId {
        SourceId::SemanticScholar
    }

    async fn search(
        &self,
        query: &str,
        year: &YearFilter,
        limit: u32,
    ) -> Result<Vec<PaperRecord>, SourceError> {
        let url = format!("{}/paper/search", self.base_url);
        let mut params = vec![
            ("query", domain_query(query, &self.keyword)),
            ("limit", limit.min(100).to_string()),
            ("fields", FIELDS.to_string()),
        ];
        if let Some(y) = year.year() {
            params.push(("year", format!("{y}-{y}")));
        }
        let resp = self.add_auth(self.client.get(&url).query(&params)).send().await?;
        let resp: S2SearchResponse = check_status(resp)?.json().await?;
        Ok(resp.data.unwrap_or_default().iter().filter_map(s2_to_record).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer, key: Option<&str>) -> SemanticScholarClient {
        SemanticScholarClient::new(key.map(String::from), "electric motor", Duration::from_secs(5))
            .with_base_url(&server.uri())
    }

    #[tokio::test]
    async fn search_maps_fields_and_sentinels() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/paper/search"))
            .and(query_param("query", "torque ripple electric motor"))
            .and(query_param("year", "2020-2020"))
            .and(header("x-api-key", "s2-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "total": 2,
                "data": [
                    {
                        "paperId": "a",
                        "title": "Torque Ripple Reduction",
                        "authors": [{"name": "Ada Lovelace"}, {"name": "Nikola Tesla"}],
                        "year": 2020,
                        "abstract": null,
                        "citationCount": 12,
                        "url": "https://s2.example/a",
                        "venue": "IEEE TIE",
                        "publicationTypes": ["Conference"]
                    },
                    {
                        "paperId": "b",
                        "title": "Bare Paper",
                        "authors": [],
                        "year": null,
                        "publicationTypes": null
                    }
                ]
            })))
            .mount(&server)
            .await;

        let records = client(&server, Some("s2-key"))
            .search("torque ripple", &YearFilter::parse("2020"), 3)
            .await
            .unwrap();

        assert_eq!(records.len(), 2);
        let first = &records[0];
        assert_eq!(first.authors, "Ada Lovelace, Nikola Tesla");
        assert_eq!(first.year, "2020");
        assert_eq!(first.journal, "IEEE TIE");
        assert_eq!(first.abstract_text, "No abstract available");
        assert_eq!(first.citations, 12);
        assert_eq!(first.kind, "Conference Paper");

        let second = &records[1];
        assert_eq!(second.authors, "Unknown");
        assert_eq!(second.year, "");
        assert_eq!(second.url, "#");
        assert_eq!(second.citations, 0);
        assert_eq!(second.kind, "Journal Article");
    }

    #[tokio::test]
    async fn search_non_success_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/paper/search"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let result = client(&server, None).search("x", &YearFilter::All, 3).await;
        assert!(matches!(result, Err(SourceError::Status(503))));
    }

    #[tokio::test]
    async fn search_429_is_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let result = client(&server, None).search("x", &YearFilter::All, 3).await;
        assert!(matches!(result, Err(SourceError::RateLimited)));
    }
}
