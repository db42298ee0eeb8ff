use std::time::Duration;

use super::{
    abstract_or_sentinel, check_status, collapse_ws, domain_query, http_client, join_authors,
    url_or_placeholder, PaperRecord, PaperSource, SourceError, SourceId, YearFilter, USER_AGENT,
};
use async_trait::async_trait;
use scraper::Html;
use serde::Deserialize;

const BASE_URL: &str = "https://api.crossref.org";
const MAX_AUTHORS: usize = 3;

pub struct CrossRefClient {
    client: reqwest::Client,
    base_url: String,
    keyword: String,
}

impl CrossRefClient {
    pub fn new(keyword: &str, timeout: Duration) -> Self {
        Self {
            client: http_client(
                &format!("{} (mailto:research@example.com)", USER_AGENT),
                timeout,
            ),
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
struct CRResponse {
    message: CRMessage,
}
#[derive(Deserialize)]
struct CRMessage {
    items: Option<Vec<CRItem>>,
}
#[derive(Deserialize)]
struct CRItem {
    title: Option<Vec<String>>,
    author: Option<Vec<CRAuthor>>,
    published: Option<CRDate>,
    issued: Option<CRDate>,
    #[serde(rename = "container-title")]
    container_title: Option<Vec<String>>,
    #[serde(rename = "abstract")]
    abstract_text: Option<String>,
    #[serde(rename = "is-referenced-by-count")]
    citation_count: Option<u64>,
    #[serde(rename = "URL")]
    url: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
}
#[derive(Deserialize)]
struct CRAuthor {
    given: Option<String>,
    family: Option<String>,
}
#[derive(Deserialize)]
struct CRDate {
    #[serde(rename = "date-parts")]
    date_parts: Option<Vec<Vec<Option<i32>>>>,
}

impl CRDate {
    fn year(&self) -> Option<i32> {
        self.date_parts.as_ref()?.first()?.first().copied().flatten()
    }
}

/// CrossRef abstracts are JATS XML fragments; keep only the text.
fn strip_jats(markup: &str) -> String {
    let fragment = Html::parse_fragment(markup);
    collapse_ws(&fragment.root_element().text().collect::<String>())
}

/// `journal-article` -> `Journal Article`
fn title_case_type(kind: &str) -> String {
    kind.replace('-', " ")
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

fn item_to_record(item: &CRItem) -> Option<PaperRecord> {
    let title = item
        .title
        .as_ref()
        .and_then(|t| t.first())
        .map(|t| collapse_ws(t))
        .unwrap_or_default();
    if title.is_empty() {
        return None;
    }
    let authors = join_authors(item.author.iter().flatten().take(MAX_AUTHORS).map(|a| {
        format!(
            "{} {}",
            a.given.as_deref().unwrap_or(""),
            a.family.as_deref().unwrap_or("")
        )
    }));
    let year = item
        .published
        .as_ref()
        .and_then(CRDate::year)
        .or_else(|| item.issued.as_ref().and_then(CRDate::year))
        .map(|y| y.to_string())
        .unwrap_or_default();
    let abstract_text = item.abstract_text.as_deref().map(strip_jats);
    Some(PaperRecord {
        title,
        authors,
        year,
        journal: item
            .container_title
            .as_ref()
            .and_then(|c| c.first())
            .cloned()
            .unwrap_or_default(),
        abstract_text: abstract_or_sentinel(abstract_text.as_deref()),
        citations: item.citation_count.unwrap_or(0),
        url: url_or_placeholder(item.url.as_deref()),
        source: SourceId::CrossRef,
        kind: title_case_type(item.kind.as_deref().unwrap_or("journal-article")),
    })
}

#[async_trait]
impl PaperSource for CrossRefClient {
    fn id(&self) -> SourceId {
        SourceId::CrossRef
    }

    async fn search(
        &self,
        query: &str,
        year: &YearFilter,
        limit: u32,
    ) -> Result<Vec<PaperRecord>, SourceError> {
        let url = format!("{}/works", self.base_url);
        let mut params = vec![
            ("query", domain_query(query, &self.keyword)),
            ("rows", limit.min(100).to_string()),
            ("sort", "relevance".to_string()),
        ];
        if let Some(y) = year.year() {
            params.push(("filter", format!("from-pub-date:{y},until-pub-date:{y}")));
        }
        let resp = self.client.get(&url).query(&params).send().await?;
        let resp: CRResponse = check_status(resp)?.json().await?;
        Ok(resp
            .message
            .items
            .unwrap_or_default()
            .iter()
            .filter_map(item_to_record)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_title_case_type() {
        assert_eq!(title_case_type("journal-article"), "Journal Article");
        assert_eq!(title_case_type("proceedings-article"), "Proceedings Article");
        assert_eq!(title_case_type("BOOK-chapter"), "Book Chapter");
    }

    #[test]
    fn test_strip_jats() {
        let markup = "<jats:title>Abstract</jats:title>\n<jats:p>Motors  are\n <jats:italic>efficient</jats:italic>.</jats:p>";
        assert_eq!(strip_jats(markup), "Abstract Motors are efficient.");
    }

    #[tokio::test]
    async fn search_maps_items_and_passes_year_filter() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/works"))
            .and(query_param("query", "cooling electric motor"))
            .and(query_param("rows", "3"))
            .and(query_param("filter", "from-pub-date:2022,until-pub-date:2022"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "ok",
                "message": {
                    "items": [
                        {
                            "title": ["Liquid Cooling of Traction Motors"],
                            "author": [
                                {"given": "A", "family": "One"},
                                {"given": "B", "family": "Two"},
                                {"given": "C", "family": "Three"},
                                {"given": "D", "family": "Four"}
                            ],
                            "published": {"date-parts": [[2022, 3]]},
                            "container-title": ["Energies"],
                            "abstract": "<jats:p>Heat removal.</jats:p>",
                            "is-referenced-by-count": 42,
                            "URL": "https://doi.org/10.1/x",
                            "type": "journal-article"
                        },
                        {
                            "title": ["Untyped"],
                            "issued": {"date-parts": [[null]]}
                        },
                        {
                            "title": []
                        }
                    ]
                }
            })))
            .mount(&server)
            .await;

        let client = CrossRefClient::new("electric motor", Duration::from_secs(5))
            .with_base_url(&server.uri());
        let records = client
            .search("cooling", &YearFilter::parse("2022"), 3)
            .await
            .unwrap();

        assert_eq!(records.len(), 2);
        let r = &records[0];
        assert_eq!(r.authors, "A One, B Two, C Three");
        assert_eq!(r.year, "2022");
        assert_eq!(r.journal, "Energies");
        assert_eq!(r.abstract_text, "Heat removal.");
        assert_eq!(r.citations, 42);
        assert_eq!(r.kind, "Journal Article");

        let bare = &records[1];
        assert_eq!(bare.year, "");
        assert_eq!(bare.authors, "Unknown");
        assert_eq!(bare.abstract_text, "No abstract available");
        assert_eq!(bare.url, "#");
        assert_eq!(bare.kind, "Journal Article");
    }
}
