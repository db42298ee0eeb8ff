use std::time::Duration;

use super::{
    abstract_or_sentinel, check_status, collapse_ws, http_client, join_authors,
    url_or_placeholder, PaperRecord, PaperSource, SourceError, SourceId, YearFilter, USER_AGENT,
};
use async_trait::async_trait;
use quick_xml::events::Event;
use quick_xml::Reader;

const BASE_URL: &str = "https://export.arxiv.org";

pub struct ArxivClient {
    client: reqwest::Client,
    base_url: String,
    keyword: String,
}

impl ArxivClient {
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

/// `all:<query> AND all:<word>` for every word of the domain keyword.
fn build_search_query(query: &str, keyword: &str) -> String {
    let mut terms = vec![format!("all:{}", query.trim())];
    terms.extend(keyword.split_whitespace().map(|w| format!("all:{w}")));
    terms.join(" AND ")
}

#[async_trait]
impl PaperSource for ArxivClient {
    fn id(&self) -> SourceId {
        SourceId::Arxiv
    }

    async fn search(
        &self,
        query: &str,
        year: &YearFilter,
        limit: u32,
    ) -> Result<Vec<PaperRecord>, SourceError> {
        let url = format!("{}/api/query", self.base_url);
        let max_results = limit.to_string();
        let search_query = build_search_query(query, &self.keyword);
        let resp = self
            .client
            .get(&url)
            .query(&[
                ("search_query", search_query.as_str()),
                ("start", "0"),
                ("max_results", max_results.as_str()),
                ("sortBy", "relevance"),
                ("sortOrder", "descending"),
            ])
            .send()
            .await?;
        let body = check_status(resp)?.text().await?;
        let entries = parse_atom_feed(&body)?;
        Ok(entries
            .into_iter()
            .filter_map(entry_to_record)
            .filter(|r| year.matches(&r.year))
            .collect())
    }
}

#[derive(Debug, Default)]
struct AtomEntry {
    id: String,
    title: String,
    summary: String,
    published: String,
    authors: Vec<String>,
}

fn entry_to_record(entry: AtomEntry) -> Option<PaperRecord> {
    let title = collapse_ws(&entry.title);
    if title.is_empty() {
        return None;
    }
    let id = entry.id.trim();
    let short_id = id.rsplit('/').next().unwrap_or(id);
    let summary = collapse_ws(&entry.summary);
    Some(PaperRecord {
        title,
        authors: join_authors(&entry.authors),
        year: entry.published.trim().chars().take(4).collect(),
        journal: format!("arXiv:{}", short_id),
        abstract_text: abstract_or_sentinel(Some(&summary)),
        citations: 0,
        url: url_or_placeholder(Some(id)),
        source: SourceId::Arxiv,
        kind: "Preprint".to_string(),
    })
}

fn parse_atom_feed(xml: &str) -> Result<Vec<AtomEntry>, SourceError> {
    let mut reader = Reader::from_str(xml);
    let mut entries = Vec::new();
    let mut current: Option<AtomEntry> = None;
    let mut current_tag = String::new();
    let mut author_name = String::new();
    let mut in_author = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let tag = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                if tag == "entry" {
                    current = Some(AtomEntry::default());
                } else if current.is_some() {
                    if tag == "author" {
                        in_author = true;
                        author_name.clear();
                    }
                    current_tag = tag;
                }
            }
            Ok(Event::Text(e)) => {
                if let Some(entry) = current.as_mut() {
                    let text = e
                        .unescape()
                        .map_err(|e| SourceError::Parse(format!("XML text error: {}", e)))?;
                    match current_tag.as_str() {
                        "title" => entry.title.push_str(&text),
                        "summary" => entry.summary.push_str(&text),
                        "id" if !in_author => entry.id.push_str(&text),
                        "published" => entry.published.push_str(&text),
                        "name" if in_author => author_name.push_str(&text),
                        _ => {}
                    }
                }
            }
            Ok(Event::End(e)) => {
                let tag = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                match tag.as_str() {
                    "entry" => {
                        if let Some(entry) = current.take() {
                            entries.push(entry);
                        }
                    }
                    "author" if in_author => {
                        in_author = false;
                        if let Some(entry) = current.as_mut() {
                            let name = author_name.trim();
                            if !name.is_empty() {
                                entry.authors.push(name.to_string());
                            }
                        }
                    }
                    _ => {}
                }
                current_tag.clear();
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(SourceError::Parse(format!("XML parse error: {}", e))),
            _ => {}
        }
        buf.clear();
    }
    Ok(entries)
}
