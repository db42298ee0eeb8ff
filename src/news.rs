//! Electric-motor headlines from the Google News RSS search feed.

use std::time::Duration;

use quick_xml::events::Event;
use quick_xml::Reader;
use serde::Serialize;
use thiserror::Error;

use crate::apis::{http_client, NO_URL, USER_AGENT};

const FEED_URL: &str = "https://news.google.com/rss/search?q=electric+motor+OR+EV+motor+OR+hybrid+electric&hl=en-US&gl=US&ceid=US:en";
const DEFAULT_SOURCE: &str = "Google News";
pub const MAX_ITEMS: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewsItem {
    pub title: String,
    pub url: String,
    pub source: String,
    pub published: String,
}

#[derive(Debug, Error)]
pub enum NewsError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Unexpected HTTP status {0}")]
    Status(u16),
    #[error("Feed parse error: {0}")]
    Parse(String),
}

pub struct NewsClient {
    client: reqwest::Client,
    feed_url: String,
}

impl NewsClient {
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: http_client(USER_AGENT, timeout),
            feed_url: FEED_URL.to_string(),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_feed_url(mut self, feed_url: &str) -> Self {
        self.feed_url = feed_url.to_string();
        self
    }

    /// Fetch and parse the first `limit` feed items.
    pub async fn latest(&self, limit: usize) -> Result<Vec<NewsItem>, NewsError> {
        let resp = self.client.get(&self.feed_url).send().await?;
        if !resp.status().is_success() {
            return Err(NewsError::Status(resp.status().as_u16()));
        }
        let body = resp.text().await?;
        let mut items = parse_rss(&body)?;
        items.truncate(limit);
        Ok(items)
    }

    /// Live headlines, or the canned list when the feed is unavailable.
    pub async fn latest_or_fallback(&self) -> Vec<NewsItem> {
        match self.latest(MAX_ITEMS).await {
            Ok(items) => items,
            Err(e) => {
                tracing::warn!("News feed unavailable, serving fallback: {}", e);
                fallback_news()
            }
        }
    }
}

pub fn fallback_news() -> Vec<NewsItem> {
    [
        (
            "Electric Vehicle Market Growth Continues in 2024",
            "https://www.reuters.com/business/autos-transportation/electric-vehicles/",
            "Reuters",
            "2024-12-15",
        ),
        (
            "New Electric Motor Efficiency Standards Announced",
            "https://spectrum.ieee.org/electric-motors",
            "IEEE Spectrum",
            "2024-12-14",
        ),
        (
            "Hybrid Systems Show Promise for Commercial Vehicles",
            "https://www.autoweek.com/news/green-cars/",
            "Autoweek",
            "2024-12-13",
        ),
    ]
    .into_iter()
    .map(|(title, url, source, published)| NewsItem {
        title: title.to_string(),
        url: url.to_string(),
        source: source.to_string(),
        published: published.to_string(),
    })
    .collect()
}

#[derive(Default)]
struct RawItem {
    title: String,
    link: String,
    source: String,
    pub_date: String,
}

impl RawItem {
    fn into_news(self) -> NewsItem {
        // Google News appends " - Publisher" to every headline
        let title = self.title.split(" - ").next().unwrap_or("").trim().to_string();
        let source = self.source.trim();
        let link = self.link.trim();
        NewsItem {
            title,
            url: if link.is_empty() { NO_URL.to_string() } else { link.to_string() },
            source: if source.is_empty() { DEFAULT_SOURCE.to_string() } else { source.to_string() },
            published: self.pub_date.trim().to_string(),
        }
    }
}

fn parse_rss(xml: &str) -> Result<Vec<NewsItem>, NewsError> {
    let mut reader = Reader::from_str(xml);
    let mut items = Vec::new();
    let mut current: Option<RawItem> = None;
    let mut current_tag = String::new();
    let mut buf = Vec::new();

    loop {
        let text = match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let tag = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                if tag == "item" {
                    current = Some(RawItem::default());
                } else {
                    current_tag = tag;
                }
                None
            }
            Ok(Event::Text(e)) => Some(
                e.unescape()
                    .map_err(|e| NewsError::Parse(e.to_string()))?
                    .into_owned(),
            ),
            Ok(Event::CData(e)) => Some(String::from_utf8_lossy(&e).into_owned()),
            Ok(Event::End(e)) => {
                if e.local_name().as_ref() == b"item" {
                    if let Some(item) = current.take() {
                        items.push(item.into_news());
                    }
                }
                current_tag.clear();
                None
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(NewsError::Parse(e.to_string())),
            _ => None,
        };

        if let (Some(text), Some(item)) = (text, current.as_mut()) {
            match current_tag.as_str() {
                "title" => item.title.push_str(&text),
                "link" => item.link.push_str(&text),
                "source" => item.source.push_str(&text),
                "pubDate" => item.pub_date.push_str(&text),
                _ => {}
            }
        }
        buf.clear();
    }
    Ok(items)
}
