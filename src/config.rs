use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::apis::{self, PaperSource, SourceId, Tier};

const DEFAULT_DOMAIN_KEYWORD: &str = "electric motor";
const DEFAULT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_PORT: u16 = 5000;

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub serpapi_key: Option<String>,
    pub semantic_scholar_key: Option<String>,
    pub domain_keyword: String,
    pub request_timeout: Duration,
    pub bind_addr: SocketAddr,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            serpapi_key: None,
            semantic_scholar_key: None,
            domain_keyword: DEFAULT_DOMAIN_KEYWORD.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let request_timeout = var("SEARCH_TIMEOUT_SECS")
            .and_then(|v| match v.parse::<u64>() {
                Ok(secs) if secs > 0 => Some(Duration::from_secs(secs)),
                _ => {
                    tracing::warn!("Ignoring invalid SEARCH_TIMEOUT_SECS={:?}", v);
                    None
                }
            })
            .unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS));

        let bind_addr = var("BIND_ADDR")
            .and_then(|v| match v.parse::<SocketAddr>() {
                Ok(addr) => Some(addr),
                Err(e) => {
                    tracing::warn!("Ignoring invalid BIND_ADDR={:?}: {}", v, e);
                    None
                }
            })
            .unwrap_or_else(|| Config::default().bind_addr);

        Self {
            serpapi_key: var("SERPAPI_KEY"),
            semantic_scholar_key: var("SEMANTIC_SCHOLAR_KEY"),
            domain_keyword: var("SEARCH_DOMAIN_KEYWORD")
                .unwrap_or_else(|| DEFAULT_DOMAIN_KEYWORD.to_string()),
            request_timeout,
            bind_addr,
        }
    }

    pub fn serpapi_configured(&self) -> bool {
        self.serpapi_key.is_some()
    }

    /// Build the paper sources in merge order: free tier first, then the
    /// backup tier if its key is present.
    pub fn build_sources(&self) -> Vec<Arc<dyn PaperSource>> {
        let keyword = self.domain_keyword.as_str();
        let timeout = self.request_timeout;
        let mut sources: Vec<Arc<dyn PaperSource>> = vec![
            Arc::new(apis::semantic_scholar::SemanticScholarClient::new(
                self.semantic_scholar_key.clone(),
                keyword,
                timeout,
            )),
            Arc::new(apis::arxiv::ArxivClient::new(keyword, timeout)),
            Arc::new(apis::core_ac::CoreClient::new(keyword, timeout)),
            Arc::new(apis::crossref::CrossRefClient::new(keyword, timeout)),
        ];

        if let Some(ref key) = self.serpapi_key {
            sources.push(Arc::new(apis::google_scholar::GoogleScholarClient::new(
                key.clone(),
                keyword,
                timeout,
            )));
        } else {
            tracing::warn!("Google Scholar disabled: SERPAPI_KEY not set");
        }

        sources
    }

    /// Return a status entry for every known source.
    pub fn source_status(&self) -> Vec<SourceStatus> {
        SourceId::ALL
            .into_iter()
            .map(|id| {
                let (status, cost) = match id {
                    SourceId::SemanticScholar => ("active", "FREE (10,000/month)"),
                    SourceId::Arxiv | SourceId::CrossRef => ("active", "FREE"),
                    SourceId::Core => ("active", "FREE (1,000/day)"),
                    SourceId::GoogleScholar if self.serpapi_configured() => {
                        ("backup", "Limited (100/month)")
                    }
                    SourceId::GoogleScholar => ("unconfigured", "Limited (100/month)"),
                };
                SourceStatus {
                    id: id.as_str(),
                    name: id.display_name(),
                    status,
                    cost,
                }
            })
            .collect()
    }

    /// Display names of the always-on sources.
    pub fn free_source_names(&self) -> Vec<&'static str> {
        SourceId::ALL
            .into_iter()
            .filter(|id| id.tier() == Tier::Free)
            .map(|id| id.display_name())
            .collect()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceStatus {
    pub id: &'static str,
    pub name: &'static str,
    pub status: &'static str,
    pub cost: &'static str,
}
