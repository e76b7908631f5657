use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::LiteratureError;

const PUBMED_ARTICLE_BASE: &str = "https://pubmed.ncbi.nlm.nih.gov";

/// Canonical article page for a PubMed identifier.
pub fn pubmed_url(id: &str) -> String {
    format!("{PUBMED_ARTICLE_BASE}/{id}/")
}

/// One supporting reference attached to a finding.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LiteratureRecord {
    pub title: String,
    pub source: String,
    pub publication_date: String,
    pub url: String,
}

impl LiteratureRecord {
    pub fn from_summary(id: &str, summary: &ArticleSummary) -> Self {
        Self {
            title: summary.title.clone(),
            source: summary.source.clone(),
            publication_date: summary.pubdate.clone(),
            url: pubmed_url(id),
        }
    }
}

/// Per-identifier metadata returned by the summary call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ArticleSummary {
    pub title: String,
    pub source: String,
    pub pubdate: String,
}

/// Bibliographic backend abstraction (allows mocking)
pub trait CitationClient {
    /// Identifiers matching `query`, best match first, at most `max_results`.
    fn search(&self, query: &str, max_results: usize) -> Result<Vec<String>, LiteratureError>;

    /// Metadata for a batch of identifiers. Identifiers the backend does not
    /// know are simply absent from the map.
    fn summarize(&self, ids: &[String]) -> Result<HashMap<String, ArticleSummary>, LiteratureError>;
}
