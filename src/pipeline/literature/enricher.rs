use super::types::{CitationClient, LiteratureRecord};
use super::LiteratureError;
use crate::config::DEFAULT_MAX_ARTICLES;

/// Search phrase sent to the citation backend for one test.
pub fn search_query(test_name: &str) -> String {
    format!("{test_name} health risk meta-analysis")
}

/// Literature for one finding, after containment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enrichment {
    pub records: Vec<LiteratureRecord>,
    /// The lookup failed and `records` is an empty stand-in.
    pub degraded: bool,
}

/// Looks up supporting articles for lab tests.
pub struct LiteratureEnricher {
    client: Box<dyn CitationClient + Send + Sync>,
    max_results: usize,
}

impl LiteratureEnricher {
    pub fn new(client: Box<dyn CitationClient + Send + Sync>) -> Self {
        Self {
            client,
            max_results: DEFAULT_MAX_ARTICLES,
        }
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    /// Search, then one batched summary call. Records follow the backend's
    /// relevance order; identifiers missing from the summary are dropped.
    pub fn enrich(&self, test_name: &str) -> Result<Vec<LiteratureRecord>, LiteratureError> {
        if test_name.trim().is_empty() || self.max_results == 0 {
            return Ok(Vec::new());
        }

        let ids = self.client.search(&search_query(test_name), self.max_results)?;
        if ids.is_empty() {
            tracing::debug!(test = test_name, "No articles found");
            return Ok(Vec::new());
        }

        let summaries = self.client.summarize(&ids)?;

        let records = ids
            .iter()
            .filter_map(|id| match summaries.get(id) {
                Some(summary) => Some(LiteratureRecord::from_summary(id, summary)),
                None => {
                    tracing::debug!(test = test_name, id = %id, "Identifier missing from summary, skipping");
                    None
                }
            })
            .collect();
        Ok(records)
    }

    /// [`Self::enrich`] with failures contained: an error becomes an empty
    /// list flagged as degraded.
    pub fn enrich_or_empty(&self, test_name: &str) -> Enrichment {
        tracing::info!(test = test_name, "Looking up PubMed");
        match self.enrich(test_name) {
            Ok(records) => Enrichment {
                records,
                degraded: false,
            },
            Err(e) => {
                tracing::warn!(test = test_name, error = %e, "PubMed lookup failed");
                Enrichment {
                    records: Vec::new(),
                    degraded: true,
                }
            }
        }
    }
}
