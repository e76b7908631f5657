use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use reqwest::StatusCode;
use serde_json::Value;

use super::enricher::search_query;
use super::types::{ArticleSummary, CitationClient};
use super::LiteratureError;
use crate::config::Config;

/// NCBI allows 3 requests/s per client without an API key, 10 with one.
const REQUESTS_PER_SECOND_ANONYMOUS: u32 = 3;
const REQUESTS_PER_SECOND_WITH_KEY: u32 = 10;

/// Minimum spacing between E-utilities requests for a key state.
pub fn request_interval(has_api_key: bool) -> Duration {
    let per_second = if has_api_key {
        REQUESTS_PER_SECOND_WITH_KEY
    } else {
        REQUESTS_PER_SECOND_ANONYMOUS
    };
    Duration::from_secs(1) / per_second
}

/// Spaces calls at least `interval` apart across every thread sharing it.
pub struct RequestThrottle {
    interval: Duration,
    next_slot: Mutex<Option<Instant>>,
}

impl RequestThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_slot: Mutex::new(None),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Block until the caller's slot comes up. Slots are reserved under the
    /// lock and slept on outside it.
    pub fn wait(&self) {
        let wait = {
            let mut next = self.next_slot.lock().unwrap_or_else(|p| p.into_inner());
            let now = Instant::now();
            let slot = next.map_or(now, |n| n.max(now));
            *next = Some(slot + self.interval);
            slot - now
        };
        if !wait.is_zero() {
            tracing::debug!(wait_ms = wait.as_millis() as u64, "Throttling PubMed request");
            std::thread::sleep(wait);
        }
    }
}

/// Query parameters for `esearch.fcgi`.
pub fn search_params(
    query: &str,
    max_results: usize,
    api_key: Option<&str>,
) -> Vec<(&'static str, String)> {
    let mut params = vec![
        ("db", "pubmed".to_string()),
        ("term", query.to_string()),
        ("retmode", "json".to_string()),
        ("retmax", max_results.to_string()),
    ];
    push_api_key(&mut params, api_key);
    params
}

/// Query parameters for `esummary.fcgi`: one batched call for all ids.
pub fn summary_params(ids: &[String], api_key: Option<&str>) -> Vec<(&'static str, String)> {
    let mut params = vec![
        ("db", "pubmed".to_string()),
        ("id", ids.join(",")),
        ("retmode", "json".to_string()),
    ];
    push_api_key(&mut params, api_key);
    params
}

fn push_api_key(params: &mut Vec<(&'static str, String)>, api_key: Option<&str>) {
    if let Some(key) = api_key {
        params.push(("api_key", key.to_string()));
    }
}

/// Non-2xx answers are call failures; 429 is named so rate limiting is visible.
fn check_status(endpoint: &str, status: StatusCode) -> Result<(), LiteratureError> {
    if status.is_success() {
        return Ok(());
    }
    let reason = if status == StatusCode::TOO_MANY_REQUESTS {
        " (rate limited)"
    } else {
        ""
    };
    Err(LiteratureError::ServiceCallFailed(format!(
        "{endpoint} returned status {}{reason}",
        status.as_u16()
    )))
}

/// NCBI E-utilities client for PubMed (`esearch` + `esummary`).
///
/// The API key is optional; without it NCBI applies a lower rate limit,
/// which the built-in throttle respects across all enrichment workers.
pub struct PubMedClient {
    base_url: String,
    api_key: Option<String>,
    client: reqwest::blocking::Client,
    timeout: Duration,
    throttle: RequestThrottle,
}

impl PubMedClient {
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, LiteratureError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LiteratureError::ServiceCallFailed(format!("HTTP client setup: {e}")))?;

        let throttle = RequestThrottle::new(request_interval(api_key.is_some()));
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            client,
            timeout,
            throttle,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, LiteratureError> {
        Self::new(
            &config.citation_base_url,
            config.citation_api_key.clone(),
            config.citation_timeout,
        )
    }

    pub fn request_interval(&self) -> Duration {
        self.throttle.interval()
    }

    fn get_json(&self, endpoint: &str, params: &[(&str, String)]) -> Result<Value, LiteratureError> {
        self.throttle.wait();

        let url = format!("{}/{endpoint}", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(params)
            .send()
            .map_err(|e| {
                let e = e.without_url();
                if e.is_timeout() {
                    LiteratureError::ServiceCallFailed(format!(
                        "{endpoint} timed out after {}s",
                        self.timeout.as_secs()
                    ))
                } else {
                    LiteratureError::ServiceCallFailed(format!("{endpoint}: {e}"))
                }
            })?;

        check_status(endpoint, response.status())?;

        response
            .json::<Value>()
            .map_err(|e| LiteratureError::ResponseParsing(format!("{endpoint}: {}", e.without_url())))
    }
}

/// `esearchresult.idlist`; a missing list means no hits.
fn parse_search_ids(body: &Value) -> Vec<String> {
    body.pointer("/esearchresult/idlist")
        .and_then(Value::as_array)
        .map(|ids| {
            ids.iter()
                .filter_map(|id| id.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

/// `result.<id>` objects keyed by identifier. The `uids` index and any
/// entry that does not deserialize are skipped.
fn parse_summaries(body: &Value) -> HashMap<String, ArticleSummary> {
    let Some(result) = body.get("result").and_then(Value::as_object) else {
        return HashMap::new();
    };

    result
        .iter()
        .filter(|(id, value)| id.as_str() != "uids" && value.get("error").is_none())
        .filter_map(|(id, value)| {
            serde_json::from_value::<ArticleSummary>(value.clone())
                .ok()
                .map(|summary| (id.clone(), summary))
        })
        .collect()
}

impl CitationClient for PubMedClient {
    fn search(&self, query: &str, max_results: usize) -> Result<Vec<String>, LiteratureError> {
        let params = search_params(query, max_results, self.api_key.as_deref());
        let body = self.get_json("esearch.fcgi", &params)?;
        let mut ids = parse_search_ids(&body);
        ids.truncate(max_results);
        Ok(ids)
    }

    fn summarize(&self, ids: &[String]) -> Result<HashMap<String, ArticleSummary>, LiteratureError> {
        let params = summary_params(ids, self.api_key.as_deref());
        let body = self.get_json("esummary.fcgi", &params)?;
        Ok(parse_summaries(&body))
    }
}

/// Mock citation backend keyed by test name, with call counters and
/// optional per-test latency for ordering tests.
#[derive(Default)]
pub struct MockCitationClient {
    searches: HashMap<String, Result<Vec<String>, LiteratureError>>,
    delays: HashMap<String, Duration>,
    summaries: HashMap<String, ArticleSummary>,
    summary_error: Option<LiteratureError>,
    search_calls: AtomicUsize,
    summary_calls: AtomicUsize,
}

impl MockCitationClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_search(mut self, test_name: &str, ids: &[&str]) -> Self {
        self.searches.insert(
            search_query(test_name),
            Ok(ids.iter().map(|id| id.to_string()).collect()),
        );
        self
    }

    pub fn with_failing_search(mut self, test_name: &str, message: &str) -> Self {
        self.searches.insert(
            search_query(test_name),
            Err(LiteratureError::ServiceCallFailed(message.to_string())),
        );
        self
    }

    pub fn with_delay(mut self, test_name: &str, delay: Duration) -> Self {
        self.delays.insert(search_query(test_name), delay);
        self
    }

    pub fn with_summary(mut self, id: &str, title: &str, source: &str, pubdate: &str) -> Self {
        self.summaries.insert(
            id.to_string(),
            ArticleSummary {
                title: title.to_string(),
                source: source.to_string(),
                pubdate: pubdate.to_string(),
            },
        );
        self
    }

    pub fn with_failing_summary(mut self, message: &str) -> Self {
        self.summary_error = Some(LiteratureError::ServiceCallFailed(message.to_string()));
        self
    }

    pub fn search_calls(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }

    pub fn summary_calls(&self) -> usize {
        self.summary_calls.load(Ordering::SeqCst)
    }
}

impl CitationClient for MockCitationClient {
    fn search(&self, query: &str, max_results: usize) -> Result<Vec<String>, LiteratureError> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delays.get(query) {
            std::thread::sleep(*delay);
        }
        match self.searches.get(query) {
            Some(Ok(ids)) => Ok(ids.iter().take(max_results).cloned().collect()),
            Some(Err(e)) => Err(e.clone()),
            None => Ok(Vec::new()),
        }
    }

    fn summarize(&self, ids: &[String]) -> Result<HashMap<String, ArticleSummary>, LiteratureError> {
        self.summary_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(e) = &self.summary_error {
            return Err(e.clone());
        }
        Ok(ids
            .iter()
            .filter_map(|id| self.summaries.get(id).map(|s| (id.clone(), s.clone())))
            .collect())
    }
}
