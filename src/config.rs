use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Application-level constants
pub const APP_NAME: &str = "labrisk";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const DEFAULT_COMPLETION_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_COMPLETION_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_CITATION_BASE_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils";

/// Generation is slow; the completion call gets a long budget.
pub const DEFAULT_COMPLETION_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_CITATION_TIMEOUT_SECS: u64 = 20;
pub const DEFAULT_MAX_ARTICLES: usize = 2;
pub const DEFAULT_ENRICHMENT_WORKERS: usize = 4;
pub const DEFAULT_RENDER_DPI: u32 = 300;

/// Log filter used when `RUST_LOG` is unset.
pub fn default_log_filter() -> String {
    format!("{APP_NAME}=info")
}

/// Default location for developer diagnostic artifacts.
/// `<cache dir>/labrisk/diagnostic`, or a relative directory when the
/// platform has no cache dir.
pub fn default_dump_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
        .join("diagnostic")
}

/// Immutable runtime configuration, built once at process start and handed
/// to each component constructor.
#[derive(Clone)]
pub struct Config {
    pub completion_api_key: Option<String>,
    pub completion_model: String,
    pub completion_base_url: String,
    pub completion_timeout: Duration,
    pub ocr_executable: Option<PathBuf>,
    pub pdfium_library: Option<PathBuf>,
    pub render_dpi: u32,
    pub citation_api_key: Option<String>,
    pub citation_base_url: String,
    pub citation_timeout: Duration,
    pub max_articles: usize,
    pub enrichment_workers: usize,
    pub dump_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            completion_api_key: None,
            completion_model: DEFAULT_COMPLETION_MODEL.to_string(),
            completion_base_url: DEFAULT_COMPLETION_BASE_URL.to_string(),
            completion_timeout: Duration::from_secs(DEFAULT_COMPLETION_TIMEOUT_SECS),
            ocr_executable: None,
            pdfium_library: None,
            render_dpi: DEFAULT_RENDER_DPI,
            citation_api_key: None,
            citation_base_url: DEFAULT_CITATION_BASE_URL.to_string(),
            citation_timeout: Duration::from_secs(DEFAULT_CITATION_TIMEOUT_SECS),
            max_articles: DEFAULT_MAX_ARTICLES,
            enrichment_workers: DEFAULT_ENRICHMENT_WORKERS,
            dump_dir: default_dump_dir(),
        }
    }
}

impl Config {
    /// Read configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    /// Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let defaults = Self::default();

        Self {
            completion_api_key: get("GEMINI_API_KEY"),
            completion_model: get("GEMINI_MODEL").unwrap_or(defaults.completion_model),
            completion_base_url: get("GEMINI_API_BASE")
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or(defaults.completion_base_url),
            completion_timeout: defaults.completion_timeout,
            ocr_executable: get("TESSERACT_CMD").map(PathBuf::from),
            pdfium_library: get("PDFIUM_DYNAMIC_LIB_PATH").map(PathBuf::from),
            render_dpi: defaults.render_dpi,
            citation_api_key: get("NCBI_API_KEY"),
            citation_base_url: get("NCBI_EUTILS_BASE")
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or(defaults.citation_base_url),
            citation_timeout: defaults.citation_timeout,
            max_articles: parse_or_default(
                "LABRISK_MAX_ARTICLES",
                get("LABRISK_MAX_ARTICLES"),
                defaults.max_articles,
            ),
            enrichment_workers: parse_or_default(
                "LABRISK_ENRICH_WORKERS",
                get("LABRISK_ENRICH_WORKERS"),
                defaults.enrichment_workers,
            )
            .max(1),
            dump_dir: get("LABRISK_DUMP_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.dump_dir),
        }
    }
}

fn parse_or_default(key: &str, raw: Option<String>, default: usize) -> usize {
    match raw {
        None => default,
        Some(value) => value.parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %value, default, "Ignoring unparsable numeric setting");
            default
        }),
    }
}

fn redact(secret: &Option<String>) -> &'static str {
    if secret.is_some() {
        "<set>"
    } else {
        "<unset>"
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("completion_api_key", &redact(&self.completion_api_key))
            .field("completion_model", &self.completion_model)
            .field("completion_base_url", &self.completion_base_url)
            .field("completion_timeout", &self.completion_timeout)
            .field("ocr_executable", &self.ocr_executable)
            .field("pdfium_library", &self.pdfium_library)
            .field("render_dpi", &self.render_dpi)
            .field("citation_api_key", &redact(&self.citation_api_key))
            .field("citation_base_url", &self.citation_base_url)
            .field("citation_timeout", &self.citation_timeout)
            .field("max_articles", &self.max_articles)
            .field("enrichment_workers", &self.enrichment_workers)
            .field("dump_dir", &self.dump_dir)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Config {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn empty_environment_uses_defaults() {
        let config = config_from(&[]);
        assert!(config.completion_api_key.is_none());
        assert!(config.citation_api_key.is_none());
        assert!(config.ocr_executable.is_none());
        assert_eq!(config.completion_model, "gemini-2.5-flash");
        assert_eq!(config.completion_timeout, Duration::from_secs(120));
        assert_eq!(config.citation_timeout, Duration::from_secs(20));
        assert_eq!(config.max_articles, 2);
        assert_eq!(config.render_dpi, 300);
        assert!(config.dump_dir.ends_with("diagnostic"));
    }

    #[test]
    fn reads_keys_and_overrides() {
        let config = config_from(&[
            ("GEMINI_API_KEY", "g-key"),
            ("NCBI_API_KEY", "n-key"),
            ("TESSERACT_CMD", "/opt/tess/bin/tesseract"),
            ("LABRISK_MAX_ARTICLES", "5"),
            ("LABRISK_DUMP_DIR", "/tmp/dumps"),
        ]);
        assert_eq!(config.completion_api_key.as_deref(), Some("g-key"));
        assert_eq!(config.citation_api_key.as_deref(), Some("n-key"));
        assert_eq!(
            config.ocr_executable,
            Some(PathBuf::from("/opt/tess/bin/tesseract"))
        );
        assert_eq!(config.max_articles, 5);
        assert_eq!(config.dump_dir, PathBuf::from("/tmp/dumps"));
    }

    #[test]
    fn blank_values_count_as_unset() {
        let config = config_from(&[("GEMINI_API_KEY", "   "), ("TESSERACT_CMD", "")]);
        assert!(config.completion_api_key.is_none());
        assert!(config.ocr_executable.is_none());
    }

    #[test]
    fn bad_numbers_fall_back() {
        let config = config_from(&[
            ("LABRISK_MAX_ARTICLES", "lots"),
            ("LABRISK_ENRICH_WORKERS", "0"),
        ]);
        assert_eq!(config.max_articles, DEFAULT_MAX_ARTICLES);
        assert_eq!(config.enrichment_workers, 1);
    }

    #[test]
    fn base_urls_lose_trailing_slash() {
        let config = config_from(&[
            ("GEMINI_API_BASE", "http://localhost:9000/v1beta/"),
            ("NCBI_EUTILS_BASE", "http://localhost:9001/"),
        ]);
        assert_eq!(config.completion_base_url, "http://localhost:9000/v1beta");
        assert_eq!(config.citation_base_url, "http://localhost:9001");
    }

    #[test]
    fn debug_output_redacts_keys() {
        let config = config_from(&[("GEMINI_API_KEY", "super-secret")]);
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("<set>"));
    }

    #[test]
    fn default_filter_targets_crate() {
        assert_eq!(default_log_filter(), "labrisk=info");
    }
}
