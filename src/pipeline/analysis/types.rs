use serde::{Deserialize, Serialize};

use super::AnalysisError;
use crate::pipeline::literature::LiteratureRecord;

/// One lab test with its risk assessment and supporting literature.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TestFinding {
    pub name: String,
    pub current_value: String,
    pub safe_range: String,
    /// Model's 0-100 severity estimate, taken as-is. `None` when the model
    /// omitted it or returned something outside 0..=100.
    pub risk_percent: Option<u8>,
    pub risk_reason: String,
    #[serde(default)]
    pub literature: Vec<LiteratureRecord>,
}

/// Final artifact of one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct RiskReport {
    pub summary: String,
    pub tests: Vec<TestFinding>,
}

/// Non-fatal conditions noticed while analyzing.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnalysisWarning {
    /// No `tests` list, or an empty one.
    NoFindings,
    /// Envelope lacked the expected text field; the whole envelope was parsed instead.
    UnexpectedEnvelope,
    /// A finding carried a `risk_percent` that is not an integer in 0..=100.
    InvalidRiskPercent { test: String },
    /// A `tests` entry was not a JSON object and was dropped.
    SkippedEntry { index: usize },
}

/// Report plus warnings produced by [`super::RiskAnalyzer::analyze`].
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisOutcome {
    pub report: RiskReport,
    pub warnings: Vec<AnalysisWarning>,
}

/// What came back from the completion service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionPayload {
    /// The generated text, found at the expected place in the envelope.
    Text(String),
    /// The envelope did not have the expected shape; this is the whole
    /// envelope stringified.
    Fallback(String),
}

impl CompletionPayload {
    pub fn text(&self) -> &str {
        match self {
            Self::Text(t) | Self::Fallback(t) => t,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback(_))
    }
}

/// Structured completion backend abstraction (allows mocking)
pub trait CompletionClient {
    fn complete(&self, prompt: &str) -> Result<CompletionPayload, AnalysisError>;
}
