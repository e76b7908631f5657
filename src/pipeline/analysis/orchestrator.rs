use super::parser::parse_risk_report;
use super::prompt::build_risk_prompt;
use super::types::{AnalysisOutcome, AnalysisWarning, CompletionClient};
use super::AnalysisError;

/// Turns extracted report text into a structured risk report:
/// prompt → completion → envelope → fence strip → parse
pub struct RiskAnalyzer {
    client: Box<dyn CompletionClient + Send + Sync>,
}

impl RiskAnalyzer {
    pub fn new(client: Box<dyn CompletionClient + Send + Sync>) -> Self {
        Self { client }
    }

    /// Single attempt; service failures propagate unchanged.
    pub fn analyze(&self, text: &str) -> Result<AnalysisOutcome, AnalysisError> {
        tracing::info!(chars = text.len(), "Sending text for structured analysis");

        let prompt = build_risk_prompt(text);
        let payload = self.client.complete(&prompt)?;

        let fallback = payload.is_fallback();
        if fallback {
            tracing::warn!("Completion envelope had no text part, parsing the whole envelope");
        }

        let mut outcome = parse_risk_report(payload.text()).inspect_err(|e| {
            if let AnalysisError::MalformedCompletion { raw, .. } = e {
                let preview: String = raw.chars().take(500).collect();
                tracing::debug!(preview = %preview, "Failed to parse completion as JSON");
            }
        })?;

        if fallback {
            outcome.warnings.insert(0, AnalysisWarning::UnexpectedEnvelope);
        }
        if outcome.warnings.contains(&AnalysisWarning::NoFindings) {
            tracing::warn!("No test results found in the analysis");
        }

        tracing::info!(
            tests = outcome.report.tests.len(),
            warnings = outcome.warnings.len(),
            "Structured analysis complete"
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::analysis::gemini::MockCompletionClient;
    use crate::pipeline::analysis::types::CompletionPayload;

    const LDL: &str = r#"{"summary":"elevated LDL","tests":[{"name":"LDL Cholesterol","current_value":"165 mg/dL","safe_range":"<100 mg/dL","risk_percent":75,"risk_reason":"above threshold"}]}"#;

    #[test]
    fn analyze_parses_stub_response() {
        let analyzer = RiskAnalyzer::new(Box::new(MockCompletionClient::new(LDL)));
        let outcome = analyzer.analyze("LDL Cholesterol 165 mg/dL").unwrap();
        assert_eq!(outcome.report.tests.len(), 1);
        assert_eq!(outcome.report.tests[0].risk_percent, Some(75));
        assert!(outcome.warnings.is_empty());
    }

    #[test]
    fn fenced_empty_tests_yields_no_findings() {
        let analyzer = RiskAnalyzer::new(Box::new(MockCompletionClient::new(
            "```json\n{\"summary\":\"ok\",\"tests\":[]}\n```",
        )));
        let outcome = analyzer.analyze("text").unwrap();
        assert!(outcome.report.tests.is_empty());
        assert_eq!(outcome.report.summary, "ok");
        assert_eq!(outcome.warnings, vec![AnalysisWarning::NoFindings]);
    }

    #[test]
    fn fallback_envelope_is_flagged_and_still_parsed() {
        let analyzer = RiskAnalyzer::new(Box::new(MockCompletionClient::with_payload(
            CompletionPayload::Fallback(LDL.to_string()),
        )));
        let outcome = analyzer.analyze("text").unwrap();
        assert_eq!(outcome.report.tests.len(), 1);
        assert_eq!(outcome.warnings, vec![AnalysisWarning::UnexpectedEnvelope]);
    }

    #[test]
    fn unparsable_fallback_is_malformed() {
        let analyzer = RiskAnalyzer::new(Box::new(MockCompletionClient::with_payload(
            CompletionPayload::Fallback("<html>quota exceeded</html>".into()),
        )));
        let err = analyzer.analyze("text").unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::MalformedCompletion { ref raw, .. } if raw.contains("quota")
        ));
    }

    #[test]
    fn service_failure_propagates_without_retry() {
        let client = std::sync::Arc::new(MockCompletionClient::failing("status 503"));
        struct Shared(std::sync::Arc<MockCompletionClient>);
        impl CompletionClient for Shared {
            fn complete(&self, prompt: &str) -> Result<CompletionPayload, AnalysisError> {
                self.0.complete(prompt)
            }
        }

        let analyzer = RiskAnalyzer::new(Box::new(Shared(client.clone())));
        let err = analyzer.analyze("text").unwrap_err();
        assert!(matches!(err, AnalysisError::ServiceCallFailed(_)));
        assert_eq!(client.calls(), 1);
    }
}
