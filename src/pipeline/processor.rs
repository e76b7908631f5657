//! Lab report pipeline orchestrator.
//!
//! Single entry point that drives one report through every stage:
//! validate → extract → analyze → enrich (parallel) → report.
//!
//! Every backend sits behind a trait object so the orchestrator runs
//! unchanged against mocks in tests.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use serde::Serialize;
use uuid::Uuid;

use crate::config::DEFAULT_ENRICHMENT_WORKERS;
use crate::pipeline::analysis::{AnalysisError, AnalysisWarning, RiskAnalyzer, RiskReport};
use crate::pipeline::diagnostic;
use crate::pipeline::document::{extension_label, Document};
use crate::pipeline::extraction::{ExtractionError, TextExtractor};
use crate::pipeline::literature::{Enrichment, LiteratureEnricher};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Problems with the input path itself, detected before any backend runs.
#[derive(Debug, thiserror::Error)]
pub enum InputError {
    #[error("File not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Unsupported file extension: {0}")]
    UnsupportedExtension(String),
}

/// Fatal pipeline failures. Any of these aborts the run without a report.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Input(#[from] InputError),

    #[error("Extraction failed: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("Analysis failed: {0}")]
    Analysis(#[from] AnalysisError),
}

impl PipelineError {
    /// Terminal state the run ended in.
    pub fn status(&self) -> PipelineStatus {
        match self {
            Self::Input(_) | Self::Extraction(_) => PipelineStatus::FailedAtExtraction,
            Self::Analysis(_) => PipelineStatus::FailedAtAnalysis,
        }
    }

    /// Process exit code for this failure.
    ///
    /// 2 missing file, 3 bad input or unusable model output,
    /// 4 backend or service unavailable, 5 anything else.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Input(InputError::NotFound(_)) => 2,
            Self::Input(InputError::UnsupportedExtension(_)) => 3,
            Self::Extraction(e) => match e {
                ExtractionError::UnsupportedFormat(_) | ExtractionError::EmptyExtraction => 3,
                ExtractionError::BackendUnavailable(_) => 4,
                ExtractionError::Io(io) if io.kind() == std::io::ErrorKind::NotFound => 2,
                ExtractionError::Io(_)
                | ExtractionError::OcrProcessing(_)
                | ExtractionError::PdfRendering { .. }
                | ExtractionError::ImageProcessing(_) => 5,
            },
            Self::Analysis(e) => match e {
                AnalysisError::MissingApiKey | AnalysisError::ServiceCallFailed(_) => 4,
                AnalysisError::MalformedCompletion { .. } => 3,
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// Terminal state of one run.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStatus {
    Succeeded,
    /// Report produced, but at least one literature lookup failed.
    PartiallySucceeded,
    FailedAtExtraction,
    FailedAtAnalysis,
}

/// Everything a successful run produced.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineOutcome {
    pub run_id: Uuid,
    pub status: PipelineStatus,
    pub report: RiskReport,
    pub warnings: Vec<AnalysisWarning>,
    /// Names of tests whose literature lookup failed and was left empty.
    pub degraded_tests: Vec<String>,
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Drives one lab report through extraction, analysis and enrichment.
pub struct DocumentPipeline {
    extractor: Box<dyn TextExtractor + Send + Sync>,
    analyzer: RiskAnalyzer,
    enricher: LiteratureEnricher,
    enrichment_workers: usize,
    dump_dir: Option<PathBuf>,
}

impl DocumentPipeline {
    pub fn new(
        extractor: Box<dyn TextExtractor + Send + Sync>,
        analyzer: RiskAnalyzer,
        enricher: LiteratureEnricher,
    ) -> Self {
        Self {
            extractor,
            analyzer,
            enricher,
            enrichment_workers: DEFAULT_ENRICHMENT_WORKERS,
            dump_dir: None,
        }
    }

    /// Upper bound on concurrent literature lookups. Clamped to at least 1.
    pub fn with_enrichment_workers(mut self, workers: usize) -> Self {
        self.enrichment_workers = workers.max(1);
        self
    }

    /// Base directory for diagnostic artifacts. Without one, nothing is dumped.
    pub fn with_dump_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dump_dir = Some(dir.into());
        self
    }

    /// Full pipeline from a source file path.
    pub fn run(&self, path: &Path) -> Result<PipelineOutcome, PipelineError> {
        let run_id = Uuid::new_v4();
        tracing::info!(run_id = %run_id, path = %path.display(), "Starting lab report run");

        let document = validate_input(path)?;

        // Stage 1: text extraction
        let text = self.extractor.extract(&document).inspect_err(|e| {
            tracing::debug!(run_id = %run_id, error = %e, "Extraction failed");
        })?;
        tracing::info!(
            run_id = %run_id,
            pages = text.page_count(),
            chars = text.as_str().len(),
            "Extraction complete"
        );

        // Stage 2: structured risk analysis
        let outcome = match self.analyzer.analyze(text.as_str()) {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::debug!(run_id = %run_id, error = %e, "Analysis failed");
                if let (AnalysisError::MalformedCompletion { raw, reason }, Some(base)) =
                    (&e, self.dump_dir.as_deref())
                {
                    diagnostic::dump_malformed_completion(base, &run_id, raw, reason);
                }
                return Err(e.into());
            }
        };

        // Stage 3: literature enrichment
        let mut report = outcome.report;
        let names: Vec<&str> = report.tests.iter().map(|t| t.name.as_str()).collect();
        let enrichments = self.enrich_all(&names);

        let mut degraded_tests = Vec::new();
        for (finding, enrichment) in report.tests.iter_mut().zip(enrichments) {
            if enrichment.degraded {
                degraded_tests.push(finding.name.clone());
            }
            finding.literature = enrichment.records;
        }

        let status = if degraded_tests.is_empty() {
            PipelineStatus::Succeeded
        } else {
            PipelineStatus::PartiallySucceeded
        };

        tracing::info!(
            run_id = %run_id,
            tests = report.tests.len(),
            degraded = degraded_tests.len(),
            status = ?status,
            "Lab report run complete"
        );

        Ok(PipelineOutcome {
            run_id,
            status,
            report,
            warnings: outcome.warnings,
            degraded_tests,
        })
    }

    /// Look up literature for every name on a bounded pool of scoped threads.
    /// Output is index-aligned with `names` whatever order lookups finish in.
    fn enrich_all(&self, names: &[&str]) -> Vec<Enrichment> {
        if names.is_empty() {
            return Vec::new();
        }

        let workers = self.enrichment_workers.min(names.len());
        tracing::debug!(tests = names.len(), workers, "Enriching findings");

        let next = AtomicUsize::new(0);
        let mut slots: Vec<Option<Enrichment>> = vec![None; names.len()];

        std::thread::scope(|scope| {
            let handles: Vec<_> = (0..workers)
                .map(|_| {
                    scope.spawn(|| {
                        let mut done = Vec::new();
                        loop {
                            let idx = next.fetch_add(1, Ordering::SeqCst);
                            let Some(name) = names.get(idx) else {
                                break;
                            };
                            done.push((idx, self.enricher.enrich_or_empty(name)));
                        }
                        done
                    })
                })
                .collect();

            for handle in handles {
                match handle.join() {
                    Ok(done) => {
                        for (idx, enrichment) in done {
                            slots[idx] = Some(enrichment);
                        }
                    }
                    Err(payload) => std::panic::resume_unwind(payload),
                }
            }
        });

        slots
            .into_iter()
            .map(|slot| {
                slot.unwrap_or(Enrichment {
                    records: Vec::new(),
                    degraded: true,
                })
            })
            .collect()
    }
}

/// Existence first, then extension, so a missing `scan.docx` reports as missing.
fn validate_input(path: &Path) -> Result<Document, InputError> {
    if !path.is_file() {
        return Err(InputError::NotFound(path.to_path_buf()));
    }
    Document::from_path(path).map_err(|_| InputError::UnsupportedExtension(extension_label(path)))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
