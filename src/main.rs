use std::path::PathBuf;
use std::process::ExitCode;

use clap::error::ErrorKind;
use clap::Parser;

use labrisk::config::{self, Config};
use labrisk::pipeline::analysis::{AnalysisError, GeminiClient, RiskAnalyzer};
use labrisk::pipeline::extraction::{DocumentExtractor, PdfiumRenderer, TesseractCli};
use labrisk::pipeline::literature::{LiteratureEnricher, LiteratureError, PubMedClient};
use labrisk::{setup_check, DocumentPipeline, PipelineError};

const EXIT_USAGE: u8 = 1;
const EXIT_OTHER: u8 = 5;

#[derive(Parser, Debug)]
#[command(
    name = config::APP_NAME,
    version,
    about = "Estimate per-test health risk from a scanned lab report"
)]
struct Cli {
    /// Lab report to analyze (.pdf, .png, .jpg, .jpeg, .tif, .tiff)
    #[arg(required_unless_present = "check")]
    report: Option<PathBuf>,

    /// Verify Tesseract, PDFium and API keys, then exit
    #[arg(long, conflicts_with = "report")]
    check: bool,
}

/// Failures while wiring the production backends.
#[derive(Debug, thiserror::Error)]
enum StartupError {
    #[error("Completion client setup failed: {0}")]
    Completion(#[from] AnalysisError),

    #[error("Citation client setup failed: {0}")]
    Citation(#[from] LiteratureError),
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::from(EXIT_USAGE),
            };
        }
    };

    labrisk::init_tracing();

    let config = Config::from_env();
    tracing::debug!(?config, "Configuration loaded");
    tracing::info!("{} v{}", config::APP_NAME, config::APP_VERSION);

    let report = match (cli.check, cli.report) {
        (true, _) => {
            let setup = setup_check::run_setup_check(&config);
            println!("{setup}");
            return ExitCode::from(setup.exit_code());
        }
        (false, Some(report)) => report,
        (false, None) => {
            eprintln!("error: a report path is required");
            return ExitCode::from(EXIT_USAGE);
        }
    };

    let pipeline = match build_pipeline(&config) {
        Ok(pipeline) => pipeline,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::from(EXIT_OTHER);
        }
    };

    match pipeline.run(&report) {
        Ok(outcome) => match serde_json::to_string_pretty(&outcome.report) {
            Ok(json) => {
                println!("{json}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("error: failed to serialize report: {e}");
                ExitCode::from(EXIT_OTHER)
            }
        },
        Err(e) => report_failure(&e),
    }
}

/// Wire the production backends from configuration.
fn build_pipeline(config: &Config) -> Result<DocumentPipeline, StartupError> {
    let extractor = DocumentExtractor::new(
        Box::new(TesseractCli::new(config.ocr_executable.clone())),
        Box::new(PdfiumRenderer::new(config.pdfium_library.clone())),
    )
    .with_render_dpi(config.render_dpi);

    let completion = GeminiClient::from_config(config)?;
    let citation = PubMedClient::from_config(config)?;

    Ok(DocumentPipeline::new(
        Box::new(extractor),
        RiskAnalyzer::new(Box::new(completion)),
        LiteratureEnricher::new(Box::new(citation)).with_max_results(config.max_articles),
    )
    .with_enrichment_workers(config.enrichment_workers)
    .with_dump_dir(config.dump_dir.clone()))
}

fn report_failure(error: &PipelineError) -> ExitCode {
    let code = error.exit_code();
    tracing::debug!(status = ?error.status(), code, "Run failed");
    eprintln!("error: {error}");
    ExitCode::from(u8::try_from(code).unwrap_or(EXIT_OTHER))
}
