pub mod config;
pub mod pipeline;
pub mod setup_check;

use tracing_subscriber::EnvFilter;

pub use config::Config;
pub use pipeline::processor::{
    DocumentPipeline, InputError, PipelineError, PipelineOutcome, PipelineStatus,
};

/// Install the global tracing subscriber. Logs go to stderr so stdout
/// carries only the report.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .with_writer(std::io::stderr)
        .init();
}
