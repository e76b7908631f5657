pub mod types;
pub mod prompt;
pub mod parser;
pub mod gemini;
pub mod orchestrator;

pub use types::*;
pub use prompt::*;
pub use parser::*;
pub use gemini::*;
pub use orchestrator::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("GEMINI_API_KEY environment variable not set")]
    MissingApiKey,

    #[error("Completion service call failed: {0}")]
    ServiceCallFailed(String),

    /// The service answered but the payload is not the promised JSON.
    /// `raw` keeps the untouched text for diagnostics.
    #[error("Completion response not strict JSON: {reason}")]
    MalformedCompletion { raw: String, reason: String },
}
