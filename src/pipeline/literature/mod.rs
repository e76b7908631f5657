pub mod types;
pub mod pubmed;
pub mod enricher;

pub use types::*;
pub use pubmed::*;
pub use enricher::*;

use thiserror::Error;

/// Failures of one literature lookup. Always contained per test.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LiteratureError {
    #[error("Citation service call failed: {0}")]
    ServiceCallFailed(String),

    #[error("Citation response parsing error: {0}")]
    ResponseParsing(String),
}
