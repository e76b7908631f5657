//! `labrisk --check`: verifies the local toolchain and configuration
//! before a real report is processed.
//!
//! Offline only. Keys are reported as set or unset, never echoed.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::config::Config;
use crate::pipeline::extraction::{ExtractionError, PdfiumRenderer, TesseractCli};

/// Exit code when any required piece is missing.
pub const EXIT_SETUP_INCOMPLETE: u8 = 4;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CheckState {
    Ok,
    /// Usable, but worth fixing.
    Warn,
    /// A run would fail.
    Fail,
}

impl CheckState {
    fn label(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Warn => "warn",
            Self::Fail => "FAIL",
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SetupCheck {
    pub name: &'static str,
    pub state: CheckState,
    pub detail: String,
}

impl SetupCheck {
    fn new(name: &'static str, state: CheckState, detail: impl Into<String>) -> Self {
        Self {
            name,
            state,
            detail: detail.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SetupReport {
    pub checks: Vec<SetupCheck>,
}

impl SetupReport {
    pub fn is_ready(&self) -> bool {
        self.checks.iter().all(|c| c.state != CheckState::Fail)
    }

    pub fn exit_code(&self) -> u8 {
        if self.is_ready() {
            0
        } else {
            EXIT_SETUP_INCOMPLETE
        }
    }

    pub fn get(&self, name: &str) -> Option<&SetupCheck> {
        self.checks.iter().find(|c| c.name == name)
    }
}

impl fmt::Display for SetupReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for check in &self.checks {
            writeln!(f, "{:<5} {:<16} {}", check.state.label(), check.name, check.detail)?;
        }
        if self.is_ready() {
            write!(f, "Ready: labrisk <REPORT>")
        } else {
            write!(f, "Setup incomplete")
        }
    }
}

/// Probe the real backends named by `config`.
pub fn run_setup_check(config: &Config) -> SetupReport {
    let ocr = TesseractCli::new(config.ocr_executable.clone());
    let tesseract = ocr
        .executable()
        .map(Path::to_path_buf)
        .and_then(|path| ocr.version().map(|version| (path, version)));
    let pdfium = PdfiumRenderer::new(config.pdfium_library.clone()).probe();

    evaluate(config, tesseract, pdfium)
}

/// Assemble the report from probe results. Pure, so it can be tested
/// without Tesseract or PDFium installed.
pub fn evaluate(
    config: &Config,
    tesseract: Result<(PathBuf, String), ExtractionError>,
    pdfium: Result<(), ExtractionError>,
) -> SetupReport {
    let mut checks = Vec::new();

    if let Some(path) = config.ocr_executable.as_deref().filter(|p| !p.is_file()) {
        checks.push(SetupCheck::new(
            "TESSERACT_CMD",
            CheckState::Warn,
            format!("path does not exist: {}", path.display()),
        ));
    }

    checks.push(match tesseract {
        Ok((path, version)) => SetupCheck::new(
            "tesseract",
            CheckState::Ok,
            format!("{version} ({})", path.display()),
        ),
        Err(e) => SetupCheck::new("tesseract", CheckState::Fail, e.to_string()),
    });

    checks.push(match pdfium {
        Ok(()) => SetupCheck::new("pdfium", CheckState::Ok, "library loaded"),
        Err(e) => SetupCheck::new("pdfium", CheckState::Fail, e.to_string()),
    });

    checks.push(if config.completion_api_key.is_some() {
        SetupCheck::new(
            "GEMINI_API_KEY",
            CheckState::Ok,
            format!("set (model {})", config.completion_model),
        )
    } else {
        SetupCheck::new(
            "GEMINI_API_KEY",
            CheckState::Fail,
            "not set; required for analysis",
        )
    });

    checks.push(if config.citation_api_key.is_some() {
        SetupCheck::new("NCBI_API_KEY", CheckState::Ok, "set")
    } else {
        SetupCheck::new(
            "NCBI_API_KEY",
            CheckState::Ok,
            "not set; PubMed lookups limited to 3 requests/s",
        )
    });

    for check in &checks {
        tracing::debug!(name = check.name, state = ?check.state, "Setup check");
    }

    SetupReport { checks }
}
