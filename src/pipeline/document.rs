use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Extensions the pipeline accepts, lowercase, without the dot.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["pdf", "png", "jpg", "jpeg", "tif", "tiff"];

/// Broad input categories we handle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Image,
    Pdf,
}

impl DocumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Pdf => "pdf",
        }
    }

    /// Classify a path by its extension alone. No I/O.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "pdf" => Some(Self::Pdf),
            "png" | "jpg" | "jpeg" | "tif" | "tiff" => Some(Self::Image),
            _ => None,
        }
    }
}

/// A lab report on disk plus its kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    path: PathBuf,
    kind: DocumentKind,
}

impl Document {
    /// Build a document from a path, rejecting unsupported extensions.
    /// Returns the offending extension (possibly empty) on rejection.
    pub fn from_path(path: impl Into<PathBuf>) -> Result<Self, String> {
        let path = path.into();
        match DocumentKind::from_path(&path) {
            Some(kind) => Ok(Self { path, kind }),
            None => Err(extension_label(&path)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn kind(&self) -> DocumentKind {
        self.kind
    }
}

/// Extension as shown in diagnostics: ".bmp", or "(none)".
pub fn extension_label(path: &Path) -> String {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!(".{ext}"),
        None => "(none)".to_string(),
    }
}
