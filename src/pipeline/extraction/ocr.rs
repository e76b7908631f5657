use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::OnceLock;

use super::types::OcrEngine;
use super::ExtractionError;

#[cfg(windows)]
const TESSERACT_BINARY: &str = "tesseract.exe";
#[cfg(not(windows))]
const TESSERACT_BINARY: &str = "tesseract";

const INSTALL_HINT: &str = "Install Tesseract OCR (https://github.com/tesseract-ocr/tesseract), \
     then add it to PATH or set TESSERACT_CMD to the full path of the executable";

/// Tesseract OCR driven through its command-line executable.
///
/// Images are piped through stdin and text is read from stdout, so no
/// temporary files are written. The executable is resolved once, on first
/// use: an explicit override wins when it exists, otherwise `PATH` is searched.
pub struct TesseractCli {
    override_path: Option<PathBuf>,
    lang: String,
    resolved: OnceLock<Result<PathBuf, String>>,
}

impl TesseractCli {
    pub fn new(override_path: Option<PathBuf>) -> Self {
        Self {
            override_path,
            lang: "eng".to_string(),
            resolved: OnceLock::new(),
        }
    }

    /// Set language(s) for OCR (e.g., "eng", "eng+fra")
    pub fn with_languages(mut self, langs: &str) -> Self {
        self.lang = langs.to_string();
        self
    }

    /// Path of the executable that will be invoked.
    pub fn executable(&self) -> Result<&Path, ExtractionError> {
        self.resolved
            .get_or_init(|| resolve_executable(self.override_path.as_deref()))
            .as_deref()
            .map_err(|reason| ExtractionError::BackendUnavailable(reason.to_string()))
    }
}

impl TesseractCli {
    /// First line of `tesseract --version`, proving the executable runs.
    pub fn version(&self) -> Result<String, ExtractionError> {
        let executable = self.executable()?;
        let output = Command::new(executable)
            .arg("--version")
            .output()
            .map_err(|e| {
                ExtractionError::BackendUnavailable(format!(
                    "Failed to start {}: {e}",
                    executable.display()
                ))
            })?;

        if !output.status.success() {
            return Err(ExtractionError::OcrProcessing(format!(
                "Tesseract --version exited with {}",
                output.status
            )));
        }

        // Older releases print the banner on stderr
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        Ok(stdout
            .lines()
            .chain(stderr.lines())
            .map(str::trim)
            .find(|line| !line.is_empty())
            .unwrap_or("tesseract (unknown version)")
            .to_string())
    }
}

fn resolve_executable(override_path: Option<&Path>) -> Result<PathBuf, String> {
    if let Some(path) = override_path {
        if path.is_file() {
            tracing::debug!(path = %path.display(), "Using configured Tesseract executable");
            return Ok(path.to_path_buf());
        }
        tracing::warn!(
            path = %path.display(),
            "Configured Tesseract executable not found, searching PATH"
        );
    }

    let path_var = std::env::var_os("PATH").unwrap_or_default();
    find_on_path(TESSERACT_BINARY, &path_var)
        .ok_or_else(|| format!("Tesseract executable not found. {INSTALL_HINT}"))
}

/// Search a PATH-style list of directories for an executable file.
fn find_on_path(binary: &str, path_var: &std::ffi::OsStr) -> Option<PathBuf> {
    std::env::split_paths(path_var)
        .map(|dir| dir.join(binary))
        .find(|candidate| candidate.is_file())
}

impl OcrEngine for TesseractCli {
    fn ocr_image(&self, image_bytes: &[u8]) -> Result<String, ExtractionError> {
        let executable = self.executable()?;

        let mut child = Command::new(executable)
            .args(["stdin", "stdout", "-l", &self.lang])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                ExtractionError::BackendUnavailable(format!(
                    "Failed to start {}: {e}",
                    executable.display()
                ))
            })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| ExtractionError::OcrProcessing("Tesseract stdin unavailable".into()))?;

        // Feed stdin from a second thread so a full stdout pipe cannot stall us.
        let output = std::thread::scope(|scope| {
            let writer = scope.spawn(move || stdin.write_all(image_bytes));
            let output = child.wait_with_output();
            let written = writer
                .join()
                .unwrap_or_else(|_| Err(std::io::Error::other("stdin writer panicked")));
            (written, output)
        });

        let output = match output {
            (_, Err(e)) => return Err(ExtractionError::OcrProcessing(e.to_string())),
            (Err(e), Ok(out)) if !out.status.success() => {
                return Err(ExtractionError::OcrProcessing(format!(
                    "Tesseract exited with {} after stdin error {e}: {}",
                    out.status,
                    String::from_utf8_lossy(&out.stderr).trim()
                )))
            }
            (_, Ok(out)) => out,
        };

        if !output.status.success() {
            return Err(ExtractionError::OcrProcessing(format!(
                "Tesseract exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let text = String::from_utf8_lossy(&output.stdout).into_owned();
        tracing::debug!(
            input_size = image_bytes.len(),
            chars = text.len(),
            "Tesseract recognized page"
        );
        Ok(text)
    }
}

/// Mock OCR engine for unit testing without Tesseract.
///
/// Returns one configured text per call, in order; once the list is
/// exhausted the last entry repeats. Counts invocations.
pub struct MockOcrEngine {
    pages: Vec<String>,
    calls: AtomicUsize,
}

impl MockOcrEngine {
    pub fn new(text: &str) -> Self {
        Self::with_pages(&[text])
    }

    pub fn with_pages(pages: &[&str]) -> Self {
        Self {
            pages: pages.iter().map(|p| p.to_string()).collect(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl OcrEngine for MockOcrEngine {
    fn ocr_image(&self, _image_bytes: &[u8]) -> Result<String, ExtractionError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let idx = call.min(self.pages.len().saturating_sub(1));
        Ok(self.pages.get(idx).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_ocr_returns_configured_text() {
        let engine = MockOcrEngine::new("LDL Cholesterol 165 mg/dL");
        let text = engine.ocr_image(b"fake_image_bytes").unwrap();
        assert_eq!(text, "LDL Cholesterol 165 mg/dL");
        assert_eq!(engine.calls(), 1);
    }

    #[test]
    fn mock_ocr_walks_pages_then_repeats_last() {
        let engine = MockOcrEngine::with_pages(&["one", "two"]);
        assert_eq!(engine.ocr_image(b"").unwrap(), "one");
        assert_eq!(engine.ocr_image(b"").unwrap(), "two");
        assert_eq!(engine.ocr_image(b"").unwrap(), "two");
        assert_eq!(engine.calls(), 3);
    }

    #[test]
    fn find_on_path_locates_file() {
        let dir = tempfile::tempdir().unwrap();
        let bin = dir.path().join(TESSERACT_BINARY);
        std::fs::write(&bin, b"").unwrap();

        let path_var = std::env::join_paths([Path::new("/nonexistent"), dir.path()]).unwrap();
        assert_eq!(find_on_path(TESSERACT_BINARY, &path_var), Some(bin));
    }

    #[test]
    fn find_on_path_misses() {
        let dir = tempfile::tempdir().unwrap();
        let path_var = std::env::join_paths([dir.path()]).unwrap();
        assert!(find_on_path(TESSERACT_BINARY, &path_var).is_none());
    }

    #[test]
    fn override_path_wins_when_present() {
        let dir = tempfile::tempdir().unwrap();
        let bin = dir.path().join("my-tesseract");
        std::fs::write(&bin, b"").unwrap();

        let engine = TesseractCli::new(Some(bin.clone()));
        assert_eq!(engine.executable().unwrap(), bin.as_path());
    }

    #[test]
    fn missing_override_falls_back_to_path_search() {
        let resolved = resolve_executable(Some(Path::new("/nonexistent/tesseract-xyz")));
        // Either PATH has tesseract or the lookup fails with install guidance.
        match resolved {
            Ok(path) => assert!(path.ends_with(TESSERACT_BINARY)),
            Err(msg) => assert!(msg.contains("TESSERACT_CMD")),
        }
    }

    #[cfg(unix)]
    #[test]
    fn unstartable_executable_is_backend_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        // Exists but is not executable.
        let bin = dir.path().join("tesseract");
        std::fs::write(&bin, b"not a program").unwrap();

        let engine = TesseractCli::new(Some(bin));
        let err = engine.ocr_image(b"png").unwrap_err();
        assert!(matches!(err, ExtractionError::BackendUnavailable(_)));
    }

    #[test]
    fn languages_are_configurable() {
        let engine = TesseractCli::new(None).with_languages("eng+fra");
        assert_eq!(engine.lang, "eng+fra");
    }

    #[cfg(unix)]
    fn fake_tesseract(dir: &tempfile::TempDir, script: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let bin = dir.path().join("tesseract");
        std::fs::write(&bin, script).unwrap();
        std::fs::set_permissions(&bin, std::fs::Permissions::from_mode(0o755)).unwrap();
        bin
    }

    #[cfg(unix)]
    #[test]
    fn version_reports_first_banner_line() {
        let dir = tempfile::tempdir().unwrap();
        let bin = fake_tesseract(&dir, "#!/bin/sh\necho 'tesseract 5.3.4'\necho ' leptonica-1.84.1'\n");

        let engine = TesseractCli::new(Some(bin));
        assert_eq!(engine.version().unwrap(), "tesseract 5.3.4");
    }

    #[cfg(unix)]
    #[test]
    fn version_failure_is_ocr_processing() {
        let dir = tempfile::tempdir().unwrap();
        let bin = fake_tesseract(&dir, "#!/bin/sh\nexit 3\n");

        let engine = TesseractCli::new(Some(bin));
        assert!(matches!(
            engine.version().unwrap_err(),
            ExtractionError::OcrProcessing(_)
        ));
    }
}
