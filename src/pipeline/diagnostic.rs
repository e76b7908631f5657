//! Developer diagnostic dump for runs that fail in ways worth inspecting.
//!
//! Today this covers a completion payload that could not be parsed:
//! ```text
//! {dump_dir}/{run_id}/
//!   malformed-completion.txt
//!   malformed-completion.json
//! ```
//!
//! Every writer logs and swallows its own failures. A dump never panics and
//! never replaces the error that triggered it.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

pub const MALFORMED_COMPLETION_TEXT: &str = "malformed-completion.txt";
pub const MALFORMED_COMPLETION_META: &str = "malformed-completion.json";

/// Returns the dump directory for a run, creating it on first use.
/// `None` (with a warning) when the directory cannot be created.
pub fn dump_dir_for(base: &Path, run_id: &Uuid) -> Option<PathBuf> {
    let dir = base.join(run_id.to_string());

    if let Err(e) = std::fs::create_dir_all(&dir) {
        tracing::warn!(
            path = %dir.display(),
            error = %e,
            "Diagnostic dump: failed to create directory"
        );
        return None;
    }

    Some(dir)
}

/// Write a JSON artifact, pretty-printed.
pub fn dump_json<T: Serialize>(dir: &Path, filename: &str, value: &T) {
    let path = dir.join(filename);
    match serde_json::to_string_pretty(value) {
        Ok(json) => match std::fs::write(&path, json.as_bytes()) {
            Ok(()) => tracing::debug!(
                path = %path.display(),
                size = json.len(),
                "Diagnostic dump: JSON written"
            ),
            Err(e) => tracing::warn!(
                path = %path.display(),
                error = %e,
                "Diagnostic dump: failed to write JSON"
            ),
        },
        Err(e) => tracing::warn!(
            path = %path.display(),
            error = %e,
            "Diagnostic dump: failed to serialize JSON"
        ),
    }
}

/// Write a text artifact verbatim.
pub fn dump_text(dir: &Path, filename: &str, text: &str) {
    let path = dir.join(filename);
    match std::fs::write(&path, text.as_bytes()) {
        Ok(()) => tracing::debug!(
            path = %path.display(),
            size = text.len(),
            "Diagnostic dump: text written"
        ),
        Err(e) => tracing::warn!(
            path = %path.display(),
            error = %e,
            "Diagnostic dump: failed to write text"
        ),
    }
}

#[derive(Debug, Serialize)]
struct MalformedCompletionMeta<'a> {
    run_id: Uuid,
    recorded_at: DateTime<Utc>,
    parse_error: &'a str,
    length: usize,
}

/// Persist an unparsable completion payload next to a small metadata file.
/// Returns the run directory when it could be created.
pub fn dump_malformed_completion(
    base: &Path,
    run_id: &Uuid,
    raw: &str,
    reason: &str,
) -> Option<PathBuf> {
    let dir = dump_dir_for(base, run_id)?;

    dump_text(&dir, MALFORMED_COMPLETION_TEXT, raw);
    dump_json(
        &dir,
        MALFORMED_COMPLETION_META,
        &MalformedCompletionMeta {
            run_id: *run_id,
            recorded_at: Utc::now(),
            parse_error: reason,
            length: raw.len(),
        },
    );

    tracing::info!(path = %dir.display(), "Malformed completion saved for inspection");
    Some(dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dump_dir_for_creates_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let run_id = Uuid::new_v4();

        let dir = dump_dir_for(tmp.path(), &run_id).unwrap();

        assert!(dir.exists());
        assert!(dir.ends_with(run_id.to_string()));
    }

    #[test]
    fn dump_dir_for_unwritable_base_is_none() {
        let tmp = tempfile::tempdir().unwrap();
        // A regular file cannot hold subdirectories
        let blocker = tmp.path().join("not-a-dir");
        std::fs::write(&blocker, b"x").unwrap();

        assert!(dump_dir_for(&blocker, &Uuid::new_v4()).is_none());
    }

    #[test]
    fn dump_json_writes_pretty_json() {
        let tmp = tempfile::tempdir().unwrap();

        #[derive(Serialize)]
        struct Info {
            name: String,
            value: u32,
        }

        dump_json(
            tmp.path(),
            "info.json",
            &Info {
                name: "test".to_string(),
                value: 42,
            },
        );

        let content = std::fs::read_to_string(tmp.path().join("info.json")).unwrap();
        assert!(content.contains("\"name\": \"test\""));
        assert!(content.contains("\"value\": 42"));
        assert!(content.contains('\n'));
    }

    #[test]
    fn writers_survive_missing_directory() {
        let bad_dir = Path::new("/nonexistent/path/that/does/not/exist");
        dump_text(bad_dir, "raw.txt", "data");
        dump_json(bad_dir, "meta.json", &"data");
    }

    #[test]
    fn malformed_completion_writes_both_files() {
        let tmp = tempfile::tempdir().unwrap();
        let run_id = Uuid::new_v4();
        let raw = "Sure! Here is the analysis you asked for";

        let dir = dump_malformed_completion(tmp.path(), &run_id, raw, "expected value at line 1")
            .unwrap();

        let text = std::fs::read_to_string(dir.join(MALFORMED_COMPLETION_TEXT)).unwrap();
        assert_eq!(text, raw);

        let meta: serde_json::Value = serde_json::from_str(
            &std::fs::read_to_string(dir.join(MALFORMED_COMPLETION_META)).unwrap(),
        )
        .unwrap();
        assert_eq!(meta["parse_error"], "expected value at line 1");
        assert_eq!(meta["length"], raw.len());
        assert_eq!(meta["run_id"], run_id.to_string());
        assert!(meta["recorded_at"].is_string());
    }
}
