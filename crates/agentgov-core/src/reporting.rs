//! Delegation artifacts and machine-parsable status lines.
//!
//! For each logged delegation with an output directory:
//!
//! - `<log_id>-<agent>-<task_type>-output.txt`: the generated content
//! - `<log_id>-<agent>-<task_type>-result.json`: the audit record plus `status`
//! - `<log_id>-<agent>-<task_type>-conflict.json`: divergent second opinions, if any
//!
//! Agent and task type are reduced to `[A-Za-z0-9_.-]` so every artifact is a
//! direct child of the output directory. The consolidator globs
//! `*-result.json`, so only result documents may use that suffix.

use std::io::Write;
use std::path::{Path, PathBuf};

use audit_trail::AuditRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use uuid::Uuid;

pub const RESULT_SUFFIX: &str = "-result.json";
pub const OUTPUT_SUFFIX: &str = "-output.txt";
pub const CONFLICT_SUFFIX: &str = "-conflict.json";
pub const STATUS_SUCCESS: &str = "success";

#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode {path}: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub type ArtifactResult<T> = std::result::Result<T, ArtifactError>;

/// Result document for one delegation outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultFile {
    #[serde(flatten)]
    pub record: AuditRecord,
    pub status: String,
}

impl ResultFile {
    pub fn success(record: AuditRecord) -> Self {
        Self {
            record,
            status: STATUS_SUCCESS.to_string(),
        }
    }
}

/// Paths written for one delegation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactPaths {
    pub output_file: PathBuf,
    pub result_file: PathBuf,
    pub conflict_file: PathBuf,
}

impl ArtifactPaths {
    pub fn new(dir: &Path, log_id: Uuid, agent: &str, task_type: &str) -> Self {
        let stem = format!(
            "{log_id}-{}-{}",
            file_component(agent),
            file_component(task_type)
        );
        Self {
            output_file: dir.join(format!("{stem}{OUTPUT_SUFFIX}")),
            result_file: dir.join(format!("{stem}{RESULT_SUFFIX}")),
            conflict_file: dir.join(format!("{stem}{CONFLICT_SUFFIX}")),
        }
    }
}

/// Map `raw` onto a single file-name component: anything outside
/// `[A-Za-z0-9_.-]` becomes `_`, as does every `..`.
fn file_component(raw: &str) -> String {
    let safe: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let safe = safe.replace("..", "_");
    if safe.is_empty() {
        "_".to_string()
    } else {
        safe
    }
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Content fully written and synced to a temp file next to its target,
/// not yet visible under the target name.
#[derive(Debug)]
pub struct StagedFile {
    tmp: NamedTempFile,
    path: PathBuf,
}

impl StagedFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rename into place.
    pub fn publish(self) -> ArtifactResult<()> {
        let path = self.path;
        self.tmp.persist(&path).map_err(|e| ArtifactError::Write {
            path: path.clone(),
            source: e.error,
        })?;
        Ok(())
    }
}

/// Write `bytes` to a temp file in `path`'s directory, creating it if needed.
pub fn stage(path: &Path, bytes: &[u8]) -> ArtifactResult<StagedFile> {
    let write_err = |source| ArtifactError::Write {
        path: path.to_path_buf(),
        source,
    };
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).map_err(write_err)?;

    let mut tmp = NamedTempFile::new_in(dir).map_err(write_err)?;
    tmp.write_all(bytes).map_err(write_err)?;
    tmp.as_file().sync_all().map_err(write_err)?;
    Ok(StagedFile {
        tmp,
        path: path.to_path_buf(),
    })
}

/// Pretty JSON with a trailing newline, staged for [`StagedFile::publish`].
pub fn stage_json_pretty<T: Serialize>(path: &Path, value: &T) -> ArtifactResult<StagedFile> {
    let mut content = serde_json::to_vec_pretty(value).map_err(|source| ArtifactError::Encode {
        path: path.to_path_buf(),
        source,
    })?;
    content.push(b'\n');
    stage(path, &content)
}

/// Write `bytes` to `path` via a temp file in the same directory.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> ArtifactResult<()> {
    stage(path, bytes)?.publish()
}

/// Pretty JSON, written atomically.
pub fn write_json_pretty<T: Serialize>(path: &Path, value: &T) -> ArtifactResult<()> {
    stage_json_pretty(path, value)?.publish()
}

/// One-line JSON status for calling pipelines.
///
/// Success lines go to stdout; error lines go to stderr and always carry
/// `message` and `timestamp`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusLine {
    pub status: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl StatusLine {
    pub fn new(status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            fields: Map::new(),
        }
    }

    pub fn success() -> Self {
        Self::new(STATUS_SUCCESS)
    }

    pub fn error(message: impl std::fmt::Display) -> Self {
        Self::error_at(message, Utc::now())
    }

    pub fn error_at(message: impl std::fmt::Display, timestamp: DateTime<Utc>) -> Self {
        Self::new("error")
            .with("message", message.to_string())
            .with("timestamp", timestamp.to_rfc3339())
    }

    /// Non-fatal abort of a delegation.
    pub fn aborted(state: impl std::fmt::Display, message: impl std::fmt::Display) -> Self {
        Self::new("aborted")
            .with("state", state.to_string())
            .with("message", message.to_string())
            .with("timestamp", Utc::now().to_rfc3339())
    }

    /// Add a field. Values that fail to serialise are recorded as `null`.
    pub fn with(mut self, key: &str, value: impl Serialize) -> Self {
        let value = serde_json::to_value(value).unwrap_or(Value::Null);
        self.fields.insert(key.to_string(), value);
        self
    }

    pub fn render(&self) -> String {
        serde_json::to_string(self)
            .unwrap_or_else(|_| format!("{{\"status\":\"{}\"}}", self.status))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use audit_trail::{ActionDescriptor, ConfidenceAssessment};
    use serde_json::json;

    fn record() -> AuditRecord {
        AuditRecord::new(
            "pr-7",
            "openai",
            ActionDescriptor::new("code_review", "Performed code_review on PR #7."),
            ConfidenceAssessment::from_score(0.95, "clear"),
            Vec::new(),
        )
    }

    #[test]
    fn result_file_flattens_record_and_adds_status() {
        let value = serde_json::to_value(ResultFile::success(record())).unwrap();
        for key in ["log_id", "timestamp", "task_id", "agent_id", "action", "confidence", "flags"] {
            assert!(value.get(key).is_some(), "missing {key}");
        }
        assert_eq!(value["status"], "success");
        assert_eq!(value["flags"]["human_oversight_required"], false);

        let back: ResultFile = serde_json::from_value(value).unwrap();
        assert_eq!(back.record.task_id, "pr-7");
    }

    #[test]
    fn artifact_names_replace_spaces() {
        let id = Uuid::parse_str("11111111-1111-1111-1111-111111111111").unwrap();
        let paths = ArtifactPaths::new(Path::new("out"), id, "ollama", "code review");
        assert_eq!(
            paths.result_file,
            Path::new("out/11111111-1111-1111-1111-111111111111-ollama-code_review-result.json")
        );
        assert!(paths
            .output_file
            .to_string_lossy()
            .ends_with("-ollama-code_review-output.txt"));
    }

    #[test]
    fn artifact_names_stay_inside_the_output_dir() {
        let id = Uuid::parse_str("11111111-1111-1111-1111-111111111111").unwrap();
        let dir = Path::new("out");
        for (agent, task_type) in [
            ("ollama", "security/review"),
            ("ollama", "../../escaped"),
            ("../agent", "a\\b"),
            ("ollama", ""),
        ] {
            let paths = ArtifactPaths::new(dir, id, agent, task_type);
            for file in [&paths.output_file, &paths.result_file, &paths.conflict_file] {
                assert_eq!(file.parent(), Some(dir), "{} escaped", file.display());
                let name = file.file_name().unwrap().to_string_lossy();
                assert!(name.starts_with("11111111-1111-1111-1111-111111111111-"));
                assert!(!name.contains(".."), "{name}");
            }
        }

        let paths = ArtifactPaths::new(dir, id, "ollama", "security/review");
        assert!(paths
            .result_file
            .to_string_lossy()
            .ends_with("-ollama-security_review-result.json"));
    }

    #[test]
    fn staged_file_is_invisible_until_published() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x-result.json");
        let staged = stage_json_pretty(&path, &json!({ "ok": true })).unwrap();
        assert_eq!(staged.path(), path);
        assert!(!path.exists());

        staged.publish().unwrap();
        assert!(std::fs::read_to_string(&path).unwrap().ends_with('\n'));
    }

    #[test]
    fn publishing_over_a_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("taken");
        std::fs::create_dir_all(path.join("inner")).unwrap();
        let staged = stage(&path, b"data").unwrap();
        assert!(matches!(staged.publish(), Err(ArtifactError::Write { .. })));
    }

    #[test]
    fn atomic_write_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deeper/report.json");
        write_json_pretty(&path, &json!({ "ok": true })).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.ends_with('\n'));
        assert_eq!(serde_json::from_str::<Value>(&text).unwrap()["ok"], true);
    }

    #[test]
    fn sha256_is_lower_hex() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn status_lines_render_flat_json() {
        let line = StatusLine::success()
            .with("agent", "openai")
            .with("log_file", "out/x-result.json");
        let value: Value = serde_json::from_str(&line.render()).unwrap();
        assert_eq!(
            value,
            json!({ "status": "success", "agent": "openai", "log_file": "out/x-result.json" })
        );

        let ts = DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let value: Value =
            serde_json::from_str(&StatusLine::error_at("boom", ts).render()).unwrap();
        assert_eq!(value["status"], "error");
        assert_eq!(value["message"], "boom");
        assert_eq!(value["timestamp"], "2026-01-01T00:00:00+00:00");
    }
}
