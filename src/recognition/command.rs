//! Recognition backend driven through an external program.
//!
//! The program is invoked once per lookup as
//!
//! ```text
//! <command> [args...] --img-path <query> --db-path <store root>
//!     --model-name <model> --distance-metric <metric> --detector-backend <detector>
//! ```
//!
//! and must print a JSON array of `{"identity": "...", "distance": 0.42}` objects
//! (`score` is accepted in place of `distance`). A non-zero exit status is a failed
//! lookup; its stderr becomes the error message. The program may leave serialized
//! index files in the store root, which the store removes on every mutation.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use tokio::process::Command;
use uuid::Uuid;

use super::{Candidate, QueryImage, RecognitionService, RecognitionSettings};
use crate::config::RecognitionConfig;

const MAX_STDERR_CHARS: usize = 500;

#[derive(Debug, Clone)]
pub struct CommandRecognizer {
    program: String,
    args: Vec<String>,
    scratch_dir: PathBuf,
}

impl CommandRecognizer {
    pub fn new(program: impl Into<String>, args: Vec<String>, scratch_dir: impl Into<PathBuf>) -> Self {
        Self { program: program.into(), args, scratch_dir: scratch_dir.into() }
    }

    pub fn from_config(cfg: &RecognitionConfig) -> Self {
        Self::new(cfg.command.clone(), cfg.args.clone(), cfg.scratch_dir.clone())
    }

    async fn run(
        &self,
        query_path: &Path,
        store_root: &Path,
        settings: &RecognitionSettings,
    ) -> anyhow::Result<Vec<Candidate>> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg("--img-path")
            .arg(query_path)
            .arg("--db-path")
            .arg(store_root)
            .arg("--model-name")
            .arg(settings.model.as_str())
            .arg("--distance-metric")
            .arg(settings.metric.as_str())
            .arg("--detector-backend")
            .arg(settings.detector.as_str())
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .with_context(|| format!("failed to run recognition command {}", self.program))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stderr: String = stderr.trim().chars().take(MAX_STDERR_CHARS).collect();
            return Err(anyhow!("recognition command exited with {}: {}", output.status, stderr));
        }

        parse_candidates(&output.stdout)
    }
}

#[async_trait]
impl RecognitionService for CommandRecognizer {
    async fn find(
        &self,
        query: &QueryImage,
        store_root: &Path,
        settings: &RecognitionSettings,
    ) -> anyhow::Result<Vec<Candidate>> {
        tokio::fs::create_dir_all(&self.scratch_dir)
            .await
            .with_context(|| format!("failed to create scratch dir {}", self.scratch_dir.display()))?;
        // Removed on drop, so a timed out or cancelled lookup leaves nothing behind
        let query_path = tempfile::Builder::new()
            .prefix(&Uuid::new_v4().to_string())
            .suffix(&format!(".{}", query.extension))
            .rand_bytes(0)
            .tempfile_in(&self.scratch_dir)
            .with_context(|| format!("failed to create query image in {}", self.scratch_dir.display()))?
            .into_temp_path();
        tokio::fs::write(&query_path, &query.bytes)
            .await
            .with_context(|| format!("failed to write query image {}", query_path.display()))?;

        let result = self.run(&query_path, store_root, settings).await;

        if let Err(e) = query_path.close() {
            tracing::warn!("Failed to remove query image: {}", e);
        }
        result
    }
}

/// Parses the program's stdout. Empty output means no candidates.
pub fn parse_candidates(stdout: &[u8]) -> anyhow::Result<Vec<Candidate>> {
    let text = std::str::from_utf8(stdout).context("recognition output is not UTF-8")?;
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(text.trim()).context("recognition output is not a JSON candidate list")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_candidates() {
        let out = br#"[{"identity": "data/faces/alice.jpg", "distance": 0.31},
                       {"identity": "bob.png", "score": 0.9}]"#;
        let candidates = parse_candidates(out).unwrap();
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].identity, "data/faces/alice.jpg");
        assert_eq!(candidates[1].score, 0.9);
    }

    #[test]
    fn test_parse_empty_output() {
        assert!(parse_candidates(b"").unwrap().is_empty());
        assert!(parse_candidates(b"  \n").unwrap().is_empty());
        assert!(parse_candidates(b"[]").unwrap().is_empty());
    }

    #[test]
    fn test_parse_garbage_fails() {
        assert!(parse_candidates(b"Traceback (most recent call last)").is_err());
    }

    #[cfg(unix)]
    fn shell(script: &str, scratch: &Path) -> CommandRecognizer {
        CommandRecognizer::new("sh", vec!["-c".into(), script.into(), "sh".into()], scratch)
    }

    #[cfg(unix)]
    fn settings() -> RecognitionSettings {
        use crate::recognition::{Detector, Metric, Model};
        RecognitionSettings { metric: Metric::Cosine, model: Model::ArcFace, detector: Detector::Retinaface }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_runs_program_and_cleans_scratch() {
        let dir = tempfile::TempDir::new().unwrap();
        let scratch = dir.path().join("scratch");
        let recognizer = shell(r#"echo '[{"identity": "alice.jpg", "distance": 0.25}]'"#, &scratch);
        let query = QueryImage { bytes: b"img".to_vec(), extension: "png".into() };

        let candidates = recognizer.find(&query, dir.path(), &settings()).await.unwrap();
        assert_eq!(candidates, vec![Candidate { identity: "alice.jpg".into(), score: 0.25 }]);
        assert_eq!(std::fs::read_dir(&scratch).unwrap().count(), 0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failing_program_reports_stderr() {
        let dir = tempfile::TempDir::new().unwrap();
        let recognizer = shell("echo 'Face could not be detected' >&2; exit 3", &dir.path().join("scratch"));
        let query = QueryImage { bytes: b"img".to_vec(), extension: "jpg".into() };

        let err = recognizer.find(&query, dir.path(), &settings()).await.unwrap_err();
        assert!(format!("{:#}", err).contains("Face could not be detected"));
    }
}
