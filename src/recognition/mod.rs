//! Face lookups against the image store.
//!
//! Detection, embedding and distance computation happen in an external
//! [`RecognitionService`]. The gateway only guards the call (empty store, timeout)
//! and reduces the candidates the service reports to a single best match.

pub mod command;

use std::{
    cmp::Ordering,
    fmt,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::RecognitionConfig;
use crate::store::{ImageStore, StoreError};

pub use command::CommandRecognizer;

/// Score metric used by the recognition backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Metric {
    /// Reported as a similarity: higher scores are closer matches.
    #[serde(rename = "cosine")]
    Cosine,
    #[serde(rename = "euclidean")]
    Euclidean,
    #[serde(rename = "euclidean_l2")]
    EuclideanL2,
}

impl Metric {
    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Cosine => "cosine",
            Metric::Euclidean => "euclidean",
            Metric::EuclideanL2 => "euclidean_l2",
        }
    }

    pub fn higher_is_better(&self) -> bool {
        matches!(self, Metric::Cosine)
    }

    /// Orders two scores so that the better one comes first.
    pub fn compare(&self, a: f64, b: f64) -> Ordering {
        if self.higher_is_better() {
            b.total_cmp(&a)
        } else {
            a.total_cmp(&b)
        }
    }

    /// Whether `score` is on the accepting side of `threshold` (inclusive).
    pub fn passes(&self, score: f64, threshold: f64) -> bool {
        if self.higher_is_better() {
            score >= threshold
        } else {
            score <= threshold
        }
    }
}

/// Embedding model the backend is deployed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Model {
    #[serde(rename = "VGG-Face")]
    VggFace,
    #[serde(rename = "Facenet")]
    Facenet,
    #[serde(rename = "Facenet512")]
    Facenet512,
    #[serde(rename = "OpenFace")]
    OpenFace,
    #[serde(rename = "DeepFace")]
    DeepFace,
    #[serde(rename = "DeepID")]
    DeepId,
    #[serde(rename = "ArcFace")]
    ArcFace,
    #[serde(rename = "Dlib")]
    Dlib,
    #[serde(rename = "SFace")]
    SFace,
}

impl Model {
    pub fn as_str(&self) -> &'static str {
        match self {
            Model::VggFace => "VGG-Face",
            Model::Facenet => "Facenet",
            Model::Facenet512 => "Facenet512",
            Model::OpenFace => "OpenFace",
            Model::DeepFace => "DeepFace",
            Model::DeepId => "DeepID",
            Model::ArcFace => "ArcFace",
            Model::Dlib => "Dlib",
            Model::SFace => "SFace",
        }
    }
}

/// Face detector backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Detector {
    Opencv,
    Ssd,
    Dlib,
    Mtcnn,
    Retinaface,
    Mediapipe,
}

impl Detector {
    pub fn as_str(&self) -> &'static str {
        match self {
            Detector::Opencv => "opencv",
            Detector::Ssd => "ssd",
            Detector::Dlib => "dlib",
            Detector::Mtcnn => "mtcnn",
            Detector::Retinaface => "retinaface",
            Detector::Mediapipe => "mediapipe",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Detector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Deployment-wide backend settings. Never varied per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecognitionSettings {
    pub metric: Metric,
    pub model: Model,
    pub detector: Detector,
}

/// The image to look up, with the extension it was uploaded as.
#[derive(Debug, Clone)]
pub struct QueryImage {
    pub bytes: Vec<u8>,
    pub extension: String,
}

/// One identity the backend judged a match, with its raw score.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Candidate {
    /// File name or path of the matching store image.
    pub identity: String,
    #[serde(alias = "distance")]
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Match {
    /// File name of the winning store member.
    pub name: String,
    pub path: PathBuf,
    pub score: f64,
}

impl Match {
    /// The name without extension, e.g. `alice` for `alice.jpg`.
    pub fn identifier(&self) -> &str {
        Path::new(&self.name).file_stem().and_then(|s| s.to_str()).unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Recognition {
    Match(Match),
    NoMatch,
}

/// External face recognition backend.
///
/// Implementations compare `query` against every image under `store_root` and
/// return all candidates they consider matches, in any order. Any error is final
/// for the request.
#[async_trait]
pub trait RecognitionService: Send + Sync {
    async fn find(
        &self,
        query: &QueryImage,
        store_root: &Path,
        settings: &RecognitionSettings,
    ) -> anyhow::Result<Vec<Candidate>>;
}

pub struct RecognitionGateway {
    service: Arc<dyn RecognitionService>,
    settings: RecognitionSettings,
    threshold: Option<f64>,
    timeout: Duration,
}

impl RecognitionGateway {
    pub fn new(service: Arc<dyn RecognitionService>, cfg: &RecognitionConfig) -> Self {
        Self {
            service,
            settings: RecognitionSettings { metric: cfg.metric, model: cfg.model, detector: cfg.detector },
            threshold: cfg.threshold,
            timeout: Duration::from_secs(cfg.timeout_secs),
        }
    }

    pub fn settings(&self) -> &RecognitionSettings {
        &self.settings
    }

    /// Finds the best match for `query` among the current members of `store`.
    ///
    /// The caller must hold at least a read lock on `store` for the whole call.
    pub async fn recognize(&self, query: &QueryImage, store: &ImageStore) -> Result<Recognition, StoreError> {
        if store.is_empty()? {
            return Err(StoreError::EmptyStore);
        }

        let lookup = self.service.find(query, store.root(), &self.settings);
        let candidates = match tokio::time::timeout(self.timeout, lookup).await {
            Ok(Ok(candidates)) => candidates,
            Ok(Err(e)) => {
                tracing::warn!("Recognition backend failed: {:#}", e);
                return Err(StoreError::RecognitionFailed(format!("{:#}", e)));
            }
            Err(_) => {
                tracing::warn!("Recognition backend timed out after {:?}", self.timeout);
                return Err(StoreError::RecognitionTimeout(self.timeout.as_secs()));
            }
        };

        let reported = candidates.len();
        let Some(best) = select_best(candidates, self.settings.metric, self.threshold) else {
            tracing::debug!("No match among {} reported candidate(s)", reported);
            return Ok(Recognition::NoMatch);
        };

        let name = Path::new(&best.identity)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(&best.identity)
            .to_string();
        let path = store.root().join(&name);
        Ok(Recognition::Match(Match { name, path, score: best.score }))
    }
}

/// Sorts candidates best first for `metric`, dropping NaN scores.
///
/// Equal scores are ordered by identity so the result does not depend on the
/// order the backend reported them in.
pub fn rank_candidates(mut candidates: Vec<Candidate>, metric: Metric) -> Vec<Candidate> {
    candidates.retain(|c| !c.score.is_nan());
    candidates.sort_by(|a, b| metric.compare(a.score, b.score).then_with(|| a.identity.cmp(&b.identity)));
    candidates
}

/// The top-ranked candidate that passes `threshold`, if any.
pub fn select_best(candidates: Vec<Candidate>, metric: Metric, threshold: Option<f64>) -> Option<Candidate> {
    rank_candidates(candidates, metric)
        .into_iter()
        .find(|c| threshold.map_or(true, |t| metric.passes(c.score, t)))
}
