//! Integration and unit tests for the facedir application.
//!
//! ## Test Modules
//!
//! - **store_tests**: image store membership, naming and index invalidation
//! - **gateway_tests**: recognition gateway against stub backends
//! - **api_tests**: the faces API end to end through the router
//! - **error_tests**: error display and status mapping
//! - **config_tests**: configuration defaults, loading and validation
//! - **health_api_tests**: health, readiness, metrics and version endpoints

pub mod config_tests;
pub mod error_tests;

/// Shared fixtures.
pub mod support {
    use std::{
        path::Path,
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc,
        },
        time::Duration,
    };

    use async_trait::async_trait;

    use crate::recognition::{Candidate, QueryImage, RecognitionService, RecognitionSettings};
    use crate::store::ImageStore;

    pub fn exts() -> Vec<String> {
        vec!["jpg".into(), "jpeg".into(), "png".into()]
    }

    pub fn patterns() -> Vec<String> {
        vec!["representations_*.pkl".into(), "ds_model_*.pkl".into()]
    }

    pub fn store_at(root: &Path) -> ImageStore {
        ImageStore::with_root(root, &exts(), &patterns()).unwrap()
    }

    /// Scripted recognition backend that counts its invocations.
    pub struct StubService {
        pub candidates: Vec<Candidate>,
        pub fail: Option<String>,
        pub delay: Option<Duration>,
        pub calls: Arc<AtomicUsize>,
    }

    impl StubService {
        pub fn returning(candidates: Vec<(&str, f64)>) -> Self {
            Self {
                candidates: candidates
                    .into_iter()
                    .map(|(identity, score)| Candidate { identity: identity.to_string(), score })
                    .collect(),
                fail: None,
                delay: None,
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }

        pub fn failing(message: &str) -> Self {
            Self { fail: Some(message.to_string()), ..Self::returning(vec![]) }
        }

        pub fn slow(delay: Duration) -> Self {
            Self { delay: Some(delay), ..Self::returning(vec![]) }
        }
    }

    #[async_trait]
    impl RecognitionService for StubService {
        async fn find(
            &self,
            _query: &QueryImage,
            _store_root: &Path,
            _settings: &RecognitionSettings,
        ) -> anyhow::Result<Vec<Candidate>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if let Some(msg) = &self.fail {
                anyhow::bail!("{}", msg);
            }
            Ok(self.candidates.clone())
        }
    }

    pub fn query() -> QueryImage {
        QueryImage { bytes: b"query".to_vec(), extension: "jpg".into() }
    }
}
