//! Concurrent classification of many files.
//!
//! Each path is classified on a bounded `rayon` pool and its result is sent
//! back over a channel to the calling thread. Results arrive in completion
//! order, not input order.

use crate::classify::DomainClassifier;
use crate::config::PipelineConfig;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;
use tracing::{debug, warn};

/// A classified file. `label` is `None` when the origin is unknown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassificationResult {
    pub path: PathBuf,
    pub label: Option<String>,
}

/// Runs a [`DomainClassifier`] over a set of files in parallel.
pub struct ClassificationPipeline {
    classifier: DomainClassifier,
    pool: Option<ThreadPool>,
}

impl ClassificationPipeline {
    pub fn new(classifier: DomainClassifier, config: PipelineConfig) -> Self {
        let parallelism = thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        let workers = config.worker_count(parallelism);

        let pool = match ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("reshelf-classify-{i}"))
            .build()
        {
            Ok(pool) => Some(pool),
            Err(e) => {
                warn!(error = %e, "worker pool unavailable, classifying sequentially");
                None
            }
        };
        debug!(workers, "classification pipeline ready");

        Self { classifier, pool }
    }

    pub fn classifier(&self) -> &DomainClassifier {
        &self.classifier
    }

    /// Classifies every path. The returned results are unordered.
    pub fn classify_all(&self, paths: &[PathBuf]) -> Vec<ClassificationResult> {
        self.classify_all_with(paths, |_| {})
    }

    /// Like [`classify_all`](Self::classify_all), calling `on_result` on the
    /// calling thread as each result comes in.
    pub fn classify_all_with<F>(&self, paths: &[PathBuf], mut on_result: F) -> Vec<ClassificationResult>
    where
        F: FnMut(&ClassificationResult),
    {
        let mut results = Vec::with_capacity(paths.len());

        let Some(pool) = &self.pool else {
            for path in paths {
                let result = self.classify_one(path);
                on_result(&result);
                results.push(result);
            }
            return results;
        };

        let (tx, rx) = mpsc::channel();
        pool.in_place_scope(|scope| {
            for path in paths {
                let tx = tx.clone();
                scope.spawn(move |_| {
                    // The receiver outlives the scope, so a send cannot fail.
                    let _ = tx.send(self.classify_one(path));
                });
            }
            drop(tx);

            for result in rx.iter() {
                on_result(&result);
                results.push(result);
            }
        });

        results
    }

    fn classify_one(&self, path: &Path) -> ClassificationResult {
        let label = panic::catch_unwind(AssertUnwindSafe(|| self.classifier.classify(path)))
            .unwrap_or_else(|_| {
                warn!(path = %path.display(), "classification panicked");
                None
            });
        ClassificationResult {
            path: path.to_path_buf(),
            label,
        }
    }
}
