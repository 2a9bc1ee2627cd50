//! Artifact upload in three ordered phases.

use indicatif::{HumanBytes, HumanDuration};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tracing::{debug, info};

use crate::error::{Result, ShipError, UploadError};

use super::artifacts::ArtifactSet;
use super::store::ObjectStore;
use super::task::UploadTask;

/// Default number of assets uploaded at once.
pub const DEFAULT_BATCH_SIZE: usize = 10;

/// What an upload run did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UploadReport {
    /// Number of child templates uploaded.
    pub templates: usize,
    /// Size of the code package in bytes.
    pub code_bytes: u64,
    /// Number of assets uploaded.
    pub assets: usize,
    /// Size of each asset batch, in order.
    pub asset_batches: Vec<usize>,
    /// Wall time of each phase.
    pub phases: PhaseTimings,
    /// Wall time of the whole upload.
    #[serde(with = "duration_secs")]
    pub elapsed: Duration,
}

/// Wall time of each upload phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PhaseTimings {
    /// Child templates.
    #[serde(with = "duration_secs")]
    pub templates: Duration,
    /// Code package.
    #[serde(with = "duration_secs")]
    pub code: Duration,
    /// Static assets.
    #[serde(with = "duration_secs")]
    pub assets: Duration,
}

mod duration_secs {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }
}

/// Uploads templates, then the code package, then assets in batches.
pub struct ArtifactUploader {
    /// Destination store.
    store: Arc<dyn ObjectStore>,
    /// Assets in flight per batch.
    batch_size: usize,
}

impl std::fmt::Debug for ArtifactUploader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArtifactUploader")
            .field("bucket", &self.store.bucket())
            .field("batch_size", &self.batch_size)
            .finish()
    }
}

impl ArtifactUploader {
    /// Creates an uploader. A zero batch size is treated as one.
    #[must_use]
    pub fn new(store: Arc<dyn ObjectStore>, batch_size: usize) -> Self {
        Self {
            store,
            batch_size: batch_size.max(1),
        }
    }

    /// Uploads the whole set. The first failure aborts the run.
    ///
    /// # Errors
    ///
    /// Returns the first upload error.
    pub async fn upload(&self, artifacts: &ArtifactSet) -> Result<UploadReport> {
        let start = Instant::now();
        let mut phases = PhaseTimings::default();

        let phase = Instant::now();
        let templates = self.upload_templates(&artifacts.templates).await?;
        phases.templates = phase.elapsed();

        let phase = Instant::now();
        let code_bytes = match &artifacts.code {
            Some(task) => self.upload_code(task).await?,
            None => 0,
        };
        phases.code = phase.elapsed();

        let phase = Instant::now();
        let asset_batches = self.upload_assets(&artifacts.assets).await?;
        phases.assets = phase.elapsed();

        Ok(UploadReport {
            templates,
            code_bytes,
            assets: asset_batches.iter().sum(),
            asset_batches,
            phases,
            elapsed: start.elapsed(),
        })
    }

    /// Uploads child templates one after another.
    ///
    /// # Errors
    ///
    /// Returns the first upload error.
    pub async fn upload_templates(&self, tasks: &[UploadTask]) -> Result<usize> {
        info!(
            "Uploading {} child templates to s3://{}",
            tasks.len(),
            self.store.bucket()
        );

        let start = Instant::now();
        for task in tasks {
            debug!("Uploading template {}", task.remote_key);
            self.store.put_file(task).await?;
        }
        info!("Time to upload templates: {}", HumanDuration(start.elapsed()));

        Ok(tasks.len())
    }

    /// Uploads the code package and returns its size.
    ///
    /// # Errors
    ///
    /// Returns an error if the package cannot be read or uploaded.
    pub async fn upload_code(&self, task: &UploadTask) -> Result<u64> {
        let size = tokio::fs::metadata(&task.local_path)
            .await
            .map_err(|e| UploadError::Read {
                path: task.local_path.clone(),
                message: e.to_string(),
            })?
            .len();

        info!(
            "Uploading {} ({}) to s3://{}/{}",
            task.local_path.display(),
            HumanBytes(size),
            self.store.bucket(),
            task.remote_key
        );

        let start = Instant::now();
        self.store.put_file(task).await?;
        info!("Time to upload code: {}", HumanDuration(start.elapsed()));

        Ok(size)
    }

    /// Uploads assets in batches. All tasks of a batch run concurrently and
    /// the next batch starts only once every task of the current one is done.
    ///
    /// # Errors
    ///
    /// Returns the first error of the first failing batch; later batches are
    /// never started.
    pub async fn upload_assets(&self, tasks: &[UploadTask]) -> Result<Vec<usize>> {
        info!("Uploading {} public assets", tasks.len());
        let start = Instant::now();
        let mut batches = Vec::new();

        for (index, chunk) in tasks.chunks(self.batch_size).enumerate() {
            debug!("Asset batch {} ({} files)", index + 1, chunk.len());

            let mut workers = JoinSet::new();
            for task in chunk {
                let store = Arc::clone(&self.store);
                let task = task.clone();
                workers.spawn(async move { store.put_file(&task).await });
            }

            let mut first_error: Option<ShipError> = None;
            while let Some(joined) = workers.join_next().await {
                let outcome = match joined {
                    Ok(result) => result,
                    Err(e) => Err(UploadError::Worker {
                        message: e.to_string(),
                    }
                    .into()),
                };
                if let Err(e) = outcome {
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }

            if let Some(e) = first_error {
                return Err(e);
            }
            batches.push(chunk.len());
        }

        info!("Time to upload public assets: {}", HumanDuration(start.elapsed()));
        Ok(batches)
    }
}
