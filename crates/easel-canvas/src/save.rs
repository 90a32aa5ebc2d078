//! Saving the canvas: written straight away when online, deferred otherwise.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use easel_common::{EaselError, ResultExt};
use easel_sw::{OfflineWorker, Registration, SaveTask};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::Canvas;

/// File name of the exported image.
pub const DEFAULT_FILE_NAME: &str = "canvas_image.png";

/// Shown when the save is deferred.
pub const OFFLINE_MESSAGE: &str =
    "You are offline. Your image will be saved once you are back online!";

/// What pressing "save" did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// The PNG was written to this path.
    Written(PathBuf),
    /// Offline: the image is stashed and the save task registered.
    Deferred {
        message: &'static str,
        registration: Registration,
    },
}

/// Deferred save body: writes the most recently stashed PNG.
#[derive(Debug)]
pub struct DeferredPngWrite {
    output: PathBuf,
    latency: Duration,
    stash: Mutex<Option<Vec<u8>>>,
}

impl DeferredPngWrite {
    pub fn new(output: impl Into<PathBuf>) -> Self {
        Self {
            output: output.into(),
            latency: Duration::ZERO,
            stash: Mutex::new(None),
        }
    }

    /// Wait this long before writing.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Keep `png` for the next run. A newer stash replaces an older one.
    pub async fn stash(&self, png: Vec<u8>) {
        *self.stash.lock().await = Some(png);
    }

    pub async fn has_stash(&self) -> bool {
        self.stash.lock().await.is_some()
    }
}

#[async_trait]
impl SaveTask for DeferredPngWrite {
    async fn run(&self) -> easel_common::Result<()> {
        tokio::time::sleep(self.latency).await;

        let mut stash = self.stash.lock().await;
        let png = stash
            .as_ref()
            .ok_or_else(|| EaselError::NotFound("stashed image".into()))?;
        write_png(&self.output, png).await?;
        info!(path = %self.output.display(), bytes = png.len(), "Deferred image written");
        *stash = None;
        Ok(())
    }
}

async fn write_png(path: &Path, png: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, png).await
}

/// The "save" button.
#[derive(Debug, Clone)]
pub struct SaveAction {
    output: PathBuf,
    deferred: Arc<DeferredPngWrite>,
}

impl SaveAction {
    /// Save to `dir/canvas_image.png`.
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self::to_file(dir.as_ref().join(DEFAULT_FILE_NAME))
    }

    /// Save to an explicit file.
    pub fn to_file(output: impl Into<PathBuf>) -> Self {
        let output = output.into();
        Self {
            deferred: Arc::new(DeferredPngWrite::new(output.clone())),
            output,
        }
    }

    /// Give the deferred write a fixed latency.
    pub fn with_latency(self, latency: Duration) -> Self {
        let deferred = DeferredPngWrite::new(self.output.clone()).with_latency(latency);
        Self {
            output: self.output,
            deferred: Arc::new(deferred),
        }
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Task to register on the worker with `OfflineWorkerBuilder::save_task`.
    pub fn deferred(&self) -> Arc<DeferredPngWrite> {
        self.deferred.clone()
    }

    /// Export `canvas` and either write it now or hand it to `worker`.
    pub async fn save(
        &self,
        canvas: &Canvas,
        online: bool,
        worker: &OfflineWorker,
    ) -> easel_common::Result<SaveOutcome> {
        let png = canvas.to_png()?;

        if online {
            write_png(&self.output, &png)
                .await
                .context(format!("writing {}", self.output.display()))?;
            info!(path = %self.output.display(), bytes = png.len(), "Image saved");
            return Ok(SaveOutcome::Written(self.output.clone()));
        }

        debug!("User is offline, saving image for background sync");
        self.deferred.stash(png).await;
        let registration = worker.enqueue(&worker.config().sync_task_name);
        Ok(SaveOutcome::Deferred {
            message: OFFLINE_MESSAGE,
            registration,
        })
    }
}
