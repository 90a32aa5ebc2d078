//! Subcommand implementations.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use easel_canvas::{Canvas, SaveAction, SaveOutcome};
use easel_common::EaselError;
use easel_core::WorkerConfig;
use easel_net::{Connectivity, Fetcher, HttpFetcher, LoaderConfig, Request};
use easel_sw::{EventOutcome, FetchOutcome, OfflineWorker, TaskState};
use tracing::info;

/// Outcome of one `warm` request, as printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Served {
    Hit,
    Network,
    Failed,
}

impl Served {
    fn label(self) -> &'static str {
        match self {
            Served::Hit => "HIT ",
            Served::Network => "NET ",
            Served::Failed => "FAIL",
        }
    }
}

pub async fn warm(config: WorkerConfig, paths: Vec<String>) -> anyhow::Result<()> {
    let fetcher = Arc::new(HttpFetcher::new(LoaderConfig::default())?);
    let results = warm_with(config, fetcher, paths).await?;

    for (path, served) in &results {
        println!("{}  {path}", served.label());
    }
    let hits = results.iter().filter(|(_, s)| *s == Served::Hit).count();
    println!("{hits}/{} served from cache", results.len());
    Ok(())
}

/// Start a worker on `fetcher` and route each path through it.
pub async fn warm_with(
    config: WorkerConfig,
    fetcher: Arc<dyn Fetcher>,
    paths: Vec<String>,
) -> anyhow::Result<Vec<(String, Served)>> {
    let paths = if paths.is_empty() {
        config.asset_manifest.clone()
    } else {
        paths
    };

    let worker = OfflineWorker::builder(config).fetcher(fetcher).build()?;
    worker
        .start()
        .await
        .map_err(EaselError::from)
        .context("worker install failed")?;

    let mut results = Vec::with_capacity(paths.len());
    for path in paths {
        let url = worker.config().resolve(&path)?;
        let served = match worker.fetch(Request::get(url)).await {
            FetchOutcome::Cache(_) => Served::Hit,
            FetchOutcome::Network(_) => Served::Network,
            FetchOutcome::Failed(_) => Served::Failed,
        };
        results.push((path, served));
    }
    Ok(results)
}

pub async fn save(
    config: WorkerConfig,
    output: PathBuf,
    offline: bool,
    width: u32,
    height: u32,
) -> anyhow::Result<()> {
    let fetcher = Arc::new(HttpFetcher::new(LoaderConfig::default())?);
    save_with(config, fetcher, output, offline, width, height).await
}

/// Draw a demo stroke and save it. When `offline`, reconnect afterwards and
/// follow the deferred save through to the notification click.
pub async fn save_with(
    config: WorkerConfig,
    fetcher: Arc<dyn Fetcher>,
    output: PathBuf,
    offline: bool,
    width: u32,
    height: u32,
) -> anyhow::Result<()> {
    let mut canvas = Canvas::new(width, height)?;
    canvas.set_color("#1e90ff")?;
    canvas.set_line_width(3.0);
    canvas.begin_path();
    canvas.line_to(width as f32 * 0.1, height as f32 * 0.1);
    canvas.line_to(width as f32 * 0.9, height as f32 * 0.9);

    let action = SaveAction::to_file(output).with_latency(config.task_latency());
    let deadline = settle_time(&config);
    let worker = Arc::new(
        OfflineWorker::builder(config)
            .fetcher(fetcher)
            .save_task(action.deferred())
            .build()?,
    );
    let connectivity = Connectivity::new(!offline);
    let watcher = worker.clone().watch_connectivity(&connectivity);

    match action.save(&canvas, connectivity.is_online(), &worker).await? {
        SaveOutcome::Written(path) => println!("Saved {}", path.display()),
        SaveOutcome::Deferred { message, .. } => {
            println!("{message}");
            info!("Simulating reconnect");
            connectivity.set_online(true);
            follow_deferred_save(&worker, deadline).await?;
            println!("Saved {}", action.output().display());
        }
    }

    watcher.abort();
    Ok(())
}

/// Upper bound on how long a deferred save can take, retries included.
fn settle_time(config: &WorkerConfig) -> Duration {
    let retry = config.retry_policy();
    let backoff = (1..=retry.max_attempts)
        .map(|attempt| retry.delay_for_attempt(attempt))
        .fold(Duration::ZERO, Duration::saturating_add);
    config
        .task_latency()
        .saturating_mul(retry.max_attempts)
        .saturating_add(backoff)
        .saturating_add(Duration::from_secs(5))
}

async fn follow_deferred_save(worker: &OfflineWorker, deadline: Duration) -> anyhow::Result<()> {
    let tag = worker.config().sync_task_name.clone();
    let state = tokio::time::timeout(deadline, async {
        loop {
            if let Some(state) = worker.sync().last_outcome(&tag) {
                return state;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    })
    .await
    .context("deferred save did not finish")?;

    if state != TaskState::Completed {
        bail!("deferred save ended as {state:?}");
    }

    let Some(notification) = worker.notifications().open().into_iter().next() else {
        println!("Saved without a notification (permission not granted)");
        return Ok(());
    };
    println!(
        "Notification: {} - {}",
        notification.payload.title, notification.payload.body
    );

    if let EventOutcome::WindowOpened(client) =
        worker.click_notification(notification.id, Some("open")).await?
    {
        println!("Opened {}", client.url);
    }
    Ok(())
}
