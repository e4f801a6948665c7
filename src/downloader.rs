/// Bounded poster downloader.
///
/// Entries are dispatched in order; each image fetch holds one semaphore
/// permit for its whole lifetime, so at most `max_concurrent` fetches are in
/// flight. Failures are logged per task and never abort the batch.
/// `download_all` returns only after every dispatched task has finished.
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use tokio::{sync::Semaphore, task::JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    cache::{AssetCache, CacheKey},
    config::AppConfig,
    error::Result,
    models::{BatchReport, CatalogEntry},
    progress::{BatchProgress, ProgressSink},
};

// ── Resolution rewrite ────────────────────────────────────────────────────────

/// Replace every `/WIDTHxHEIGHT/` path segment with `/{resolution}/`.
pub fn upscale_image_url(url: &str, resolution: &str) -> String {
    static RE_SIZE: Lazy<Regex> = Lazy::new(|| Regex::new(r"/\d+x\d+/").unwrap());
    if resolution.is_empty() {
        return url.to_string();
    }
    RE_SIZE
        .replace_all(url, format!("/{resolution}/").as_str())
        .into_owned()
}

// ── Downloader ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct DownloadOptions {
    pub max_concurrent: usize,
    /// Target for `upscale_image_url`; `None` fetches the URL as listed.
    pub upscale_to: Option<String>,
    pub refresh_cached: bool,
}

impl DownloadOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            max_concurrent: config.max_concurrent,
            upscale_to: Some(config.upscale_resolution.clone()).filter(|r| !r.is_empty()),
            refresh_cached: config.refresh_cached,
        }
    }
}

pub struct Downloader {
    client: reqwest::Client,
    cache: AssetCache,
    opts: DownloadOptions,
    progress: Arc<BatchProgress>,
}

impl Downloader {
    pub fn new(client: reqwest::Client, cache: AssetCache, opts: DownloadOptions) -> Self {
        Self {
            client,
            cache,
            opts,
            progress: Arc::new(BatchProgress::new()),
        }
    }

    pub fn progress(&self) -> &BatchProgress {
        &self.progress
    }

    pub fn cache(&self) -> &AssetCache {
        &self.cache
    }

    /// Populate the cache with every entry's poster, best effort.
    ///
    /// Only an unusable cache directory fails the batch. Cancelling `cancel`
    /// stops dispatching; tasks already running are allowed to finish.
    pub async fn download_all(
        &self,
        entries: &[CatalogEntry],
        sink: Arc<dyn ProgressSink>,
        cancel: &CancellationToken,
    ) -> Result<BatchReport> {
        self.cache.ensure_root().await?;

        let total = entries.len();
        self.progress.reset(total);
        sink.started(total);

        let mut report = BatchReport {
            total,
            ..Default::default()
        };
        let semaphore = Arc::new(Semaphore::new(self.opts.max_concurrent.max(1)));
        let mut tasks = JoinSet::new();
        let mut seen: HashSet<CacheKey> = HashSet::new();

        for entry in entries {
            if cancel.is_cancelled() {
                report.skipped += 1;
                self.tick(sink.as_ref());
                continue;
            }

            // No poster: nothing to fetch, no permit taken
            if !entry.has_image() {
                debug!("No poster for {:?}, skipping", entry.title);
                report.skipped += 1;
                self.tick(sink.as_ref());
                continue;
            }

            // Key on the listed URL so the rewrite policy never changes the path
            let key = CacheKey::for_url(&entry.image_url);
            if !seen.insert(key.clone()) {
                report.duplicates += 1;
                self.tick(sink.as_ref());
                continue;
            }

            let path = self.cache.path_for_key(&key);
            if !self.opts.refresh_cached && self.cache.has(&path).await {
                debug!("Poster for {:?} already cached", entry.title);
                report.cached += 1;
                self.tick(sink.as_ref());
                continue;
            }

            let permit = tokio::select! {
                permit = Arc::clone(&semaphore).acquire_owned() => match permit {
                    Ok(p) => p,
                    Err(_) => {
                        report.skipped += 1;
                        self.tick(sink.as_ref());
                        continue;
                    }
                },
                _ = cancel.cancelled() => {
                    report.skipped += 1;
                    self.tick(sink.as_ref());
                    continue;
                }
            };

            let task = DownloadTask {
                title: entry.title.clone(),
                url: match &self.opts.upscale_to {
                    Some(res) => upscale_image_url(&entry.image_url, res),
                    None => entry.image_url.clone(),
                },
                path,
            };
            let client = self.client.clone();
            let cache = self.cache.clone();
            let progress = Arc::clone(&self.progress);
            let sink = Arc::clone(&sink);

            tasks.spawn(async move {
                let _permit = permit; // held for the duration of the fetch
                let result = task.run(&client, &cache).await;
                if let Err(e) = &result {
                    warn!("Poster download failed for {:?}: {e:#}", task.title);
                }
                let done = progress.complete_one();
                sink.advanced(done, progress.total());
                result
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(())) => report.fetched += 1,
                Ok(Err(_)) => report.failed += 1,
                Err(e) => {
                    // The task died before it could record itself
                    warn!("Poster download task aborted: {e}");
                    report.failed += 1;
                    self.tick(sink.as_ref());
                }
            }
        }

        sink.finished();
        info!(
            "Poster batch done: {} fetched, {} cached, {} skipped, {} failed, {} duplicates",
            report.fetched, report.cached, report.skipped, report.failed, report.duplicates
        );
        Ok(report)
    }

    fn tick(&self, sink: &dyn ProgressSink) {
        let done = self.progress.complete_one();
        sink.advanced(done, self.progress.total());
    }
}

// ── Single download task ──────────────────────────────────────────────────────

/// One in-flight fetch, owned by the worker that runs it.
struct DownloadTask {
    title: String,
    url: String,
    path: PathBuf,
}

impl DownloadTask {
    async fn run(&self, client: &reqwest::Client, cache: &AssetCache) -> Result<()> {
        debug!("Fetching poster for {:?}: {}", self.title, self.url);
        let bytes = client
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        cache.store(&self.path, &bytes).await
    }
}
