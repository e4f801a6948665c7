/// End-to-end run for one query: extract → cache posters → pick → play.
///
/// Each stage fully finishes before the next starts, so the picker always
/// sees a cache that is as complete as it is going to get.
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::{
    cache::AssetCache,
    catalog::Extractor,
    config::AppConfig,
    downloader::{DownloadOptions, Downloader},
    error::Result,
    http,
    models::{CatalogEntry, Selection},
    player::Player,
    progress::ProgressSink,
    selector::Selector,
    stream::StreamResolver,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Played(CatalogEntry),
    /// `--print-url`: the stream URL instead of launching the player.
    Printed(String),
    NoSelection,
}

/// Hands each run a fresh cancellation token. An interrupt cancels only the
/// run in progress; the next run starts uncancelled.
#[derive(Debug, Clone, Default)]
pub struct RunTokens {
    current: Arc<Mutex<Option<CancellationToken>>>,
}

impl RunTokens {
    pub async fn begin(&self) -> CancellationToken {
        let token = CancellationToken::new();
        *self.current.lock().await = Some(token.clone());
        token
    }

    pub async fn end(&self) {
        self.current.lock().await.take();
    }

    /// Cancel the active run. `false` when no run is active.
    pub async fn interrupt(&self) -> bool {
        match self.current.lock().await.as_ref() {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }
}

pub struct Pipeline<S> {
    extractor: Extractor,
    downloader: Downloader,
    selector: S,
    resolver: StreamResolver,
    player: Player,
    print_url: bool,
}

impl<S: Selector> Pipeline<S> {
    pub fn from_config(config: &AppConfig, selector: S, print_url: bool) -> Result<Self> {
        let client = http::build_client(config)?;
        Ok(Self {
            extractor: Extractor::new(client.clone(), &config.base_url)?,
            downloader: Downloader::new(
                client.clone(),
                AssetCache::new(config.cache_dir.clone()),
                DownloadOptions::from_config(config),
            ),
            selector,
            resolver: StreamResolver::new(client, &config.base_url, &config.resolver_url)?,
            player: Player::from_config(config),
            print_url,
        })
    }

    /// Search, populate the poster cache and let the user pick one entry.
    pub async fn browse(
        &self,
        query: &str,
        sink: Arc<dyn ProgressSink>,
        cancel: &CancellationToken,
    ) -> Result<Selection> {
        let entries = self.extractor.extract(query).await?;
        self.downloader.download_all(&entries, sink, cancel).await?;
        let progress = self.downloader.progress();
        debug!("Posters settled: {}/{}", progress.completed(), progress.total());
        self.selector.select(&entries, self.downloader.cache()).await
    }

    pub async fn run(
        &self,
        query: &str,
        sink: Arc<dyn ProgressSink>,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome> {
        let entry = match self.browse(query, sink, cancel).await? {
            Selection::Chosen(entry) => entry,
            Selection::None => return Ok(RunOutcome::NoSelection),
        };
        info!("Selected {}", entry.label());

        let url = self.resolver.resolve(&entry).await?;
        if self.print_url {
            return Ok(RunOutcome::Printed(url));
        }
        self.player.play(&url).await?;
        Ok(RunOutcome::Played(entry))
    }
}
