mod cache;
mod catalog;
mod config;
mod downloader;
mod error;
mod http;
mod models;
mod pipeline;
mod player;
mod progress;
mod selector;
mod stream;
#[cfg(test)]
mod testing;

use std::{
    io::{BufRead, IsTerminal, Write},
    path::PathBuf,
    sync::Arc,
};

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::{
    config::{AppConfig, ConfigOverrides},
    pipeline::{Pipeline, RunOutcome, RunTokens},
    progress::{NoProgress, ProgressSink, TerminalProgress},
    selector::FzfSelector,
};

/// Search the catalogue, browse posters in fzf and play the chosen title.
#[derive(Debug, Parser)]
#[command(name = "kino", version, about)]
struct Cli {
    /// Title to search for. Prompted for when omitted.
    query: Vec<String>,

    /// Maximum number of posters fetched at once.
    #[arg(short = 'j', long)]
    concurrency: Option<usize>,

    /// Directory used for the poster cache.
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Re-download posters that are already cached.
    #[arg(long)]
    refresh: bool,

    /// Print the stream URL instead of launching the player.
    #[arg(long)]
    print_url: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // ── Config ───────────────────────────────────────────────────────────────
    let mut config = AppConfig::from_env()?;
    config.apply(ConfigOverrides {
        max_concurrent: cli.concurrency,
        cache_dir: cli.cache_dir.clone(),
        refresh_cached: cli.refresh,
    });
    config.validate()?;

    // ── Logging ──────────────────────────────────────────────────────────────
    // stderr only: stdout carries the URL in --print-url mode
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "kino=info".into());
    if config.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
    info!("Poster cache at {}", config.cache_dir.display());

    // ── Cancellation ─────────────────────────────────────────────────────────
    // Ctrl-C stops the current run; with no run active (at the prompt) it exits
    let runs = RunTokens::default();
    {
        let runs = runs.clone();
        tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                if runs.interrupt().await {
                    warn!("Interrupted, finishing in-flight downloads");
                } else {
                    std::process::exit(130);
                }
            }
        });
    }

    let pipeline = Pipeline::from_config(&config, FzfSelector::from_config(&config), cli.print_url)
        .context("Failed to set up pipeline")?;

    // ── Query ────────────────────────────────────────────────────────────────
    let query = cli.query.join(" ");
    if !query.trim().is_empty() {
        run_once(&pipeline, &query, &runs).await?;
        return Ok(());
    }

    // Prompt mode: keep asking until an empty line, EOF or a played title
    loop {
        let Some(query) = prompt("Enter a title: ")? else {
            return Ok(());
        };
        match run_once(&pipeline, &query, &runs).await? {
            RunOutcome::NoSelection => continue,
            _ => return Ok(()),
        }
    }
}

async fn run_once(
    pipeline: &Pipeline<FzfSelector>,
    query: &str,
    runs: &RunTokens,
) -> anyhow::Result<RunOutcome> {
    let sink: Arc<dyn ProgressSink> = if std::io::stderr().is_terminal() {
        Arc::new(TerminalProgress::new())
    } else {
        Arc::new(NoProgress)
    };
    let cancel = runs.begin().await;
    let result = pipeline.run(query, sink, &cancel).await;
    runs.end().await;
    match result {
        Ok(RunOutcome::Printed(url)) => {
            println!("{url}");
            Ok(RunOutcome::Printed(url))
        }
        Ok(RunOutcome::NoSelection) => {
            info!("Nothing selected");
            Ok(RunOutcome::NoSelection)
        }
        Ok(outcome) => Ok(outcome),
        // "No results" is reported, not fatal, so prompt mode can ask again
        Err(e) if e.is_not_found() => {
            eprintln!("{e}");
            Ok(RunOutcome::NoSelection)
        }
        Err(e) => Err(e).with_context(|| format!("Failed to play {query:?}")),
    }
}

/// Read one trimmed line from stdin; `None` on EOF or an empty line.
fn prompt(message: &str) -> anyhow::Result<Option<String>> {
    let mut stderr = std::io::stderr();
    write!(stderr, "{message}")?;
    stderr.flush()?;

    let mut line = String::new();
    let read = std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("read query from stdin")?;
    let line = line.trim();
    if read == 0 || line.is_empty() {
        return Ok(None);
    }
    Ok(Some(line.to_string()))
}
