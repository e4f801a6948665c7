/// Interactive picker boundary.
///
/// Each entry becomes one `index<TAB>label<TAB>image path` record on the
/// picker's stdin. The picker shows only the label, previews the image and
/// prints the chosen record back; the index recovers the exact entry even
/// when two entries render the same label.
use std::process::Stdio;

use tokio::{io::AsyncWriteExt, process::Command};
use tracing::{debug, info, warn};

use crate::{
    cache::AssetCache,
    config::AppConfig,
    error::{KinoError, Result},
    models::{CatalogEntry, Selection},
};

const DELIM: char = '\t';

/// Render one picker record per entry, in entry order.
pub fn render_records(entries: &[CatalogEntry], cache: &AssetCache) -> String {
    let mut input = String::new();
    for (idx, entry) in entries.iter().enumerate() {
        let image = cache.path_for(&entry.image_url);
        input.push_str(&format!(
            "{idx}{DELIM}{}{DELIM}{}\n",
            entry.label(),
            image.display()
        ));
    }
    input
}

/// Map the picker's output line back to an entry.
///
/// Lines without a usable index (`label<TAB>path` from older pickers) fall
/// back to the first entry whose label or title matches; duplicates are
/// ambiguous under that scheme and resolve to the first.
pub fn parse_selection(line: &str, entries: &[CatalogEntry]) -> Option<CatalogEntry> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.trim().is_empty() {
        return None;
    }
    let mut fields = line.split(DELIM);
    let first = fields.next().unwrap_or_default();

    if let Ok(idx) = first.trim().parse::<usize>() {
        let label = fields.next().unwrap_or_default();
        if let Some(entry) = entries.get(idx) {
            if label.is_empty() || entry.label() == label {
                return Some(entry.clone());
            }
            warn!("Picker index {idx} does not match label {label:?}, matching by label");
        }
        return match_label(label, entries);
    }

    match_label(first, entries)
}

fn match_label(label: &str, entries: &[CatalogEntry]) -> Option<CatalogEntry> {
    let label = label.trim();
    if let Some(e) = entries.iter().find(|e| e.label() == label) {
        return Some(e.clone());
    }
    // "Title (Year)" → "Title"
    let title = label
        .rfind(" (")
        .map(|i| label[..i].trim())
        .unwrap_or(label);
    entries.iter().find(|e| e.title == title).cloned()
}

// ── Picker process ────────────────────────────────────────────────────────────

/// Something that lets a human choose one entry.
#[allow(async_fn_in_trait)]
pub trait Selector {
    async fn select(&self, entries: &[CatalogEntry], cache: &AssetCache) -> Result<Selection>;
}

/// fzf (or any fzf-compatible picker reading records on stdin).
pub struct FzfSelector {
    program: String,
    args: Vec<String>,
}

impl FzfSelector {
    pub fn from_config(config: &AppConfig) -> Self {
        let args = [
            "--cycle",
            "--reverse",
            "--with-nth",
            "2",
            "-d",
            "\t",
            "--preview",
            config.preview_command.as_str(),
            "--preview-window",
            "noborder",
            "--preview-window",
            "right:40%",
        ]
        .into_iter()
        .map(str::to_string)
        .collect();
        Self::with_command(config.fzf_path.clone(), args)
    }

    pub fn with_command(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

impl Selector for FzfSelector {
    async fn select(&self, entries: &[CatalogEntry], cache: &AssetCache) -> Result<Selection> {
        if entries.is_empty() {
            return Ok(Selection::None);
        }

        let input = render_records(entries, cache);
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| KinoError::Selector(format!("spawn {}: {e}", self.program)))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| KinoError::Selector("picker stdin not piped".to_string()))?;
        let writer = tokio::spawn(async move {
            // The picker may exit before reading everything
            if let Err(e) = stdin.write_all(input.as_bytes()).await {
                if e.kind() != std::io::ErrorKind::BrokenPipe {
                    return Err(e);
                }
            }
            Ok(())
        });

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| KinoError::Selector(format!("wait for {}: {e}", self.program)))?;
        match writer.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Writing picker input failed: {e}"),
            Err(e) => warn!("Picker input writer aborted: {e}"),
        }

        if !output.status.success() {
            // 1 = no match, 130 = aborted with Esc / Ctrl-C
            info!(
                "Picker exited with status {}, nothing selected",
                output.status.code().unwrap_or(-1)
            );
            return Ok(Selection::None);
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let line = stdout.lines().next().unwrap_or_default();
        debug!("Picker returned {line:?}");

        match parse_selection(line, entries) {
            Some(entry) => Ok(Selection::Chosen(entry)),
            None if line.trim().is_empty() => Ok(Selection::None),
            None => Err(KinoError::Selector(format!(
                "selection {line:?} not found in catalogue"
            ))),
        }
    }
}
