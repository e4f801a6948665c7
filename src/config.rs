use std::path::PathBuf;

use anyhow::Context;
use serde::Deserialize;

use crate::error::KinoError;

/// Runtime configuration, loaded from `KINO_*` environment variables / .env.
/// Command-line flags are applied on top through `ConfigOverrides`, and only
/// the merged result is validated.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Root of the catalogue site, with trailing slash.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Flat directory holding cached poster images.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    /// Maximum number of concurrent image fetches.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// Replacement for any `/WIDTHxHEIGHT/` path segment in poster URLs.
    /// Empty disables the rewrite.
    #[serde(default = "default_upscale_resolution")]
    pub upscale_resolution: String,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Optional HTTP proxy used for every request.
    #[serde(default)]
    pub proxy: Option<String>,

    /// Re-fetch posters even when a cached copy exists.
    #[serde(default)]
    pub refresh_cached: bool,

    #[serde(default = "default_fzf_path")]
    pub fzf_path: String,

    /// fzf `--preview` command; `{3}` expands to the cached image path.
    #[serde(default = "default_preview_command")]
    pub preview_command: String,

    #[serde(default = "default_player_path")]
    pub player_path: String,

    /// Extra player arguments, comma separated in the environment.
    #[serde(default = "default_player_args")]
    pub player_args: Vec<String>,

    /// External service that turns a source id into a playable URL.
    #[serde(default = "default_resolver_url")]
    pub resolver_url: String,

    #[serde(default)]
    pub log_json: bool,
}

fn default_base_url() -> String {
    "https://flixhq.to/".to_string()
}
fn default_cache_dir() -> PathBuf {
    PathBuf::from("/tmp/kinoImages")
}
fn default_max_concurrent() -> usize {
    13
}
fn default_upscale_resolution() -> String {
    "1000x1000".to_string()
}
fn default_request_timeout_secs() -> u64 {
    20
}
fn default_user_agent() -> String {
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36"
        .to_string()
}
fn default_fzf_path() -> String {
    "fzf".to_string()
}
fn default_preview_command() -> String {
    "kitty +kitten icat --clear \
     --place=\"$FZF_PREVIEW_COLUMNS\"x\"$FZF_PREVIEW_LINES\"@\"$(($COLUMNS-$FZF_PREVIEW_COLUMNS))\"x0 \
     --scale-up --align center --stdin=no --transfer-mode file {3}"
        .to_string()
}
fn default_player_path() -> String {
    "mpv".to_string()
}
fn default_player_args() -> Vec<String> {
    vec!["--fs".to_string()]
}
fn default_resolver_url() -> String {
    "https://lobster-decryption.netlify.app/decrypt".to_string()
}

/// Values given on the command line; `None` keeps the environment's value.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub max_concurrent: Option<usize>,
    pub cache_dir: Option<PathBuf>,
    pub refresh_cached: bool,
}

impl AppConfig {
    /// Load from the process environment. Not validated: call `validate`
    /// after overrides have been applied.
    pub fn from_env() -> anyhow::Result<Self> {
        // .env is optional
        let _ = dotenvy::dotenv();
        Self::from_vars(std::env::vars())
    }

    pub fn from_vars<I>(vars: I) -> anyhow::Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        envy::prefixed("KINO_")
            .from_iter(vars)
            .context("Failed to load config from environment")
    }

    pub fn apply(&mut self, overrides: ConfigOverrides) {
        if let Some(n) = overrides.max_concurrent {
            self.max_concurrent = n;
        }
        if let Some(dir) = overrides.cache_dir {
            self.cache_dir = dir;
        }
        self.refresh_cached |= overrides.refresh_cached;
    }

    pub fn validate(&self) -> Result<(), KinoError> {
        if self.max_concurrent == 0 {
            return Err(KinoError::Config(
                "max_concurrent must be at least 1".to_string(),
            ));
        }
        if reqwest::Url::parse(&self.base_url).is_err() {
            return Err(KinoError::Config(format!(
                "base_url is not a valid URL: {}",
                self.base_url
            )));
        }
        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            cache_dir: default_cache_dir(),
            max_concurrent: default_max_concurrent(),
            upscale_resolution: default_upscale_resolution(),
            request_timeout_secs: default_request_timeout_secs(),
            user_agent: default_user_agent(),
            proxy: None,
            refresh_cached: false,
            fzf_path: default_fzf_path(),
            preview_command: default_preview_command(),
            player_path: default_player_path(),
            player_args: default_player_args(),
            resolver_url: default_resolver_url(),
            log_json: false,
        }
    }
}
