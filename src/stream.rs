/// Turns a chosen catalogue entry into a playable stream URL.
///
/// Three hops: the episode list gives the embed link, the sources endpoint
/// gives the upstream player link, and an external resolver service turns
/// that link's id into the final media URL. Nothing is decrypted locally.
use once_cell::sync::Lazy;
use reqwest::{Url, header};
use scraper::{Html, Selector};
use serde::Deserialize;
use tracing::{debug, info};

use crate::{
    error::{KinoError, Result},
    models::CatalogEntry,
};

static EMBED_LINK: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".nav-item a[href]").unwrap());

#[derive(Debug, Deserialize)]
struct SourcesResponse {
    #[serde(default)]
    link: String,
}

#[derive(Debug, Deserialize)]
struct ResolverResponse {
    #[serde(default)]
    sources: Vec<ResolvedSource>,
}

#[derive(Debug, Deserialize)]
struct ResolvedSource {
    #[serde(default)]
    file: String,
}

pub struct StreamResolver {
    client: reqwest::Client,
    base_url: Url,
    resolver_url: String,
}

impl StreamResolver {
    pub fn new(client: reqwest::Client, base_url: &str, resolver_url: &str) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| KinoError::Config(format!("invalid base URL {base_url}: {e}")))?;
        Ok(Self {
            client,
            base_url,
            resolver_url: resolver_url.to_string(),
        })
    }

    pub async fn resolve(&self, entry: &CatalogEntry) -> Result<String> {
        let episode_id = episode_id(&entry.source_url).ok_or_else(|| {
            KinoError::Resolve(format!("no episode id in {:?}", entry.source_url))
        })?;
        info!("Resolving stream for {:?} (episode {episode_id})", entry.title);

        let embed = self.embed_link(episode_id).await?;
        let server_id = server_id(&embed)
            .ok_or_else(|| KinoError::Resolve(format!("no server id in embed link {embed:?}")))?;
        let source_id = self.source_id(server_id).await?;
        self.media_url(&source_id).await
    }

    async fn ajax(&self, path: &str) -> Result<reqwest::Response> {
        let url = self
            .base_url
            .join(path)
            .map_err(|e| KinoError::Resolve(format!("bad ajax path {path}: {e}")))?;
        let resp = self
            .client
            .get(url)
            .header("X-Requested-With", "XMLHttpRequest")
            .header(header::ACCEPT, "application/json, text/html")
            .send()
            .await?
            .error_for_status()?;
        Ok(resp)
    }

    async fn embed_link(&self, episode_id: &str) -> Result<String> {
        let html = self
            .ajax(&format!("ajax/episode/list/{episode_id}"))
            .await?
            .text()
            .await?;
        first_embed_link(&html)
            .ok_or_else(|| KinoError::Resolve(format!("no servers listed for episode {episode_id}")))
    }

    async fn source_id(&self, server_id: &str) -> Result<String> {
        let body = self
            .ajax(&format!("ajax/episode/sources/{server_id}"))
            .await?
            .text()
            .await?;
        let sources: SourcesResponse = decode("sources", &body)?;
        debug!("Source link: {}", sources.link);
        link_id(&sources.link)
            .ok_or_else(|| KinoError::Resolve(format!("unusable source link {:?}", sources.link)))
    }

    async fn media_url(&self, source_id: &str) -> Result<String> {
        let body = self
            .client
            .get(&self.resolver_url)
            .query(&[("id", source_id)])
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        let resolved: ResolverResponse = decode("resolver", &body)?;
        resolved
            .sources
            .into_iter()
            .map(|s| s.file)
            .find(|f| !f.is_empty())
            .ok_or_else(|| KinoError::Resolve(format!("resolver returned no sources for {source_id}")))
    }
}

/// A 2xx answer that is not the expected JSON is a resolution failure, not a
/// transport one.
fn decode<T: serde::de::DeserializeOwned>(what: &str, body: &str) -> Result<T> {
    serde_json::from_str(body).map_err(|e| KinoError::Resolve(format!("bad {what} response: {e}")))
}

/// `.../watch-inception-19764` → `19764`
fn episode_id(source_url: &str) -> Option<&str> {
    source_url
        .trim_end_matches('/')
        .rsplit('-')
        .next()
        .filter(|id| !id.is_empty() && !id.contains('/'))
}

/// `/watch-movie/watch-inception-19764.5299741` → `5299741`
fn server_id(embed_link: &str) -> Option<&str> {
    embed_link
        .rsplit_once('.')
        .map(|(_, id)| id)
        .filter(|id| !id.is_empty() && !id.contains('/'))
}

/// Last path segment of the upstream player link, without query string.
fn link_id(link: &str) -> Option<String> {
    let path = link.split(['?', '#']).next().unwrap_or_default();
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|id| !id.is_empty() && !id.contains(':'))
        .map(str::to_string)
}

fn first_embed_link(html: &str) -> Option<String> {
    let document = Html::parse_fragment(html);
    document
        .select(&EMBED_LINK)
        .filter_map(|a| a.value().attr("href"))
        .map(str::trim)
        .find(|href| !href.is_empty())
        .map(str::to_string)
}
