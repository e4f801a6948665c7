/// Catalogue search page extraction.
///
/// `Extractor::extract` performs the single network fetch; `parse_listing`
/// is a pure function over the returned HTML. Every CSS selector that
/// depends on the site's markup lives in `ListingSelectors`.
use once_cell::sync::Lazy;
use reqwest::Url;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info};

use crate::{
    error::{KinoError, Result},
    http,
    models::CatalogEntry,
};

// ── Site markup ───────────────────────────────────────────────────────────────

struct ListingSelectors {
    item: Selector,
    poster_img: Selector,
    poster_link: Selector,
    name_link: Selector,
    year: Selector,
    kind: Selector,
}

static SELECTORS: Lazy<ListingSelectors> = Lazy::new(|| ListingSelectors {
    item: Selector::parse(".film_list-wrap .flw-item").unwrap(),
    poster_img: Selector::parse("img.film-poster-img").unwrap(),
    poster_link: Selector::parse("a.film-poster-ahref").unwrap(),
    name_link: Selector::parse(".film-name a").unwrap(),
    year: Selector::parse(".film-detail .fdi-item").unwrap(),
    kind: Selector::parse(".film-detail .fdi-type").unwrap(),
});

const DEFAULT_MEDIA_TYPE: &str = "Movie";

/// The search path segment uses `-` where the query had spaces.
const QUERY_SEPARATOR: &str = "-";

// ── Extractor ─────────────────────────────────────────────────────────────────

pub struct Extractor {
    client: reqwest::Client,
    base_url: Url,
}

impl Extractor {
    pub fn new(client: reqwest::Client, base_url: &str) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| KinoError::Config(format!("invalid base URL {base_url}: {e}")))?;
        Ok(Self { client, base_url })
    }

    /// `search/<slug>` under the base URL. The slug is pushed as a single,
    /// percent-encoded path segment.
    pub fn search_url(&self, query: &str) -> Result<Url> {
        let slug = query.split_whitespace().collect::<Vec<_>>().join(QUERY_SEPARATOR);
        let mut url = self
            .base_url
            .join("search/")
            .map_err(|e| KinoError::Config(format!("bad search URL: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| KinoError::Config("base URL cannot carry a path".to_string()))?
            .pop_if_empty()
            .push(&slug);
        Ok(url)
    }

    /// Fetch the search page for `query` and return its entries in document
    /// order. Zero entries is `NotFound`, never an empty success.
    pub async fn extract(&self, query: &str) -> Result<Vec<CatalogEntry>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(KinoError::InvalidQuery("query is empty".to_string()));
        }

        let url = self.search_url(query)?;
        info!("Searching catalogue: {url}");
        let html = http::get_text(&self.client, url.as_str()).await?;
        debug!("Search page: {} chars", html.len());

        let entries = parse_listing(&html, &self.base_url);
        if entries.is_empty() {
            return Err(KinoError::NotFound {
                query: query.to_string(),
            });
        }

        info!("Found {} result(s) for {query:?}", entries.len());
        Ok(entries)
    }
}

// ── Parsing ───────────────────────────────────────────────────────────────────

/// Extract one entry per listing block. Missing fields degrade to empty
/// strings; only blocks without a title are dropped.
pub fn parse_listing(html: &str, base: &Url) -> Vec<CatalogEntry> {
    let document = Html::parse_document(html);
    let sel = &*SELECTORS;

    document
        .select(&sel.item)
        .filter_map(|item| parse_item(item, sel, base))
        .collect()
}

fn parse_item(item: ElementRef<'_>, sel: &ListingSelectors, base: &Url) -> Option<CatalogEntry> {
    let img = item.select(&sel.poster_img).next();

    let title = img
        .and_then(|i| i.value().attr("title"))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .or_else(|| {
            item.select(&sel.name_link).next().map(|a| {
                a.value()
                    .attr("title")
                    .map(str::to_string)
                    .unwrap_or_else(|| element_text(a))
            })
        })
        .map(|t| t.trim().to_string())
        .unwrap_or_default();

    if title.is_empty() {
        debug!("Dropping listing item without a title");
        return None;
    }

    // Lazy-loaded posters only carry data-src
    let image_url = img
        .and_then(|i| {
            i.value()
                .attr("src")
                .filter(|s| !s.trim().is_empty())
                .or_else(|| i.value().attr("data-src"))
        })
        .map(|s| absolutize(base, s))
        .unwrap_or_default();

    let source_url = item
        .select(&sel.poster_link)
        .next()
        .or_else(|| item.select(&sel.name_link).next())
        .and_then(|a| a.value().attr("href"))
        .map(|href| absolutize(base, href))
        .unwrap_or_default();

    let year = item
        .select(&sel.year)
        .next()
        .map(element_text)
        .unwrap_or_default();

    let media_type = item
        .select(&sel.kind)
        .next()
        .map(element_text)
        .filter(|k| !k.is_empty())
        .unwrap_or_else(|| DEFAULT_MEDIA_TYPE.to_string());

    Some(CatalogEntry {
        title,
        year,
        source_url,
        image_url,
        media_type,
    })
}

fn element_text(el: ElementRef<'_>) -> String {
    el.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

fn absolutize(base: &Url, href: &str) -> String {
    let href = href.trim();
    if href.is_empty() {
        return String::new();
    }
    base.join(href)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| href.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
<html><body>
<div class="film_list-wrap">
  <div class="flw-item">
    <div class="film-poster">
      <img data-src="https://img.example/resize/250x400/a1/inception.jpg"
           class="film-poster-img lazyload" title="Inception" alt="Inception">
      <a href="/movie/watch-inception-19764" class="film-poster-ahref"></a>
    </div>
    <div class="film-detail">
      <h2 class="film-name"><a href="/movie/watch-inception-19764" title="Inception">Inception</a></h2>
      <div class="fd-infor">
        <span class="fdi-item">2010</span><span class="dot"></span>
        <span class="fdi-item fdi-duration">148m</span>
        <span class="float-right fdi-type">Movie</span>
      </div>
    </div>
  </div>
  <div class="flw-item">
    <div class="film-poster">
      <img src="https://img.example/resize/250x400/b2/dreams.jpg" class="film-poster-img" title="Dreams">
      <a href="https://flixhq.example/tv/watch-dreams-4242" class="film-poster-ahref"></a>
    </div>
    <div class="film-detail">
      <div class="fd-infor"><span class="fdi-item">SS 2</span><span class="fdi-type">TV</span></div>
    </div>
  </div>
  <div class="flw-item">
    <div class="film-poster"><a href="/movie/watch-untitled-1" class="film-poster-ahref"></a></div>
  </div>
  <div class="flw-item">
    <div class="film-poster">
      <img class="film-poster-img" title="No Poster">
      <a href="/movie/watch-no-poster-77" class="film-poster-ahref"></a>
    </div>
  </div>
</div>
</body></html>
"#;

    fn base() -> Url {
        Url::parse("https://flixhq.example/").unwrap()
    }

    #[test]
    fn parses_entries_in_document_order() {
        let entries = parse_listing(PAGE, &base());
        let titles: Vec<_> = entries.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, vec!["Inception", "Dreams", "No Poster"]);
    }

    #[test]
    fn parses_fields() {
        let entries = parse_listing(PAGE, &base());
        let inception = &entries[0];
        assert_eq!(inception.year, "2010");
        assert_eq!(inception.media_type, "Movie");
        assert_eq!(
            inception.source_url,
            "https://flixhq.example/movie/watch-inception-19764"
        );
        assert_eq!(
            inception.image_url,
            "https://img.example/resize/250x400/a1/inception.jpg"
        );

        let dreams = &entries[1];
        assert_eq!(dreams.media_type, "TV");
        assert_eq!(dreams.source_url, "https://flixhq.example/tv/watch-dreams-4242");
    }

    #[test]
    fn missing_image_degrades_to_empty() {
        let entries = parse_listing(PAGE, &base());
        let no_poster = &entries[2];
        assert_eq!(no_poster.image_url, "");
        assert_eq!(no_poster.media_type, DEFAULT_MEDIA_TYPE);
        assert!(!no_poster.source_url.is_empty());
    }

    #[test]
    fn unrelated_markup_yields_nothing() {
        assert!(parse_listing("<html><p>No results</p></html>", &base()).is_empty());
    }

    #[test]
    fn search_url_replaces_spaces() {
        let client = reqwest::Client::new();
        let ex = Extractor::new(client, "https://flixhq.example/").unwrap();
        assert_eq!(
            ex.search_url("the  dark knight").unwrap().as_str(),
            "https://flixhq.example/search/the-dark-knight"
        );
    }

    #[test]
    fn search_slug_is_one_encoded_segment() {
        let ex = Extractor::new(reqwest::Client::new(), "https://flixhq.example/").unwrap();
        let url = ex.search_url("#Alive").unwrap();
        assert_eq!(url.as_str(), "https://flixhq.example/search/%23Alive");
        assert_eq!(url.fragment(), None);

        let url = ex.search_url("AC/DC live").unwrap();
        assert_eq!(url.as_str(), "https://flixhq.example/search/AC%2FDC-live");
        assert_eq!(url.path_segments().unwrap().count(), 2);
    }

    #[tokio::test]
    async fn empty_query_is_rejected_without_fetching() {
        let ex = Extractor::new(reqwest::Client::new(), "http://127.0.0.1:9/").unwrap();
        let err = ex.extract("   ").await.unwrap_err();
        assert!(matches!(err, KinoError::InvalidQuery(_)));
    }
}
