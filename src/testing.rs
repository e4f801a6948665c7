//! Local HTTP fixtures for network-facing tests.

use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};
use std::time::Duration;

use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    response::{Html, IntoResponse},
    routing::get,
};

/// Serve `router` on an ephemeral localhost port and return its base URL
/// (with trailing slash).
pub async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}/")
}

/// Tracks how many image requests are in flight at once.
#[derive(Debug, Default)]
pub struct InFlight {
    current: AtomicUsize,
    peak: AtomicUsize,
    hits: AtomicUsize,
}

impl InFlight {
    fn enter(&self) {
        self.hits.fetch_add(1, Ordering::SeqCst);
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn leave(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

#[derive(Clone)]
struct ImageState {
    in_flight: Arc<InFlight>,
    delay: Duration,
}

/// Image host: `/img/{name}` answers with the bytes of `name` after `delay`;
/// names starting with `missing` answer 404.
pub fn image_router(in_flight: Arc<InFlight>, delay: Duration) -> Router {
    Router::new()
        .route("/img/{*name}", get(image))
        .with_state(ImageState { in_flight, delay })
}

async fn image(State(state): State<ImageState>, Path(name): Path<String>) -> impl IntoResponse {
    state.in_flight.enter();
    tokio::time::sleep(state.delay).await;
    state.in_flight.leave();

    if name.starts_with("missing") {
        return (StatusCode::NOT_FOUND, Vec::new());
    }
    (StatusCode::OK, format!("image:{name}").into_bytes())
}

/// Search page with one listing block per `(title, year, image_path)`.
pub fn listing_html(items: &[(&str, &str, &str)]) -> String {
    let blocks: String = items
        .iter()
        .enumerate()
        .map(|(i, (title, year, img))| {
            format!(
                r#"<div class="flw-item">
  <div class="film-poster">
    <img data-src="{img}" class="film-poster-img" title="{title}">
    <a href="/movie/watch-item-{i}" class="film-poster-ahref"></a>
  </div>
  <div class="film-detail"><div class="fd-infor">
    <span class="fdi-item">{year}</span><span class="fdi-type">Movie</span>
  </div></div>
</div>"#
            )
        })
        .collect();
    format!(r#"<html><body><div class="film_list-wrap">{blocks}</div></body></html>"#)
}

/// Catalogue host: `/search/inception` (any case) lists two titles, `/search/broken`
/// answers 500, anything else is an empty listing.
pub fn catalogue_router() -> Router {
    Router::new().route("/search/{slug}", get(search))
}

async fn search(Path(slug): Path<String>) -> impl IntoResponse {
    match slug.to_lowercase().as_str() {
        "inception" => (
            StatusCode::OK,
            Html(listing_html(&[
                ("Inception", "2010", "/img/250x400/inception.jpg"),
                ("Inception: The Cobol Job", "2010", "/img/250x400/cobol.jpg"),
            ])),
        ),
        "broken" => (StatusCode::INTERNAL_SERVER_ERROR, Html(String::new())),
        _ => (StatusCode::OK, Html(listing_html(&[]))),
    }
}
