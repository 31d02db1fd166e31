use std::collections::BTreeMap;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::extract::rejection::PathRejection;
use axum::extract::{Path, Query, State};
use axum::response::{Html, Json};
use axum::routing::get;
use serde::Deserialize;
use tower_http::trace::TraceLayer;

use crate::error::ApiError;
use crate::formats::{Book, CategoryStats, HealthReport, StatsOverview};
use crate::openapi::{OPENAPI_PATH, SWAGGER_UI};
use crate::store::BookStore;

pub const API_PREFIX: &str = "/api/v1";

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<BookStore>,
}

impl AppState {
    pub fn new(store: BookStore) -> Self {
        Self {
            store: Arc::new(store),
        }
    }
}

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/health", get(health))
        .route("/books", get(list_books))
        .route("/books/search", get(search_books))
        .route("/books/top-rated", get(top_rated_books))
        .route("/books/price-range", get(books_by_price_range))
        .route("/books/:id", get(get_book))
        .route("/categories", get(list_categories))
        .route("/stats/overview", get(stats_overview))
        .route("/stats/categories", get(stats_by_category));

    Router::new()
        .route("/", get(index))
        .route("/apidocs", get(|| async { Html(SWAGGER_UI) }))
        .route(OPENAPI_PATH, get(openapi_document))
        .nest(API_PREFIX, api)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(addr: SocketAddr, state: AppState) -> anyhow::Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|err| anyhow::anyhow!("bind {addr}: {err}"))?;
    tracing::info!(%addr, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(tokio::signal::ctrl_c()))
        .await?;
    Ok(())
}

/// Resolves once `signal` fires. If the handler could not be installed, never resolves.
async fn shutdown_signal<F>(signal: F)
where
    F: Future<Output = std::io::Result<()>>,
{
    match signal.await {
        Ok(()) => tracing::info!("shutting down"),
        Err(err) => {
            tracing::warn!(?err, "failed to listen for ctrl-c; graceful shutdown disabled");
            std::future::pending::<()>().await;
        }
    }
}

async fn openapi_document() -> Json<serde_json::Value> {
    Json(crate::openapi::document())
}

async fn index() -> Html<&'static str> {
    Html(
        r#"<!doctype html>
<html>
  <head><meta charset="utf-8"><title>bookscrape</title></head>
  <body>
    <h1>bookscrape</h1>
    <p>Read-only API over books scraped from books.toscrape.com.</p>
    <h2>Catalogue</h2>
    <ul>
      <li><code>GET /api/v1/health</code></li>
      <li><code>GET /api/v1/books</code></li>
      <li><code>GET /api/v1/books/{id}</code></li>
      <li><code>GET /api/v1/books/search?title=&amp;category=</code></li>
      <li><code>GET /api/v1/categories</code></li>
    </ul>
    <h2>Insights</h2>
    <ul>
      <li><code>GET /api/v1/books/top-rated</code></li>
      <li><code>GET /api/v1/books/price-range?min=&amp;max=</code></li>
      <li><code>GET /api/v1/stats/overview</code></li>
      <li><code>GET /api/v1/stats/categories</code></li>
    </ul>
    <p>Interactive docs: <a href="/apidocs">/apidocs</a></p>
  </body>
</html>
"#,
    )
}

async fn health(State(state): State<AppState>) -> Result<Json<HealthReport>, ApiError> {
    state
        .store
        .ping()
        .map_err(|err| ApiError::StoreUnavailable(format!("{err:#}")))?;

    Ok(Json(HealthReport {
        status: "ok".to_owned(),
        message: "API is healthy and connected to the book store".to_owned(),
        book_count: state.store.len(),
    }))
}

async fn list_books(State(state): State<AppState>) -> Json<Vec<Book>> {
    Json(state.store.get_all().to_vec())
}

/// Anything that is not a plain decimal id is reported as an unknown book.
async fn get_book(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
) -> Result<Json<Book>, ApiError> {
    let Path(raw) = path.map_err(|err| ApiError::NotFound(err.body_text()))?;
    parse_book_id(&raw)
        .and_then(|id| state.store.get_by_id(id))
        .cloned()
        .map(Json)
        .ok_or(ApiError::NotFound(raw))
}

fn parse_book_id(raw: &str) -> Option<u64> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    raw.parse().ok()
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    title: Option<String>,
    category: Option<String>,
}

async fn search_books(
    State(state): State<AppState>,
    Query(q): Query<SearchQuery>,
) -> Json<Vec<Book>> {
    Json(
        state
            .store
            .search(q.title.as_deref(), q.category.as_deref()),
    )
}

async fn list_categories(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.store.list_categories())
}

async fn top_rated_books(State(state): State<AppState>) -> Json<Vec<Book>> {
    Json(state.store.filter_top_rated())
}

/// Bounds stay strings here so a bad number becomes our own 400 body.
#[derive(Debug, Deserialize)]
struct PriceRangeQuery {
    min: Option<String>,
    max: Option<String>,
}

async fn books_by_price_range(
    State(state): State<AppState>,
    Query(q): Query<PriceRangeQuery>,
) -> Result<Json<Vec<Book>>, ApiError> {
    let min = parse_price_bound("min", q.min.as_deref())?;
    let max = parse_price_bound("max", q.max.as_deref())?;
    Ok(Json(state.store.filter_by_price_range(min, max)))
}

fn parse_price_bound(name: &str, raw: Option<&str>) -> Result<Option<f64>, ApiError> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    raw.trim().parse::<f64>().map(Some).map_err(|_| {
        ApiError::InvalidArgument(format!(
            "invalid price format for {name}: {raw:?}; please use numbers"
        ))
    })
}

async fn stats_overview(State(state): State<AppState>) -> Json<StatsOverview> {
    Json(state.store.stats_overview())
}

async fn stats_by_category(
    State(state): State<AppState>,
) -> Json<BTreeMap<String, CategoryStats>> {
    Json(state.store.stats_by_category())
}
