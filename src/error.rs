use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Failures while talking to the catalogue site. Any of these aborts the crawl.
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("GET {url}")]
    UpstreamFetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("GET {url} returned HTTP {status}")]
    UpstreamStatus { url: String, status: u16 },

    #[error("{url}: missing {field}")]
    Extract { url: String, field: &'static str },

    #[error("resolve url: {0}")]
    Url(#[from] url::ParseError),
}

impl CrawlError {
    pub fn extract(url: impl Into<String>, field: &'static str) -> Self {
        Self::Extract {
            url: url.into(),
            field,
        }
    }
}

/// Errors surfaced by the query API. Converted to a status code and a JSON body.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("book not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    InvalidArgument(String),

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            ApiError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!(err = %self, "request failed");
        }
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}
