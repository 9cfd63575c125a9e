//! Requests, responses and the network seam
//!
//! The controller never talks to the network directly. It goes through a
//! `Fetcher`, which lets the same controller run against a live origin,
//! a local build directory or a scripted fake in tests.

use crate::error::{AssetCacheError, AssetCacheResult};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use tracing::debug;
use url::Url;

/// An intercepted request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    url: Url,
}

impl Request {
    pub fn new(mut url: Url) -> Self {
        url.set_fragment(None);
        Self { url }
    }

    /// Resolve a possibly relative URL against the worker scope.
    ///
    /// `"icons/x.png"` and `"/icons/x.png"` both resolve to the same key
    /// when the scope is the origin root.
    pub fn resolve(scope: &Url, raw: &str) -> AssetCacheResult<Self> {
        let url = scope.join(raw).map_err(|e| AssetCacheError::InvalidUrl {
            url: raw.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self::new(url))
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Key the request is stored under
    pub fn cache_key(&self) -> &str {
        self.url.as_str()
    }
}

/// A response, as stored in and served from the cache
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: Vec<u8>,
}

impl Response {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: BTreeMap::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// 2xx status
    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers.get("content-type").map(String::as_str)
    }
}

/// Network access for the worker
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Perform a request.
    ///
    /// HTTP error statuses are returned as responses; only transport
    /// failures are errors.
    async fn fetch(&self, request: &Request) -> AssetCacheResult<Response>;

    /// Human-readable name for logs
    fn name(&self) -> &'static str;
}

/// Fetches over HTTP
#[derive(Clone)]
pub struct HttpFetcher {
    agent: ureq::Agent,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Self {
        let config = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(timeout))
            .build();
        Self {
            agent: config.into(),
        }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &Request) -> AssetCacheResult<Response> {
        let agent = self.agent.clone();
        let url = request.url().to_string();

        // ureq is blocking; keep it off the worker's event loop
        tokio::task::spawn_blocking(move || fetch_blocking(&agent, &url))
            .await
            .map_err(|e| AssetCacheError::Internal(format!("fetch task failed: {e}")))?
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

fn fetch_blocking(agent: &ureq::Agent, url: &str) -> AssetCacheResult<Response> {
    debug!("GET {}", url);
    let mut response = agent
        .get(url)
        .call()
        .map_err(|e| AssetCacheError::network(url, e.to_string()))?;

    let status = response.status().as_u16();
    let mut headers = BTreeMap::new();
    for (name, value) in response.headers() {
        if let Ok(value) = value.to_str() {
            headers.insert(name.as_str().to_ascii_lowercase(), value.to_string());
        }
    }

    let body = response
        .body_mut()
        .read_to_vec()
        .map_err(|e| AssetCacheError::network(url, e.to_string()))?;

    Ok(Response {
        status,
        headers,
        body,
    })
}

/// Serves requests from a build output directory.
///
/// Stands in for the origin when installing straight from `out_dir`.
/// Missing files are 404 responses, as a static server would return.
#[derive(Debug, Clone)]
pub struct DirFetcher {
    root: PathBuf,
}

impl DirFetcher {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn file_for(&self, url: &Url) -> Option<PathBuf> {
        let path = url.path().trim_start_matches('/');
        let path = if path.is_empty() || path.ends_with('/') {
            format!("{}index.html", path)
        } else {
            path.to_string()
        };

        let relative = Path::new(&path);
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return None;
        }
        Some(self.root.join(relative))
    }
}

#[async_trait]
impl Fetcher for DirFetcher {
    async fn fetch(&self, request: &Request) -> AssetCacheResult<Response> {
        let Some(path) = self.file_for(request.url()) else {
            return Ok(Response::new(404, Vec::new()));
        };

        match tokio::fs::read(&path).await {
            Ok(body) => {
                let mime = mime_guess::from_path(&path).first_or_octet_stream();
                Ok(Response::new(200, body).with_header("content-type", mime.as_ref()))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Ok(Response::new(404, Vec::new()))
            }
            Err(e) => Err(AssetCacheError::network(
                request.url().as_str(),
                e.to_string(),
            )),
        }
    }

    fn name(&self) -> &'static str {
        "dir"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn scope() -> Url {
        Url::parse("http://localhost:8080/").unwrap()
    }

    #[test]
    fn relative_and_absolute_resolve_to_same_key() {
        let a = Request::resolve(&scope(), "icons/icon-512x512.png").unwrap();
        let b = Request::resolve(&scope(), "/icons/icon-512x512.png").unwrap();
        assert_eq!(a.cache_key(), b.cache_key());
        assert_eq!(a.cache_key(), "http://localhost:8080/icons/icon-512x512.png");
    }

    #[test]
    fn fragment_is_not_part_of_key() {
        let request = Request::resolve(&scope(), "/index.html#top").unwrap();
        assert_eq!(request.cache_key(), "http://localhost:8080/index.html");
    }

    #[test]
    fn response_status_classes() {
        assert!(Response::new(200, "ok").is_ok());
        assert!(Response::new(204, "").is_ok());
        assert!(!Response::new(304, "").is_ok());
        assert!(!Response::new(404, "").is_ok());
    }

    #[tokio::test]
    async fn dir_fetcher_serves_files_with_mime() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("index.css"), "body{}").unwrap();
        std::fs::write(dir.path().join("index.html"), "<html/>").unwrap();
        let fetcher = DirFetcher::new(dir.path());

        let css = fetcher
            .fetch(&Request::resolve(&scope(), "/index.css").unwrap())
            .await
            .unwrap();
        assert_eq!(css.status, 200);
        assert_eq!(css.body, b"body{}");
        assert_eq!(css.content_type(), Some("text/css"));

        let root = fetcher
            .fetch(&Request::resolve(&scope(), "/").unwrap())
            .await
            .unwrap();
        assert_eq!(root.body, b"<html/>");
    }

    #[tokio::test]
    async fn dir_fetcher_missing_is_404() {
        let dir = TempDir::new().unwrap();
        let fetcher = DirFetcher::new(dir.path());

        let response = fetcher
            .fetch(&Request::resolve(&scope(), "/b.js").unwrap())
            .await
            .unwrap();
        assert_eq!(response.status, 404);
    }
}
