//! Best-effort product image search.
//!
//! A [`ScrapeSession`] owns one HTTP client configured like a desktop browser
//! and walks the configured search sources in order until one yields an image
//! that can be stored. Outcomes are typed so callers can tell "nothing found"
//! apart from "the source was unreachable".
use std::path::Path;
use std::time::Duration;

use base64::Engine;
use reqwest::{header, Client, StatusCode};
use scraper::{Html, Selector};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::enrich::pause::PauseRange;

const BROWSER_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScrapeFailure {
    #[error("no image results")]
    NoResults,
    #[error("request timed out")]
    Timeout,
    #[error("network error: {0}")]
    Network(String),
    #[error("could not store image: {0}")]
    Storage(String),
}

impl ScrapeFailure {
    pub fn kind(&self) -> &'static str {
        match self {
            ScrapeFailure::NoResults => "no_results",
            ScrapeFailure::Timeout => "timeout",
            ScrapeFailure::Network(_) => "network",
            ScrapeFailure::Storage(_) => "storage",
        }
    }
}

impl From<reqwest::Error> for ScrapeFailure {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ScrapeFailure::Timeout
        } else {
            ScrapeFailure::Network(e.to_string())
        }
    }
}

/// A successful fetch and the source it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageHit {
    pub source: String,
}

/// An image search page and the CSS selectors of its result thumbnails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageSource {
    pub name: String,
    /// Search URL with a `{q}` placeholder for the encoded query.
    pub url_template: String,
    pub selectors: Vec<String>,
}

impl ImageSource {
    pub fn new(name: &str, url_template: &str, selectors: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            url_template: url_template.to_string(),
            selectors: selectors.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn bing() -> Self {
        Self::new(
            "Bing",
            "https://www.bing.com/images/search?q={q}&form=HDRSC2",
            &["img.mimg", "a.iusc img", ".iuscp img"],
        )
    }

    pub fn google() -> Self {
        Self::new(
            "Google",
            "https://www.google.com/search?q={q}&tbm=isch",
            &["img.Q4LuWd", "img.YQ4gaf", "div[data-ri] img", "g-img img"],
        )
    }

    pub fn search_url(&self, query: &str) -> String {
        self.url_template
            .replace("{q}", &urlencoding::encode(query))
    }
}

#[derive(Debug, Clone)]
pub struct ScraperConfig {
    /// Tried in order. Bing rarely serves a captcha, Google is the fallback.
    pub sources: Vec<ImageSource>,
    pub query_suffix: String,
    pub page_timeout: Duration,
    pub download_timeout: Duration,
    pub source_pause: PauseRange,
    pub accept_language: String,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            sources: vec![ImageSource::bing(), ImageSource::google()],
            query_suffix: "repostería pastelería".to_string(),
            page_timeout: Duration::from_secs(8),
            download_timeout: Duration::from_secs(10),
            source_pause: PauseRange::default(),
            accept_language: "es-MX,es;q=0.9".to_string(),
        }
    }
}

/// Search query for a product: SKU first, quoted name, then the domain hint.
pub fn build_query(sku: &str, name: &str, suffix: &str) -> String {
    format!("{sku} \"{name}\" {suffix}").trim().to_string()
}

/// Scraping session. Created once per stage run and closed on drop.
pub struct ScrapeSession {
    http: Client,
    cfg: ScraperConfig,
}

impl ScrapeSession {
    pub fn open(cfg: ScraperConfig) -> anyhow::Result<Self> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT_LANGUAGE,
            header::HeaderValue::from_str(&cfg.accept_language)?,
        );
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static(
                "text/html,application/xhtml+xml,image/avif,image/webp,*/*;q=0.8",
            ),
        );
        let http = Client::builder()
            .user_agent(BROWSER_UA)
            .default_headers(headers)
            .timeout(cfg.page_timeout.max(cfg.download_timeout))
            .build()?;
        info!(sources = cfg.sources.len(), "image scrape session opened");
        Ok(Self { http, cfg })
    }

    /// Try every source until an image is stored at `dest`.
    ///
    /// When every source fails, the most specific failure seen is returned:
    /// a transport or storage error wins over a plain "no results".
    pub async fn fetch_image(
        &self,
        sku: &str,
        name: &str,
        dest: &Path,
    ) -> Result<ImageHit, ScrapeFailure> {
        let query = build_query(sku, name, &self.cfg.query_suffix);
        let mut failure = ScrapeFailure::NoResults;

        for source in &self.cfg.sources {
            self.cfg.source_pause.sleep().await;
            let src = match self.search(source, &query).await {
                Ok(Some(src)) => src,
                Ok(None) => {
                    warn!(sku, source = %source.name, "no image results");
                    continue;
                }
                Err(e) => {
                    warn!(sku, source = %source.name, error = %e, "image search failed");
                    failure = e;
                    continue;
                }
            };
            match self.store(&src, dest).await {
                Ok(()) => {
                    info!(sku, source = %source.name, path = %dest.display(), "image saved");
                    return Ok(ImageHit {
                        source: source.name.clone(),
                    });
                }
                Err(e) => {
                    warn!(sku, source = %source.name, error = %e, "image download failed");
                    failure = e;
                }
            }
        }
        Err(failure)
    }

    async fn search(
        &self,
        source: &ImageSource,
        query: &str,
    ) -> Result<Option<String>, ScrapeFailure> {
        let url = source.search_url(query);
        debug!(%url, "searching images");
        let resp = self
            .http
            .get(&url)
            .timeout(self.cfg.page_timeout)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(ScrapeFailure::Network(format!(
                "{} returned {}",
                source.name,
                resp.status()
            )));
        }
        let body = resp.text().await?;
        Ok(first_image_src(&body, &source.selectors))
    }

    async fn store(&self, src: &str, dest: &Path) -> Result<(), ScrapeFailure> {
        let bytes = if src.starts_with("data:image") {
            decode_data_url(src)
                .ok_or_else(|| ScrapeFailure::Storage("undecodable data url".into()))?
        } else {
            let resp = self
                .http
                .get(src)
                .timeout(self.cfg.download_timeout)
                .send()
                .await?;
            if resp.status() != StatusCode::OK {
                return Err(ScrapeFailure::Network(format!(
                    "image download returned {}",
                    resp.status()
                )));
            }
            resp.bytes().await?.to_vec()
        };
        if bytes.is_empty() {
            return Err(ScrapeFailure::Storage("empty image body".into()));
        }
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ScrapeFailure::Storage(e.to_string()))?;
        }
        tokio::fs::write(dest, &bytes)
            .await
            .map_err(|e| ScrapeFailure::Storage(e.to_string()))
    }
}

impl Drop for ScrapeSession {
    fn drop(&mut self) {
        info!("image scrape session closed");
    }
}

/// First usable image source in `html`, trying `selectors` in order.
///
/// Lazy-loaded thumbnails keep the real URL in `data-src` and a tiny GIF in
/// `src`; the GIF placeholder is never returned.
pub fn first_image_src(html: &str, selectors: &[String]) -> Option<String> {
    let doc = Html::parse_document(html);
    for raw in selectors {
        let Ok(selector) = Selector::parse(raw) else {
            continue;
        };
        for el in doc.select(&selector) {
            let attrs = el.value();
            let candidate = [attrs.attr("src"), attrs.attr("data-src")]
                .into_iter()
                .flatten()
                .map(str::trim)
                .find(|s| usable_src(s));
            if let Some(src) = candidate {
                return Some(src.to_string());
            }
        }
    }
    None
}

fn usable_src(src: &str) -> bool {
    if src.starts_with("data:image/gif") {
        return false;
    }
    src.starts_with("data:image") || src.starts_with("http://") || src.starts_with("https://")
}

/// Decode a `data:image/...;base64,` URL.
pub fn decode_data_url(src: &str) -> Option<Vec<u8>> {
    let (_, encoded) = src.split_once(',')?;
    base64::engine::general_purpose::STANDARD
        .decode(encoded.trim())
        .ok()
}
