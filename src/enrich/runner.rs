use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{info, warn};

use crate::catalog::product::CatalogRow;
use crate::enrich::checkpoint::{CheckpointRecord, SnapshotSink};
use crate::enrich::describe::{DescribeError, DEFAULT_MODEL, DEFAULT_OLLAMA_URL};
use crate::enrich::image_map::{ImageMapEntry, ImageMapWriter};
use crate::enrich::pause::PauseRange;
use crate::enrich::scraper::{ImageHit, ScrapeFailure, ScraperConfig};

/// Reserved image name meaning "nothing found". Never written to the map.
pub const PLACEHOLDER_IMAGE: &str = "error_no_encontrado.jpg";

/// Slow, fallible per-product side effects of the enrichment stage.
#[async_trait]
pub trait ProductEnricher: Send + Sync {
    async fn fetch_image(&self, product: &CatalogRow, dest: &Path)
        -> Result<ImageHit, ScrapeFailure>;

    async fn describe(&self, product: &CatalogRow) -> Result<String, DescribeError>;
}

#[derive(Debug, Clone)]
pub struct EnrichConfig {
    pub start: usize,
    pub limit: Option<usize>,
    /// Regenerate descriptions that were already enriched.
    pub force: bool,
    pub checkpoint_interval: usize,
    /// Pause after each row.
    pub pause: PauseRange,
    pub images_dir: PathBuf,
    pub model: String,
    pub ollama_url: String,
    pub describe_timeout: Duration,
    pub scraper: ScraperConfig,
}

impl Default for EnrichConfig {
    fn default() -> Self {
        Self {
            start: 0,
            limit: None,
            force: false,
            checkpoint_interval: 10,
            pause: PauseRange::default(),
            images_dir: PathBuf::from("product_images"),
            model: DEFAULT_MODEL.to_string(),
            ollama_url: DEFAULT_OLLAMA_URL.to_string(),
            describe_timeout: Duration::from_secs(60),
            scraper: ScraperConfig::default(),
        }
    }
}

impl EnrichConfig {
    /// Index range of the working subset for a table of `total` rows.
    pub fn window(&self, total: usize) -> std::ops::Range<usize> {
        let start = self.start.min(total);
        let end = match self.limit {
            Some(limit) => start.saturating_add(limit).min(total),
            None => total,
        };
        start..end
    }

    pub fn image_path(&self, sku: &str) -> PathBuf {
        self.images_dir.join(format!("{sku}.jpg"))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnrichSummary {
    pub start: usize,
    pub end: usize,
    pub processed: usize,
    pub images_fetched: usize,
    pub images_reused: usize,
    pub images_missing: usize,
    pub descriptions_generated: usize,
    pub descriptions_reused: usize,
    pub descriptions_fallback: usize,
    pub snapshots: usize,
}

/// Carry descriptions of a previous run's output over onto a fresh load,
/// by position. Returns how many rows received a prior description.
pub fn overlay_descriptions(rows: &mut [CatalogRow], prior: &[String]) -> usize {
    let mut applied = 0;
    for (row, desc) in rows.iter_mut().zip(prior) {
        if desc.trim().is_empty() {
            continue;
        }
        row.description = desc.clone();
        applied += 1;
    }
    applied
}

/// Enrich the configured window of `rows` in order.
///
/// Per row the image is acquired first (an existing `<sku>.jpg` counts as
/// already fetched), then the image map row is appended regardless of the
/// outcome, then the description is regenerated if it is still the default
/// or `force` is set. The whole table goes to `sink` every
/// `checkpoint_interval` processed rows and after the last one.
pub async fn run_enrichment<E, S>(
    rows: &mut [CatalogRow],
    enricher: &E,
    sink: &mut S,
    map: &mut ImageMapWriter,
    cfg: &EnrichConfig,
) -> Result<EnrichSummary>
where
    E: ProductEnricher + ?Sized,
    S: SnapshotSink + ?Sized,
{
    let total = rows.len();
    let window = cfg.window(total);
    let interval = cfg.checkpoint_interval.max(1);
    let mut summary = EnrichSummary {
        start: window.start,
        end: window.end,
        ..Default::default()
    };
    if window.is_empty() {
        warn!(start = cfg.start, total, "nothing to enrich in the requested window");
        return Ok(summary);
    }
    info!(
        start = window.start,
        end = window.end,
        total,
        force = cfg.force,
        "enrichment started"
    );

    let last = window.end - 1;
    for idx in window {
        let local = acquire_image(&rows[idx], enricher, cfg, &mut summary).await;
        let row = &rows[idx];
        map.append(&ImageMapEntry::new(
            row.sku.trim(),
            row.name.as_str(),
            local.as_deref(),
        ))
        .with_context(|| format!("failed to append image map row for {}", row.sku))?;

        if cfg.force || row.has_default_description() {
            let outcome = enricher.describe(row).await;
            match outcome {
                Ok(text) => {
                    rows[idx].description = text;
                    summary.descriptions_generated += 1;
                }
                Err(e) => {
                    warn!(sku = %rows[idx].sku, error = %e, "description failed, keeping current");
                    summary.descriptions_fallback += 1;
                }
            }
        } else {
            summary.descriptions_reused += 1;
        }

        summary.processed += 1;
        if summary.processed % interval == 0 || idx == last {
            let record = CheckpointRecord::new(idx + 1, summary.processed, total);
            sink.persist(rows, &record)?;
            summary.snapshots += 1;
        }
        if idx != last {
            cfg.pause.sleep().await;
        }
    }

    info!(
        processed = summary.processed,
        images_fetched = summary.images_fetched,
        images_missing = summary.images_missing,
        descriptions_generated = summary.descriptions_generated,
        "enrichment finished"
    );
    Ok(summary)
}

async fn acquire_image<E: ProductEnricher + ?Sized>(
    row: &CatalogRow,
    enricher: &E,
    cfg: &EnrichConfig,
    summary: &mut EnrichSummary,
) -> Option<PathBuf> {
    let sku = row.sku.trim();
    if sku.is_empty() {
        warn!(name = %row.name, "row has no clave1, skipping image");
        summary.images_missing += 1;
        return None;
    }
    let dest = cfg.image_path(sku);
    if dest.exists() {
        summary.images_reused += 1;
        return Some(dest);
    }
    match enricher.fetch_image(row, &dest).await {
        Ok(hit) => {
            info!(sku, source = %hit.source, "image fetched");
            summary.images_fetched += 1;
            Some(dest)
        }
        Err(failure) => {
            warn!(
                sku,
                reason = failure.kind(),
                error = %failure,
                placeholder = PLACEHOLDER_IMAGE,
                "no image"
            );
            summary.images_missing += 1;
            None
        }
    }
}
