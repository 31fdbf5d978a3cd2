use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::info;

use crate::catalog::product::{read_catalog, read_descriptions};
use crate::enrich::checkpoint::{load_record, record_path_for};
use crate::enrich::runner::overlay_descriptions;
use crate::enrich::{
    run_enrichment, EnrichConfig, EnrichSummary, FileSnapshotSink, ImageMapWriter,
    ProductEnricher, WebEnricher,
};

#[derive(Debug, Clone)]
pub struct EnrichCommandConfig {
    /// Canonical table produced by `convert`.
    pub input: PathBuf,
    /// Enriched table, rewritten at every snapshot.
    pub output: PathBuf,
    pub image_map: PathBuf,
    /// Explicit start offset; overrides `resume`.
    pub start: Option<usize>,
    /// Start from the last checkpoint record when no start is given.
    pub resume: bool,
    pub enrich: EnrichConfig,
}

pub async fn run(cfg: EnrichCommandConfig) -> Result<EnrichSummary> {
    let enricher = WebEnricher::open(&cfg.enrich)?;
    run_with(cfg, &enricher).await
}

/// Same as [`run`] with a caller-supplied enricher.
pub async fn run_with<E>(mut cfg: EnrichCommandConfig, enricher: &E) -> Result<EnrichSummary>
where
    E: ProductEnricher + ?Sized,
{
    let mut rows = read_catalog(&cfg.input)
        .with_context(|| format!("run `catalog convert` first ({})", cfg.input.display()))?;

    if cfg.output.exists() {
        if let Some(prior) = read_descriptions(&cfg.output)? {
            let carried = overlay_descriptions(&mut rows, &prior);
            info!(carried, path = %cfg.output.display(), "previous descriptions carried over");
        }
    }

    cfg.enrich.start = resolve_start(&cfg, rows.len());
    let mut sink = FileSnapshotSink::new(&cfg.output);
    let mut map = ImageMapWriter::new(&cfg.image_map);
    let summary = run_enrichment(&mut rows, enricher, &mut sink, &mut map, &cfg.enrich).await?;

    println!(
        "enrich: rows {}..{} of {} ({} processed)",
        summary.start,
        summary.end,
        rows.len(),
        summary.processed
    );
    println!(
        "  images:       {} fetched, {} reused, {} missing",
        summary.images_fetched, summary.images_reused, summary.images_missing
    );
    println!(
        "  descriptions: {} generated, {} reused, {} fell back",
        summary.descriptions_generated, summary.descriptions_reused, summary.descriptions_fallback
    );
    println!("  snapshots:    {}", summary.snapshots);
    println!("  table:        {}", cfg.output.display());
    println!("  images in:    {}", cfg.enrich.images_dir.display());
    Ok(summary)
}

fn resolve_start(cfg: &EnrichCommandConfig, total: usize) -> usize {
    if let Some(start) = cfg.start {
        return start;
    }
    if !cfg.resume {
        return 0;
    }
    let record_path = record_path_for(&cfg.output);
    match load_record(&record_path).and_then(|r| r.resume_offset(total)) {
        Some(offset) => {
            info!(offset, record = %record_path.display(), "resuming from checkpoint");
            offset
        }
        None => 0,
    }
}
