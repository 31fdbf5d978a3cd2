use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::catalog::read_catalog;
use crate::sync::{prune_images, PruneSummary};

#[derive(Debug, Clone)]
pub struct PruneCommandConfig {
    pub catalog: PathBuf,
    pub images_dir: PathBuf,
    pub from: usize,
    pub delete: bool,
}

pub fn run(cfg: PruneCommandConfig) -> Result<PruneSummary> {
    let rows = read_catalog(&cfg.catalog)
        .with_context(|| format!("cannot read {}", cfg.catalog.display()))?;
    let dry_run = !cfg.delete;
    println!(
        "prune [{}]: {} rows from index {}",
        if dry_run { "DRY-RUN" } else { "DELETE" },
        rows.len().saturating_sub(cfg.from),
        cfg.from
    );
    let summary = prune_images(&rows, &cfg.images_dir, cfg.from, dry_run);
    if dry_run {
        println!("  would delete: {}", summary.deleted);
    } else {
        println!("  deleted:      {}", summary.deleted);
    }
    println!("  not present:  {}", summary.missing);
    if summary.errors > 0 {
        println!("  errors:       {}", summary.errors);
    }
    if dry_run {
        println!("run again with --delete to remove the files");
    }
    Ok(summary)
}
