use std::fs;
use std::path::Path;

use tracing::{info, warn};

use crate::catalog::product::CatalogRow;

pub const DEFAULT_PRUNE_FROM: usize = 300;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PruneSummary {
    pub dry_run: bool,
    pub considered: usize,
    /// Deleted, or would be deleted in dry-run mode.
    pub deleted: usize,
    pub missing: usize,
    pub errors: usize,
}

/// Remove downloaded `<clave1>.jpg` images for every row from index `from`
/// onward, so those products get re-scraped on the next enrichment run.
pub fn prune_images(
    rows: &[CatalogRow],
    images_dir: &Path,
    from: usize,
    dry_run: bool,
) -> PruneSummary {
    let mut summary = PruneSummary {
        dry_run,
        ..Default::default()
    };
    for row in rows.iter().skip(from) {
        let sku = row.sku.trim();
        if sku.is_empty() {
            continue;
        }
        summary.considered += 1;
        let path = images_dir.join(format!("{sku}.jpg"));
        if !path.exists() {
            summary.missing += 1;
            continue;
        }
        if dry_run {
            info!(sku, path = %path.display(), "would delete");
            summary.deleted += 1;
            continue;
        }
        match fs::remove_file(&path) {
            Ok(()) => summary.deleted += 1,
            Err(e) => {
                warn!(sku, path = %path.display(), error = %e, "delete failed");
                summary.errors += 1;
            }
        }
    }
    summary
}
