use std::path::Path;

use anyhow::Result;
use tracing::{error, info, warn};

use crate::enrich::image_map::ImageMapEntry;
use crate::sync::supabase::ImageSync;

#[derive(Debug, Clone)]
pub struct ReconcileConfig {
    /// Decide and log only; no uploads, no patches, nothing persisted.
    pub dry_run: bool,
    pub checkpoint_interval: usize,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            dry_run: true,
            checkpoint_interval: 50,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub dry_run: bool,
    pub total: usize,
    pub pending: usize,
    pub already_uploaded: usize,
    /// Uploaded, or would be uploaded in dry-run mode.
    pub uploaded: usize,
    /// Uploaded but no products row matched the SKU.
    pub not_found: usize,
    pub errors: usize,
    pub snapshots: usize,
}

/// Upload every pending image map entry and point its product at the public
/// URL.
///
/// Per-entry failures (missing file, rejected upload, failed patch) are
/// logged and counted; the loop always continues. In live mode the full map
/// is handed to `persist` every `checkpoint_interval` pending entries and
/// after the last one.
pub async fn reconcile_uploads<S, P>(
    entries: &mut [ImageMapEntry],
    sync: &S,
    cfg: &ReconcileConfig,
    mut persist: P,
) -> Result<ReconcileSummary>
where
    S: ImageSync + ?Sized,
    P: FnMut(&[ImageMapEntry]) -> Result<()>,
{
    let pending: Vec<usize> = entries
        .iter()
        .enumerate()
        .filter(|(_, e)| e.is_pending())
        .map(|(i, _)| i)
        .collect();
    let mut summary = ReconcileSummary {
        dry_run: cfg.dry_run,
        total: entries.len(),
        pending: pending.len(),
        already_uploaded: entries
            .iter()
            .filter(|e| !e.remote_url.trim().is_empty())
            .count(),
        ..Default::default()
    };
    info!(
        total = summary.total,
        pending = summary.pending,
        dry_run = cfg.dry_run,
        "upload reconciliation started"
    );

    let interval = cfg.checkpoint_interval.max(1);
    for (n, &idx) in pending.iter().enumerate() {
        let sku = entries[idx].sku.trim().to_string();
        let local = Path::new(entries[idx].local_path.trim()).to_path_buf();

        if !local.is_file() {
            warn!(%sku, path = %local.display(), "local image missing");
            summary.errors += 1;
        } else if cfg.dry_run {
            info!(%sku, path = %local.display(), "would upload");
            summary.uploaded += 1;
        } else {
            match upload_one(sync, &sku, &local).await {
                Ok((url, rows)) => {
                    if rows == 0 {
                        warn!(%sku, "uploaded, but no product row matched");
                        summary.not_found += 1;
                    } else {
                        info!(%sku, rows, "uploaded");
                    }
                    entries[idx].remote_url = url;
                    summary.uploaded += 1;
                }
                Err(e) => {
                    error!(%sku, error = %e, "upload failed");
                    summary.errors += 1;
                }
            }
        }

        let done = n + 1;
        if !cfg.dry_run && (done % interval == 0 || done == pending.len()) {
            persist(entries)?;
            summary.snapshots += 1;
        }
    }
    Ok(summary)
}

async fn upload_one<S: ImageSync + ?Sized>(
    sync: &S,
    sku: &str,
    local: &Path,
) -> Result<(String, usize)> {
    let bytes = tokio::fs::read(local).await?;
    let url = sync.upload_image(sku, bytes).await?;
    let rows = sync.patch_image_url(sku, &url).await?;
    Ok((url, rows))
}
