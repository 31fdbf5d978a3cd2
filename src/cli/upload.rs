use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::enrich::image_map::{load_image_map, save_image_map};
use crate::sync::{reconcile_uploads, ReconcileConfig, ReconcileSummary};
use crate::sync::{SupabaseClient, SupabaseCredentials};

#[derive(Debug, Clone)]
pub struct UploadCommandConfig {
    pub image_map: PathBuf,
    pub bucket: String,
    pub live: bool,
    pub checkpoint_interval: usize,
}

pub async fn run(cfg: UploadCommandConfig) -> Result<ReconcileSummary> {
    let creds = SupabaseCredentials::from_env()?;
    let client = SupabaseClient::new(creds, &cfg.bucket)?;
    let mut entries = load_image_map(&cfg.image_map)
        .with_context(|| format!("run `catalog enrich` first ({})", cfg.image_map.display()))?;

    let reconcile = ReconcileConfig {
        dry_run: !cfg.live,
        checkpoint_interval: cfg.checkpoint_interval,
    };
    let map_path = cfg.image_map.clone();
    let summary = reconcile_uploads(&mut entries, &client, &reconcile, |all| {
        save_image_map(&map_path, all)
    })
    .await?;

    let mode = if cfg.live { "LIVE" } else { "DRY-RUN" };
    println!("upload [{mode}] bucket {}", client.bucket());
    println!("  entries:          {}", summary.total);
    println!("  pending:          {}", summary.pending);
    println!("  already uploaded: {}", summary.already_uploaded);
    if cfg.live {
        println!("  uploaded:         {}", summary.uploaded);
        println!("  not in products:  {}", summary.not_found);
    } else {
        println!("  would upload:     {}", summary.uploaded);
    }
    println!("  errors:           {}", summary.errors);
    if !cfg.live {
        println!("run again with --live to upload");
    }
    Ok(summary)
}
