pub mod checkpoint;
pub mod describe;
pub mod image_map;
pub mod pause;
pub mod runner;
pub mod scraper;

use std::path::Path;

use async_trait::async_trait;

use crate::catalog::product::CatalogRow;

pub use checkpoint::{CheckpointRecord, FileSnapshotSink, SnapshotSink};
pub use describe::{DescribeError, DescriptionGenerator};
pub use image_map::{ImageMapEntry, ImageMapWriter};
pub use runner::{run_enrichment, EnrichConfig, EnrichSummary, ProductEnricher};
pub use scraper::{ImageHit, ScrapeFailure, ScrapeSession};

/// Live enricher: web image search plus the local language model.
pub struct WebEnricher {
    scraper: ScrapeSession,
    writer: DescriptionGenerator,
}

impl WebEnricher {
    pub fn open(cfg: &EnrichConfig) -> anyhow::Result<Self> {
        Ok(Self {
            scraper: ScrapeSession::open(cfg.scraper.clone())?,
            writer: DescriptionGenerator::new(&cfg.ollama_url, &cfg.model, cfg.describe_timeout)?,
        })
    }
}

#[async_trait]
impl ProductEnricher for WebEnricher {
    async fn fetch_image(
        &self,
        product: &CatalogRow,
        dest: &Path,
    ) -> Result<ImageHit, ScrapeFailure> {
        self.scraper
            .fetch_image(product.sku.trim(), &product.name, dest)
            .await
    }

    async fn describe(&self, product: &CatalogRow) -> Result<String, DescribeError> {
        self.writer.describe(&product.name, &product.category).await
    }
}
