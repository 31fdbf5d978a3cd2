use std::path::PathBuf;

use anyhow::Result;

use crate::catalog::{convert_inventory, ConversionSummary, PriceStrategy};

#[derive(Debug, Clone)]
pub struct ConvertCommandConfig {
    pub source: PathBuf,
    pub output: PathBuf,
    pub strategy: PriceStrategy,
}

pub fn run(cfg: ConvertCommandConfig) -> Result<ConversionSummary> {
    let summary = convert_inventory(&cfg.source, &cfg.output, cfg.strategy)?;
    println!("convert: {} products", summary.rows);
    println!("  prices > 0:   {}", summary.positive_prices);
    println!("  price column: {}", summary.price_column);
    println!("  written to:   {}", summary.output.display());
    Ok(summary)
}
