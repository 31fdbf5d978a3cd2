use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::info;

use crate::catalog::columns::{resolve, FieldSpec, INVENTORY_FIELDS, LEGACY_INVENTORY_FIELDS};
use crate::catalog::product::{project, write_catalog, CatalogRow};
use crate::catalog::source::SourceTable;

/// How the price column is chosen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PriceStrategy {
    /// Score `precio1` and every "precio con impuestos" header, keep the one
    /// with the most positive prices.
    #[default]
    BestPopulated,
    /// Require `precio1`.
    FirstMatch,
}

impl PriceStrategy {
    pub fn field_specs(&self) -> &'static [FieldSpec] {
        match self {
            PriceStrategy::BestPopulated => INVENTORY_FIELDS,
            PriceStrategy::FirstMatch => LEGACY_INVENTORY_FIELDS,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConversionSummary {
    pub rows: usize,
    pub positive_prices: usize,
    pub price_column: String,
    pub output: PathBuf,
}

/// Resolve and project a whole source table.
pub fn convert_table(
    table: &SourceTable,
    strategy: PriceStrategy,
) -> Result<(Vec<CatalogRow>, String)> {
    let cols = resolve(table, strategy.field_specs())?;
    let price_column = table.headers()[cols.precio].clone();
    let rows = table.rows().iter().map(|r| project(r, &cols)).collect();
    Ok((rows, price_column))
}

/// Read a vendor export and write the canonical catalog table.
pub fn convert_inventory(
    source: &Path,
    dest: &Path,
    strategy: PriceStrategy,
) -> Result<ConversionSummary> {
    let table = SourceTable::from_path(source)?;
    info!(
        source = %source.display(),
        rows = table.len(),
        columns = table.headers().len(),
        "source export loaded"
    );
    let (rows, price_column) = convert_table(&table, strategy)
        .with_context(|| format!("cannot convert {}", source.display()))?;
    write_catalog(dest, &rows)?;

    Ok(ConversionSummary {
        rows: rows.len(),
        positive_prices: rows.iter().filter(|r| r.price > 0.0).count(),
        price_column,
        output: dest.to_path_buf(),
    })
}
