//! Raw vendor export → canonical catalog table.
pub mod columns;
pub mod convert;
pub mod product;
pub mod source;

pub use columns::{ColumnError, LogicalField, ResolvedColumns};
pub use convert::{convert_inventory, ConversionSummary, PriceStrategy};
pub use product::{read_catalog, write_catalog, CatalogRow, CATALOG_COLUMNS};
pub use source::SourceTable;
