use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::catalog::columns::ResolvedColumns;
use crate::normalization::price::{format_price, parse_price_opt};

/// Column order of the canonical table. Always exactly these, in this order.
pub const CATALOG_COLUMNS: [&str; 11] = [
    "nombre",
    "descripcion",
    "precio",
    "departamento",
    "categoria",
    "clave1",
    "clave2",
    "codigo_sat",
    "disponible",
    "destacado",
    "temporada",
];

/// Token the source locale uses for "yes" in the inventariable column.
const AVAILABLE_TOKEN: &str = "SI";

/// One product of the canonical catalog table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogRow {
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "descripcion", default)]
    pub description: String,
    #[serde(
        rename = "precio",
        serialize_with = "serialize_price",
        deserialize_with = "deserialize_price"
    )]
    pub price: f64,
    #[serde(rename = "departamento")]
    pub department: String,
    #[serde(rename = "categoria")]
    pub category: String,
    /// Primary key (`clave1`), used as the SKU downstream.
    #[serde(rename = "clave1")]
    pub sku: String,
    #[serde(rename = "clave2")]
    pub barcode: String,
    #[serde(rename = "codigo_sat", default)]
    pub sat_code: String,
    #[serde(rename = "disponible", deserialize_with = "deserialize_flag")]
    pub available: bool,
    #[serde(rename = "destacado", deserialize_with = "deserialize_flag", default)]
    pub featured: bool,
    #[serde(rename = "temporada", deserialize_with = "deserialize_flag", default)]
    pub seasonal: bool,
}

impl CatalogRow {
    /// A description is the un-enriched default while it is empty or still
    /// equal to the product name.
    pub fn has_default_description(&self) -> bool {
        self.description.is_empty() || self.description == self.name
    }
}

/// Map one source row onto the canonical schema. Total: missing cells become
/// empty strings / `false`.
pub fn project(row: &[String], cols: &ResolvedColumns) -> CatalogRow {
    let cell = |col: usize| row.get(col).map(|s| s.trim()).unwrap_or("");
    let name = cell(cols.descripcion).to_string();
    CatalogRow {
        description: name.clone(),
        name,
        price: parse_price_opt(row.get(cols.precio).map(String::as_str)),
        department: cell(cols.departamento).to_string(),
        category: cell(cols.categoria).to_string(),
        sku: cell(cols.clave1).to_string(),
        barcode: cell(cols.clave2).to_string(),
        sat_code: cols.codigo_sat.map(cell).unwrap_or("").to_string(),
        available: cell(cols.inventariable).to_uppercase() == AVAILABLE_TOKEN,
        featured: false,
        seasonal: false,
    }
}

/// Overwrite `path` with the full table. The file is written next to the
/// target and renamed into place, so readers never see a half-written table.
pub fn write_catalog(path: &Path, rows: &[CatalogRow]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let tmp = path.with_extension("csv.tmp");
    {
        let mut wtr = csv::Writer::from_path(&tmp)
            .with_context(|| format!("failed to open {}", tmp.display()))?;
        if rows.is_empty() {
            wtr.write_record(CATALOG_COLUMNS)?;
        }
        for row in rows {
            wtr.serialize(row)?;
        }
        wtr.flush()?;
    }
    fs::rename(&tmp, path).with_context(|| format!("failed to replace {}", path.display()))?;
    Ok(())
}

pub fn read_catalog(path: &Path) -> Result<Vec<CatalogRow>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("failed to open catalog {}", path.display()))?;
    let mut rows = Vec::new();
    for (idx, rec) in rdr.deserialize::<CatalogRow>().enumerate() {
        rows.push(rec.with_context(|| format!("{}: bad row {}", path.display(), idx + 2))?);
    }
    Ok(rows)
}

/// Only the description column of a previous output, positionally. Used to
/// carry enrichment over onto a freshly loaded table.
pub fn read_descriptions(path: &Path) -> Result<Option<Vec<String>>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    let Some(col) = rdr.headers()?.iter().position(|h| h == "descripcion") else {
        return Ok(None);
    };
    let mut out = Vec::new();
    for rec in rdr.records() {
        let rec = rec?;
        out.push(rec.get(col).unwrap_or("").to_string());
    }
    Ok(Some(out))
}

fn serialize_price<S: Serializer>(v: &f64, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&format_price(*v))
}

fn deserialize_price<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
    let raw = String::deserialize(d)?;
    Ok(crate::normalization::price::parse_price(&raw))
}

/// Accepts `true`/`True`/`1`/`si`/`yes` as true, anything else as false.
fn deserialize_flag<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
    let raw = String::deserialize(d)?;
    let v = raw.trim().to_lowercase();
    Ok(matches!(v.as_str(), "true" | "1" | "si" | "sí" | "yes"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cols() -> ResolvedColumns {
        ResolvedColumns {
            descripcion: 0,
            precio: 1,
            departamento: 2,
            categoria: 3,
            clave1: 4,
            clave2: 5,
            inventariable: 6,
            codigo_sat: Some(7),
        }
    }

    fn strings(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn projects_and_trims_every_field() {
        let row = strings(&[
            "  Harina 1kg ",
            "$1,020.5",
            " Abarrotes",
            "Harinas ",
            " H001 ",
            "7501 ",
            " si ",
            " 50181900",
        ]);
        let p = project(&row, &cols());
        assert_eq!(p.name, "Harina 1kg");
        assert_eq!(p.description, "Harina 1kg");
        assert_eq!(p.price, 1020.5);
        assert_eq!(p.department, "Abarrotes");
        assert_eq!(p.sku, "H001");
        assert_eq!(p.barcode, "7501");
        assert_eq!(p.sat_code, "50181900");
        assert!(p.available);
        assert!(!p.featured && !p.seasonal);
        assert!(p.has_default_description());
    }

    #[test]
    fn missing_optional_cells_default() {
        let row = strings(&["Molde", "10", "Utensilios", "Moldes", "M1", ""]);
        let p = project(&row, &cols());
        assert_eq!(p.sat_code, "");
        assert!(!p.available);

        let no_sat = ResolvedColumns {
            codigo_sat: None,
            ..cols()
        };
        assert_eq!(project(&row, &no_sat).sat_code, "");
    }

    #[test]
    fn only_exact_yes_token_is_available() {
        for (raw, want) in [("SI", true), ("Si", true), ("SÍ", false), ("S", false), ("NO", false)] {
            let row = strings(&["x", "1", "d", "c", "k", "b", raw]);
            assert_eq!(project(&row, &cols()).available, want, "raw = {raw}");
        }
    }

    #[test]
    fn writes_fixed_columns_and_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("catalog.csv");
        let row = project(
            &strings(&["Pan", "12.5", "Panadería", "Dulce", "P1", "", "SI", ""]),
            &cols(),
        );
        write_catalog(&path, &[row.clone()]).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next().unwrap(), CATALOG_COLUMNS.join(","));
        assert_eq!(
            lines.next().unwrap(),
            "Pan,Pan,12.50,Panadería,Dulce,P1,,,true,false,false"
        );
        assert_eq!(read_catalog(&path).unwrap(), vec![row]);
        assert!(!path.with_extension("csv.tmp").exists());
    }

    #[test]
    fn empty_table_still_has_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.csv");
        write_catalog(&path, &[]).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.trim_end(), CATALOG_COLUMNS.join(","));
        assert!(read_catalog(&path).unwrap().is_empty());
    }

    #[test]
    fn reads_capitalized_booleans() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("legacy.csv");
        std::fs::write(
            &path,
            "nombre,descripcion,precio,departamento,categoria,clave1,clave2,codigo_sat,disponible,destacado,temporada\n\
             Pan,Rico pan,3.0,D,C,P1,,,True,False,False\n",
        )
        .unwrap();
        let rows = read_catalog(&path).unwrap();
        assert!(rows[0].available);
        assert_eq!(rows[0].price, 3.0);
        assert_eq!(read_descriptions(&path).unwrap(), Some(vec!["Rico pan".to_string()]));
    }
}
