//! Declarative resolution of logical catalog fields to source columns.
//!
//! Each logical field carries an ordered alias list (normalized spellings) and
//! a rule describing how a column is picked. Supporting a new vendor spelling
//! means adding an alias, never a new branch.
use std::collections::HashMap;
use std::fmt;

use thiserror::Error;
use tracing::{debug, warn};

use crate::catalog::source::SourceTable;
use crate::normalization::price::parse_price;

/// Conceptual column of the canonical schema, independent of source spelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalField {
    Descripcion,
    Precio,
    Departamento,
    Categoria,
    Clave1,
    Clave2,
    Inventariable,
    CodigoSat,
}

impl LogicalField {
    pub fn name(&self) -> &'static str {
        match self {
            LogicalField::Descripcion => "descripcion",
            LogicalField::Precio => "precio",
            LogicalField::Departamento => "departamento",
            LogicalField::Categoria => "categoria",
            LogicalField::Clave1 => "clave1",
            LogicalField::Clave2 => "clave2",
            LogicalField::Inventariable => "inventariable",
            LogicalField::CodigoSat => "codigo sat",
        }
    }
}

impl fmt::Display for LogicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ColumnError {
    #[error("missing required column for '{field}'")]
    MissingColumn { field: LogicalField },
    #[error("no price column found in the source file")]
    NoPriceColumn,
}

/// How a field picks its column once aliases are known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRule {
    /// First alias present wins; absence is a `MissingColumn` error.
    FirstAlias,
    /// Every header equal to an alias, or containing one of `contains`, is a
    /// candidate; the column with the most strictly-positive prices wins and
    /// ties keep the earlier candidate.
    MostPositivePrices { contains: &'static [&'static str] },
    /// First alias present, else the raw header `placeholder`, else the last
    /// column. Never fails.
    Optional { placeholder: &'static str },
}

#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub field: LogicalField,
    pub aliases: &'static [&'static str],
    pub rule: FieldRule,
}

impl FieldSpec {
    pub const fn new(
        field: LogicalField,
        aliases: &'static [&'static str],
        rule: FieldRule,
    ) -> Self {
        Self {
            field,
            aliases,
            rule,
        }
    }
}

/// Placeholder header a spreadsheet export gives the unnamed tax-code column.
pub const TAX_CODE_PLACEHOLDER: &str = "Unnamed: 15";

const DESCRIPCION: FieldSpec = FieldSpec::new(
    LogicalField::Descripcion,
    &["descripcion", "descripcion *"],
    FieldRule::FirstAlias,
);
const DEPARTAMENTO: FieldSpec = FieldSpec::new(
    LogicalField::Departamento,
    &["departamento"],
    FieldRule::FirstAlias,
);
const CATEGORIA: FieldSpec =
    FieldSpec::new(LogicalField::Categoria, &["categoria"], FieldRule::FirstAlias);
const CLAVE1: FieldSpec = FieldSpec::new(
    LogicalField::Clave1,
    &["clave1", "clave1 *"],
    FieldRule::FirstAlias,
);
const CLAVE2: FieldSpec = FieldSpec::new(LogicalField::Clave2, &["clave2"], FieldRule::FirstAlias);
const INVENTARIABLE: FieldSpec = FieldSpec::new(
    LogicalField::Inventariable,
    &["(s/n) inventariable", "inventariable"],
    FieldRule::FirstAlias,
);
const CODIGO_SAT: FieldSpec = FieldSpec::new(
    LogicalField::CodigoSat,
    &["codigo sat"],
    FieldRule::Optional {
        placeholder: TAX_CODE_PLACEHOLDER,
    },
);

/// Field table for current exports: price picked among `precio1` and every
/// "precio con impuestos" variant by data quality.
pub const INVENTORY_FIELDS: &[FieldSpec] = &[
    DESCRIPCION,
    DEPARTAMENTO,
    CATEGORIA,
    CLAVE1,
    CLAVE2,
    INVENTARIABLE,
    CODIGO_SAT,
    FieldSpec::new(
        LogicalField::Precio,
        &["precio1"],
        FieldRule::MostPositivePrices {
            contains: &["precio con impuestos"],
        },
    ),
];

/// Field table for older exports that always carry a clean `precio1`.
pub const LEGACY_INVENTORY_FIELDS: &[FieldSpec] = &[
    DESCRIPCION,
    FieldSpec::new(LogicalField::Precio, &["precio1"], FieldRule::FirstAlias),
    DEPARTAMENTO,
    CATEGORIA,
    CLAVE1,
    CLAVE2,
    INVENTARIABLE,
    CODIGO_SAT,
];

/// Column index per logical field after resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedColumns {
    pub descripcion: usize,
    pub precio: usize,
    pub departamento: usize,
    pub categoria: usize,
    pub clave1: usize,
    pub clave2: usize,
    pub inventariable: usize,
    /// `None` only when the table has no columns at all.
    pub codigo_sat: Option<usize>,
}

/// Resolve every field in `specs` against `table`, failing on the first
/// required field that has no matching column.
pub fn resolve(table: &SourceTable, specs: &[FieldSpec]) -> Result<ResolvedColumns, ColumnError> {
    let mut found: HashMap<LogicalField, usize> = HashMap::with_capacity(specs.len());
    for spec in specs {
        let col = match spec.rule {
            FieldRule::FirstAlias => Some(
                first_alias(table, spec.aliases)
                    .ok_or(ColumnError::MissingColumn { field: spec.field })?,
            ),
            FieldRule::MostPositivePrices { contains } => {
                let candidates = price_candidates(table, spec.aliases, contains);
                Some(select_most_positive(table, &candidates).ok_or(ColumnError::NoPriceColumn)?)
            }
            FieldRule::Optional { placeholder } => optional_column(table, spec, placeholder),
        };
        if let Some(col) = col {
            debug!(field = %spec.field, column = %table.headers()[col], "resolved column");
            found.insert(spec.field, col);
        }
    }

    let require = |field: LogicalField| {
        found
            .get(&field)
            .copied()
            .ok_or(ColumnError::MissingColumn { field })
    };
    Ok(ResolvedColumns {
        descripcion: require(LogicalField::Descripcion)?,
        precio: require(LogicalField::Precio)?,
        departamento: require(LogicalField::Departamento)?,
        categoria: require(LogicalField::Categoria)?,
        clave1: require(LogicalField::Clave1)?,
        clave2: require(LogicalField::Clave2)?,
        inventariable: require(LogicalField::Inventariable)?,
        codigo_sat: found.get(&LogicalField::CodigoSat).copied(),
    })
}

fn first_alias(table: &SourceTable, aliases: &[&str]) -> Option<usize> {
    aliases.iter().find_map(|alias| table.header_map().get(alias))
}

/// Candidate price columns in discovery order: exact aliases first, then
/// headers whose normalized form contains one of `contains`.
pub fn price_candidates(table: &SourceTable, aliases: &[&str], contains: &[&str]) -> Vec<usize> {
    let map = table.header_map();
    let mut out: Vec<usize> = aliases.iter().filter_map(|a| map.get(a)).collect();
    for (key, col) in map.iter() {
        if contains.iter().any(|needle| key.contains(needle)) && !out.contains(&col) {
            out.push(col);
        }
    }
    out
}

/// Pick the candidate with the most strictly-positive parsed prices; ties keep
/// the earliest candidate.
pub fn select_most_positive(table: &SourceTable, candidates: &[usize]) -> Option<usize> {
    let mut best: Option<(usize, usize)> = None;
    for &col in candidates {
        let positive = table.column(col).filter(|cell| parse_price(cell) > 0.0).count();
        debug!(column = %table.headers()[col], positive, "price candidate scored");
        match best {
            Some((_, best_count)) if positive <= best_count => {}
            _ => best = Some((col, positive)),
        }
    }
    best.map(|(col, _)| col)
}

fn optional_column(table: &SourceTable, spec: &FieldSpec, placeholder: &str) -> Option<usize> {
    if let Some(col) = first_alias(table, spec.aliases) {
        return Some(col);
    }
    let fallback = table
        .position(placeholder)
        .or_else(|| table.headers().len().checked_sub(1));
    if let Some(col) = fallback {
        warn!(
            field = %spec.field,
            column = %table.headers()[col],
            "no alias matched; using positional fallback column"
        );
    }
    fallback
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(headers: &[&str], rows: &[&[&str]]) -> SourceTable {
        SourceTable::from_parts(
            headers.iter().map(|h| h.to_string()).collect(),
            rows.iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
        )
    }

    const FULL: &[&str] = &[
        "Descripción *",
        "Departamento",
        "Categoría",
        "Clave1 *",
        "Clave2",
        "(S/N) Inventariable",
        "Precio1",
        "Código SAT",
    ];

    #[test]
    fn resolves_accented_and_marked_headers() {
        let t = table(FULL, &[&["Pan", "Pan", "Dulce", "A1", "750", "SI", "10", "5011"]]);
        let cols = resolve(&t, INVENTORY_FIELDS).unwrap();
        assert_eq!(cols.descripcion, 0);
        assert_eq!(cols.clave1, 3);
        assert_eq!(cols.inventariable, 5);
        assert_eq!(cols.precio, 6);
        assert_eq!(cols.codigo_sat, Some(7));
    }

    #[test]
    fn names_the_first_missing_field() {
        let headers: Vec<&str> = FULL.iter().copied().filter(|h| *h != "Clave2").collect();
        let t = table(&headers, &[]);
        assert_eq!(
            resolve(&t, INVENTORY_FIELDS),
            Err(ColumnError::MissingColumn {
                field: LogicalField::Clave2
            })
        );

        let headers: Vec<&str> = FULL.iter().copied().filter(|h| *h != "Categoría").collect();
        let t = table(&headers, &[]);
        let err = resolve(&t, INVENTORY_FIELDS).unwrap_err();
        assert_eq!(err.to_string(), "missing required column for 'categoria'");
    }

    #[test]
    fn missing_price_is_its_own_error() {
        let headers: Vec<&str> = FULL.iter().copied().filter(|h| *h != "Precio1").collect();
        let t = table(&headers, &[]);
        assert_eq!(resolve(&t, INVENTORY_FIELDS), Err(ColumnError::NoPriceColumn));
        assert_eq!(
            resolve(&t, LEGACY_INVENTORY_FIELDS),
            Err(ColumnError::MissingColumn {
                field: LogicalField::Precio
            })
        );
    }

    #[test]
    fn most_positive_price_column_wins_regardless_of_order() {
        // A: 3 positive values, B: 7 positive values, 10 rows each
        let mut rows: Vec<Vec<String>> = Vec::new();
        for i in 0..10 {
            let a = if i < 3 { "5.00" } else { "0" };
            let b = if i < 7 { "$1,200.00" } else { "" };
            rows.push(vec![a.to_string(), b.to_string()]);
        }
        let t = SourceTable::from_parts(
            vec!["Precio1".into(), "(S/N) Precio con impuestos".into()],
            rows,
        );
        let candidates = price_candidates(&t, &["precio1"], &["precio con impuestos"]);
        assert_eq!(candidates, vec![0, 1]);
        assert_eq!(select_most_positive(&t, &candidates), Some(1));
        assert_eq!(select_most_positive(&t, &[1, 0]), Some(1));
    }

    #[test]
    fn equal_counts_keep_first_declared() {
        let t = table(
            &["Precio con impuestos", "Precio1"],
            &[&["1", "2"], &["0", "0"]],
        );
        let candidates = price_candidates(&t, &["precio1"], &["precio con impuestos"]);
        assert_eq!(candidates, vec![1, 0]);
        assert_eq!(select_most_positive(&t, &candidates), Some(1));
    }

    #[test]
    fn tax_code_falls_back_to_placeholder_then_last_column() {
        let mut headers: Vec<String> = FULL[..7].iter().map(|h| h.to_string()).collect();
        headers.extend((7..15).map(|i| format!("Extra{i}")));
        headers.push(String::new()); // index 15, becomes "Unnamed: 15"
        headers.push("Notas".into());
        let t = SourceTable::from_parts(headers, vec![]);
        let cols = resolve(&t, INVENTORY_FIELDS).unwrap();
        assert_eq!(cols.codigo_sat, Some(15));

        let t = table(&FULL[..7], &[]);
        let cols = resolve(&t, INVENTORY_FIELDS).unwrap();
        assert_eq!(cols.codigo_sat, Some(6));
    }
}
