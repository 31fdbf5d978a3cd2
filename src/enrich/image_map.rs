use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use csv::{QuoteStyle, WriterBuilder};
use serde::{Deserialize, Serialize};

/// SKU → local image → public URL mapping, one row per processed product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageMapEntry {
    pub sku: String,
    #[serde(rename = "nombre", default)]
    pub name: String,
    /// Empty when no image was found.
    #[serde(rename = "imagen_local", default)]
    pub local_path: String,
    /// Empty until uploaded.
    #[serde(rename = "supabase_url", default)]
    pub remote_url: String,
}

impl ImageMapEntry {
    pub fn new(sku: impl Into<String>, name: impl Into<String>, local_path: Option<&Path>) -> Self {
        Self {
            sku: sku.into(),
            name: name.into(),
            local_path: local_path
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
            remote_url: String::new(),
        }
    }

    /// Has a local image but no remote URL yet.
    pub fn is_pending(&self) -> bool {
        !self.local_path.trim().is_empty() && self.remote_url.trim().is_empty()
    }
}

/// Append-only writer used while images are being collected.
///
/// Every append opens, writes and closes the file so a crash never leaves
/// buffered rows behind.
#[derive(Debug, Clone)]
pub struct ImageMapWriter {
    path: PathBuf,
    appended: usize,
}

impl ImageMapWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            appended: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rows appended by this writer.
    pub fn appended(&self) -> usize {
        self.appended
    }

    pub fn append(&mut self, entry: &ImageMapEntry) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let needs_header = fs::metadata(&self.path).map(|m| m.len() == 0).unwrap_or(true);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("failed to open image map {}", self.path.display()))?;
        let mut wtr = quoted_writer(file, needs_header);
        wtr.serialize(entry)?;
        wtr.flush()?;
        self.appended += 1;
        Ok(())
    }
}

fn quoted_writer(file: File, header: bool) -> csv::Writer<File> {
    WriterBuilder::new()
        .quote_style(QuoteStyle::Always)
        .has_headers(header)
        .from_writer(file)
}

/// Load the whole map. Malformed lines are skipped with a warning so one bad
/// append does not block the upload stage.
pub fn load_image_map(path: &Path) -> Result<Vec<ImageMapEntry>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("failed to open image map {}", path.display()))?;
    let mut out = Vec::new();
    for (idx, rec) in rdr.deserialize::<ImageMapEntry>().enumerate() {
        match rec {
            Ok(entry) => out.push(entry),
            Err(e) => tracing::warn!(line = idx + 2, error = %e, "skipping malformed image map row"),
        }
    }
    Ok(out)
}

/// Rewrite the whole map in place.
pub fn save_image_map(path: &Path, entries: &[ImageMapEntry]) -> Result<()> {
    let tmp = path.with_extension("csv.tmp");
    {
        let file =
            File::create(&tmp).with_context(|| format!("failed to create {}", tmp.display()))?;
        let mut wtr = quoted_writer(file, true);
        if entries.is_empty() {
            wtr.write_record(["sku", "nombre", "imagen_local", "supabase_url"])?;
        }
        for e in entries {
            wtr.serialize(e)?;
        }
        wtr.flush()?;
    }
    fs::rename(&tmp, path).with_context(|| format!("failed to replace {}", path.display()))?;
    Ok(())
}
