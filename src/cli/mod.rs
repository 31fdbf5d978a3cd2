pub mod convert;
pub mod enrich;
pub mod prune;
pub mod upload;

use std::path::{Path, PathBuf};

use crate::util::env as env_util;

/// Default file locations of every stage, relative to one base directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelinePaths {
    base_dir: PathBuf,
}

impl PipelinePaths {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Flag value, else `CATALOG_BASE_DIR`, else the working directory.
    pub fn resolve(base_dir: Option<PathBuf>) -> Self {
        let base = base_dir
            .or_else(|| env_util::env_opt("CATALOG_BASE_DIR").map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from("."));
        Self::new(base)
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn current(&self) -> PathBuf {
        self.base_dir.join("output").join("current")
    }

    pub fn source_export(&self) -> PathBuf {
        self.base_dir
            .join("source")
            .join("inventory")
            .join("Inventario_Productos.csv")
    }

    pub fn catalog(&self) -> PathBuf {
        self.current().join("productos_listos_para_importar.csv")
    }

    pub fn enriched(&self) -> PathBuf {
        self.current().join("inventario_actualizado.csv")
    }

    pub fn image_map(&self) -> PathBuf {
        self.current().join("imagenes_map.csv")
    }

    pub fn images_dir(&self) -> PathBuf {
        self.current().join("product_images")
    }
}
