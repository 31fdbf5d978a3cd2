use std::fmt::Write as _;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use catalog_pipeline::catalog::{convert_inventory, read_catalog, CatalogRow, PriceStrategy};
use catalog_pipeline::cli::enrich::{run_with, EnrichCommandConfig};
use catalog_pipeline::cli::PipelinePaths;
use catalog_pipeline::enrich::checkpoint::{load_record, record_path_for};
use catalog_pipeline::enrich::image_map::load_image_map;
use catalog_pipeline::enrich::pause::PauseRange;
use catalog_pipeline::enrich::{
    DescribeError, EnrichConfig, ImageHit, ProductEnricher, ScrapeFailure,
};

#[derive(Default)]
struct CountingEnricher {
    fetches: AtomicUsize,
    describes: AtomicUsize,
}

#[async_trait]
impl ProductEnricher for CountingEnricher {
    async fn fetch_image(
        &self,
        product: &CatalogRow,
        dest: &Path,
    ) -> Result<ImageHit, ScrapeFailure> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if product.sku.ends_with('7') {
            return Err(ScrapeFailure::Timeout);
        }
        std::fs::create_dir_all(dest.parent().unwrap()).unwrap();
        std::fs::write(dest, [0xFF, 0xD8, 0xFF]).unwrap();
        Ok(ImageHit {
            source: "Bing".into(),
        })
    }

    async fn describe(&self, product: &CatalogRow) -> Result<String, DescribeError> {
        self.describes.fetch_add(1, Ordering::SeqCst);
        Ok(format!("{} ideal para tus pasteles", product.name))
    }
}

fn write_export(path: &Path, rows: usize) {
    let mut csv = String::from(
        "Descripción *,Departamento,Categoría,Clave1 *,Clave2,(S/N) Inventariable,Precio1,Código SAT\n",
    );
    for i in 0..rows {
        writeln!(
            csv,
            "Producto {i},Repostería,Moldes,P{i:03},750{i:03},{},\"${}.50\",50181900",
            if i % 2 == 0 { "SI" } else { "NO" },
            100 + i
        )
        .unwrap();
    }
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, csv).unwrap();
}

fn enrich_cfg(paths: &PipelinePaths) -> EnrichCommandConfig {
    EnrichCommandConfig {
        input: paths.catalog(),
        output: paths.enriched(),
        image_map: paths.image_map(),
        start: None,
        resume: false,
        enrich: EnrichConfig {
            pause: PauseRange::none(),
            images_dir: paths.images_dir(),
            ..Default::default()
        },
    }
}

#[tokio::test]
async fn twenty_five_rows_checkpoint_three_times_and_resume_cleanly() {
    let dir = tempfile::tempdir().unwrap();
    let paths = PipelinePaths::new(dir.path());
    write_export(&paths.source_export(), 25);

    let converted =
        convert_inventory(&paths.source_export(), &paths.catalog(), PriceStrategy::default())
            .unwrap();
    assert_eq!(converted.rows, 25);
    assert_eq!(converted.positive_prices, 25);
    assert_eq!(converted.price_column, "Precio1");

    let first = CountingEnricher::default();
    let summary = run_with(enrich_cfg(&paths), &first).await.unwrap();
    assert_eq!(summary.processed, 25);
    assert_eq!(summary.snapshots, 3);
    assert_eq!(summary.images_missing, 2);
    assert_eq!(first.describes.load(Ordering::SeqCst), 25);
    assert_eq!(load_image_map(&paths.image_map()).unwrap().len(), 25);

    let record = load_record(&record_path_for(&paths.enriched())).unwrap();
    assert_eq!((record.next_index, record.total_rows), (25, 25));

    let enriched = read_catalog(&paths.enriched()).unwrap();
    assert_eq!(enriched.len(), 25);
    assert_eq!(enriched[3].description, "Producto 3 ideal para tus pasteles");
    assert_eq!(enriched[3].price, 103.5);
    assert!(enriched[0].available && !enriched[1].available);

    // second pass over the same canonical table: descriptions come back from
    // the enriched output, images from disk
    let second = CountingEnricher::default();
    let again = run_with(enrich_cfg(&paths), &second).await.unwrap();
    assert_eq!(second.describes.load(Ordering::SeqCst), 0);
    // only the two SKUs that never got an image are retried
    assert_eq!(second.fetches.load(Ordering::SeqCst), 2);
    assert_eq!(again.images_reused, 23);
    assert_eq!(load_image_map(&paths.image_map()).unwrap().len(), 50);
}

#[tokio::test]
async fn resume_flag_skips_rows_already_checkpointed() {
    let dir = tempfile::tempdir().unwrap();
    let paths = PipelinePaths::new(dir.path());
    write_export(&paths.source_export(), 12);
    convert_inventory(&paths.source_export(), &paths.catalog(), PriceStrategy::FirstMatch)
        .unwrap();

    let mut cfg = enrich_cfg(&paths);
    cfg.enrich.limit = Some(10);
    run_with(cfg, &CountingEnricher::default()).await.unwrap();

    let mut cfg = enrich_cfg(&paths);
    cfg.resume = true;
    let enricher = CountingEnricher::default();
    let summary = run_with(cfg, &enricher).await.unwrap();
    assert_eq!((summary.start, summary.end), (10, 12));
    assert_eq!(enricher.describes.load(Ordering::SeqCst), 2);
}
