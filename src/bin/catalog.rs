use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;

use catalog_pipeline::catalog::PriceStrategy;
use catalog_pipeline::cli::PipelinePaths;
use catalog_pipeline::enrich::pause::PauseRange;
use catalog_pipeline::enrich::EnrichConfig;
use catalog_pipeline::sync::prune::DEFAULT_PRUNE_FROM;
use catalog_pipeline::sync::supabase::DEFAULT_BUCKET;
use catalog_pipeline::util::env;

#[derive(Parser, Debug)]
#[command(name = "catalog", version, about = "Inventory export to product catalog pipeline")]
struct Cli {
    /// Base directory holding source/ and output/ (env CATALOG_BASE_DIR)
    #[arg(long, global = true)]
    base_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum PriceStrategyArg {
    BestPopulated,
    FirstMatch,
}

impl From<PriceStrategyArg> for PriceStrategy {
    fn from(v: PriceStrategyArg) -> Self {
        match v {
            PriceStrategyArg::BestPopulated => PriceStrategy::BestPopulated,
            PriceStrategyArg::FirstMatch => PriceStrategy::FirstMatch,
        }
    }
}

#[derive(Subcommand, Debug)]
#[command(rename_all = "kebab-case")]
enum Commands {
    /// Convert the raw inventory export into the canonical catalog table
    Convert {
        /// Source export (default: source/inventory/Inventario_Productos.csv)
        #[arg(long)]
        source: Option<PathBuf>,
        /// Output table (default: output/current/productos_listos_para_importar.csv)
        #[arg(long)]
        output: Option<PathBuf>,
        /// How to pick the price column
        #[arg(long, value_enum, default_value_t = PriceStrategyArg::BestPopulated)]
        price_strategy: PriceStrategyArg,
    },
    /// Fetch product images and generate descriptions, with checkpoints
    Enrich {
        /// Canonical table (default: output of `convert`)
        #[arg(long)]
        input: Option<PathBuf>,
        /// Enriched table (default: output/current/inventario_actualizado.csv)
        #[arg(long)]
        output: Option<PathBuf>,
        #[arg(long)]
        image_map: Option<PathBuf>,
        #[arg(long)]
        images_dir: Option<PathBuf>,
        /// First row index to process (0-based)
        #[arg(long)]
        start: Option<usize>,
        /// Maximum rows to process (default: all)
        #[arg(long)]
        limit: Option<usize>,
        /// Start after the last checkpoint when --start is not given (env ENRICH_RESUME)
        #[arg(long, default_value_t = false)]
        resume: bool,
        /// Regenerate descriptions that were already enriched
        #[arg(long, default_value_t = false)]
        force: bool,
        /// Rows between table snapshots (env ENRICH_CHECKPOINT_EVERY, default 10)
        #[arg(long)]
        checkpoint_every: Option<usize>,
        #[arg(long, default_value_t = 1500)]
        pause_min_ms: u64,
        #[arg(long, default_value_t = 3000)]
        pause_max_ms: u64,
        /// Ollama model (env OLLAMA_MODEL, default llama3.2)
        #[arg(long)]
        model: Option<String>,
        /// Ollama base URL (env OLLAMA_URL, default http://localhost:11434)
        #[arg(long)]
        ollama_url: Option<String>,
    },
    /// Upload pending images to storage and patch products.image_url
    Upload {
        #[arg(long)]
        image_map: Option<PathBuf>,
        /// Storage bucket (env SUPABASE_BUCKET, default product-images)
        #[arg(long)]
        bucket: Option<String>,
        /// Perform uploads; without it nothing is changed
        #[arg(long, default_value_t = false)]
        live: bool,
        /// Entries between map snapshots (env UPLOAD_CHECKPOINT_EVERY, default 50)
        #[arg(long)]
        checkpoint_every: Option<usize>,
    },
    /// Delete downloaded images from a row onward so they get re-scraped
    Prune {
        #[arg(long)]
        catalog: Option<PathBuf>,
        #[arg(long)]
        images_dir: Option<PathBuf>,
        /// First row index whose image is removed
        #[arg(long = "from", default_value_t = DEFAULT_PRUNE_FROM)]
        from: usize,
        /// Actually delete; without it only counts
        #[arg(long, default_value_t = false)]
        delete: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    env::bootstrap_cli("catalog");
    catalog_pipeline::tracing::init_tracing("info")?;

    let cli = Cli::parse();
    let paths = PipelinePaths::resolve(cli.base_dir);
    info!(base_dir = %paths.base_dir().display(), "catalog: starting");

    match cli.command {
        Commands::Convert {
            source,
            output,
            price_strategy,
        } => {
            use catalog_pipeline::cli::convert::{run, ConvertCommandConfig};
            run(ConvertCommandConfig {
                source: source.unwrap_or_else(|| paths.source_export()),
                output: output.unwrap_or_else(|| paths.catalog()),
                strategy: price_strategy.into(),
            })?;
        }
        Commands::Enrich {
            input,
            output,
            image_map,
            images_dir,
            start,
            limit,
            resume,
            force,
            checkpoint_every,
            pause_min_ms,
            pause_max_ms,
            model,
            ollama_url,
        } => {
            use catalog_pipeline::cli::enrich::{run, EnrichCommandConfig};
            let defaults = EnrichConfig::default();
            let enrich = EnrichConfig {
                limit,
                force,
                checkpoint_interval: checkpoint_every
                    .unwrap_or_else(|| env::env_parse("ENRICH_CHECKPOINT_EVERY", 10)),
                pause: PauseRange::new(
                    Duration::from_millis(pause_min_ms),
                    Duration::from_millis(pause_max_ms),
                ),
                images_dir: images_dir.unwrap_or_else(|| paths.images_dir()),
                model: model
                    .or_else(|| env::env_opt("OLLAMA_MODEL"))
                    .unwrap_or(defaults.model.clone()),
                ollama_url: ollama_url
                    .or_else(|| env::env_opt("OLLAMA_URL"))
                    .unwrap_or(defaults.ollama_url.clone()),
                ..defaults
            };
            run(EnrichCommandConfig {
                input: input.unwrap_or_else(|| paths.catalog()),
                output: output.unwrap_or_else(|| paths.enriched()),
                image_map: image_map.unwrap_or_else(|| paths.image_map()),
                start,
                resume: resume || env::env_flag("ENRICH_RESUME", false),
                enrich,
            })
            .await?;
        }
        Commands::Upload {
            image_map,
            bucket,
            live,
            checkpoint_every,
        } => {
            use catalog_pipeline::cli::upload::{run, UploadCommandConfig};
            run(UploadCommandConfig {
                image_map: image_map.unwrap_or_else(|| paths.image_map()),
                bucket: bucket
                    .or_else(|| env::env_opt("SUPABASE_BUCKET"))
                    .unwrap_or_else(|| DEFAULT_BUCKET.to_string()),
                live,
                checkpoint_interval: checkpoint_every
                    .unwrap_or_else(|| env::env_parse("UPLOAD_CHECKPOINT_EVERY", 50)),
            })
            .await?;
        }
        Commands::Prune {
            catalog,
            images_dir,
            from,
            delete,
        } => {
            use catalog_pipeline::cli::prune::{run, PruneCommandConfig};
            run(PruneCommandConfig {
                catalog: catalog.unwrap_or_else(|| paths.catalog()),
                images_dir: images_dir.unwrap_or_else(|| paths.images_dir()),
                from,
                delete,
            })?;
        }
    }
    Ok(())
}
