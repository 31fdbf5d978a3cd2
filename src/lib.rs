//! Vendor inventory export → product catalog pipeline.
//!
//! Stages, each reading the previous stage's output from disk:
//! `convert` (raw export → canonical table), `enrich` (images and
//! descriptions, checkpointed), `upload` (storage + products table) and
//! `prune` (drop downloaded images so they get re-scraped).
pub mod catalog;
pub mod cli;
pub mod enrich;
pub mod env_boot;
pub mod normalization;
pub mod sync;
pub mod tracing;

pub mod util {
    pub mod env;
}
