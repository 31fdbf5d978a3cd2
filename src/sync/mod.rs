pub mod prune;
pub mod reconcile;
pub mod supabase;

pub use prune::{prune_images, PruneSummary};
pub use reconcile::{reconcile_uploads, ReconcileConfig, ReconcileSummary};
pub use supabase::{ImageSync, SupabaseClient, SupabaseCredentials};
