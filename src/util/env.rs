//! Environment helpers: centralized dotenv loading and ergonomic getters.
//! Call `init_env()` once early in each binary (or rely on lazy Once).
use std::str::FromStr;
use std::sync::Once;
use tracing::{debug, info};

static INIT: Once = Once::new();

/// Load .env / .env.local exactly once.
/// Safe to call many times.
pub fn init_env() {
    INIT.call_once(|| {
        crate::env_boot::ensure_dotenv();
    });
}

/// Common bootstrap for CLI binaries:
///   * initialize dotenv/env once
///   * log which optional integrations are configured
pub fn bootstrap_cli(bin_name: &str) {
    init_env();

    let has_storage = env_first(&["SUPABASE_URL", "NEXT_PUBLIC_SUPABASE_URL"]).is_some();
    info!(
        target = "bootstrap",
        bin = bin_name,
        storage_configured = has_storage,
        "environment loaded"
    );
    if let Some(dir) = env_opt("CATALOG_BASE_DIR") {
        debug!(target = "bootstrap", base_dir = %dir, "base dir from env");
    }
}

/// Get optional env var (None if unset or empty).
pub fn env_opt(key: &str) -> Option<String> {
    init_env();
    match std::env::var(key) {
        Ok(v) if !v.trim().is_empty() => Some(v),
        _ => None,
    }
}

/// First non-empty value among `keys`, in order.
pub fn env_first(keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| env_opt(k))
}

/// Get parsed value with default fallback.
pub fn env_parse<T>(key: &str, default: T) -> T
where
    T: FromStr + Clone,
{
    init_env();
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse::<T>().unwrap_or(default),
        Err(_) => default,
    }
}

/// Boolean flag; accepts 1/true/on/yes (case-insensitive) as true.
pub fn env_flag(key: &str, default: bool) -> bool {
    init_env();
    match std::env::var(key) {
        Ok(raw) => parse_flag(&raw),
        Err(_) => default,
    }
}

fn parse_flag(raw: &str) -> bool {
    let v = raw.trim().to_ascii_lowercase();
    matches!(v.as_str(), "1" | "true" | "on" | "yes")
}
