use std::path::Path;

/// Load `.env.local` then `.env` from the working directory. dotenv never
/// overrides a variable that is already set, so process env beats
/// `.env.local`, which beats `.env`. If neither file exists in the working
/// directory, try the project root.
pub fn ensure_dotenv() {
    if load_from(Path::new(".")) {
        return;
    }
    // Fallback to Cargo project root
    load_from(Path::new(env!("CARGO_MANIFEST_DIR")));
}

fn load_from(dir: &Path) -> bool {
    let found_local = dotenv::from_path(dir.join(".env.local")).is_ok();
    let found_env = dotenv::from_path(dir.join(".env")).is_ok();
    found_local || found_env
}
