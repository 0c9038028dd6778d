//! Bootstrap helpers for leancanvas.
//!
//! Environment files are loaded before configuration is resolved so that
//! `DIFY_API_KEY` and friends can live outside the shell profile.
//!
//! File: `~/.leancanvas/.env` (standard dotenvy format)

use std::path::{Path, PathBuf};

/// Base directory for leancanvas files: `~/.leancanvas`.
pub fn leancanvas_base_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".leancanvas")
}

/// Path to the leancanvas-specific `.env` file: `~/.leancanvas/.env`.
pub fn leancanvas_env_path() -> PathBuf {
    leancanvas_base_dir().join(".env")
}

/// Load `./.env`, then `~/.leancanvas/.env`.
///
/// dotenvy never overwrites existing env vars, so the effective priority is:
///
///   explicit env vars > `./.env` > `~/.leancanvas/.env`
pub fn load_env() {
    let _ = dotenvy::dotenv();
    load_env_file(&leancanvas_env_path());
}

/// Load one env file if it exists. Returns whether it was read.
pub fn load_env_file(path: &Path) -> bool {
    if !path.exists() {
        return false;
    }
    match dotenvy::from_path(path) {
        Ok(()) => true,
        Err(e) => {
            eprintln!("Warning: failed to load {}: {}", path.display(), e);
            false
        }
    }
}
