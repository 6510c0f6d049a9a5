use std::env;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::de::DeserializeOwned;
use tracing::debug;

/// Reads TOML configuration for the client and the runner.
///
/// Candidates, first existing file wins:
/// 1) `RUSTY_BOT_CONFIG_DIR/<relative_path>`
/// 2) `./<relative_path>`
/// 3) `<repo_root>/config/<relative_path>`
pub struct ConfigLoader;

impl ConfigLoader {
    pub fn parse_from_file<T: DeserializeOwned>(relative_path: &str) -> anyhow::Result<T> {
        let path = Self::resolve_path(relative_path)?;
        debug!(path = %path.display(), "config.load");
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read config at {}", path.display()))?;
        Self::parse_from_string(text)
            .with_context(|| format!("invalid config at {}", path.display()))
    }

    pub fn parse_from_string<T: DeserializeOwned>(text: String) -> anyhow::Result<T> {
        toml::from_str(&text).context("failed to parse TOML")
    }

    fn candidates(relative_path: &Path) -> Vec<PathBuf> {
        let mut candidates = Vec::with_capacity(3);
        if let Some(root) = env::var_os("RUSTY_BOT_CONFIG_DIR") {
            candidates.push(PathBuf::from(root).join(relative_path));
        }
        if let Ok(cwd) = env::current_dir() {
            candidates.push(cwd.join(relative_path));
        }
        // This crate lives at <repo_root>/crates/client.
        if let Some(repo_root) = Path::new(env!("CARGO_MANIFEST_DIR")).ancestors().nth(2) {
            candidates.push(repo_root.join("config").join(relative_path));
        }
        candidates
    }

    fn resolve_path(relative_path: &str) -> anyhow::Result<PathBuf> {
        let rel = Path::new(relative_path);
        Self::candidates(rel)
            .into_iter()
            .find(|candidate| candidate.is_file())
            .ok_or_else(|| anyhow::anyhow!("config file not found for {:?}", rel))
    }
}
