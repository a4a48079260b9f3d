use std::path::{Path, PathBuf};

use {
    secrecy::Secret,
    tracing::{debug, info, warn},
};

use crate::{
    env_subst::substitute_env,
    error::{Context, Error, Result},
    schema::{BackendKind, PicsearchConfig},
};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &[
    "picsearch.toml",
    "picsearch.yaml",
    "picsearch.yml",
    "picsearch.json",
];

/// Env var holding the SauceNAO API key.
pub const API_KEY_ENV: &str = "SAUCENAO_API_KEY";

/// Env var selecting the backend (`api` or `html`).
pub const BACKEND_ENV: &str = "PICSEARCH_BACKEND";

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> Result<PicsearchConfig> {
    let raw = std::fs::read_to_string(path).map_err(|e| Error::read(path, e))?;
    let raw = substitute_env(&raw);
    parse_config(&raw, path)
}

/// Discover and load config from standard locations, then apply env
/// overrides.
///
/// Search order:
/// 1. `./picsearch.{toml,yaml,yml,json}` (project-local)
/// 2. `~/.config/picsearch/picsearch.{toml,yaml,yml,json}` (user-global)
///
/// Falls back to `PicsearchConfig::default()` when no file is found or the
/// file fails to parse. Never fails.
pub fn discover_and_load() -> PicsearchConfig {
    let mut config = match find_config_file() {
        Some(path) => {
            debug!(path = %path.display(), "loading config");
            load_config(&path).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
                PicsearchConfig::default()
            })
        },
        None => {
            debug!("no config file found, using defaults");
            PicsearchConfig::default()
        },
    };
    apply_env_overrides(&mut config);
    config
}

/// Apply `SAUCENAO_API_KEY` and `PICSEARCH_BACKEND` from the process
/// environment.
pub fn apply_env_overrides(config: &mut PicsearchConfig) {
    apply_env_overrides_with(config, |name| std::env::var(name).ok());
}

fn apply_env_overrides_with(
    config: &mut PicsearchConfig,
    lookup: impl Fn(&str) -> Option<String>,
) {
    if let Some(key) = lookup(API_KEY_ENV).filter(|k| !k.trim().is_empty()) {
        info!("SauceNAO API key loaded from environment variable");
        config.saucenao.api_key = Some(Secret::new(key));
    }

    if let Some(raw) = lookup(BACKEND_ENV) {
        match raw.parse::<BackendKind>() {
            Ok(kind) => config.search.backend = kind,
            Err(e) => warn!(error = %e, "ignoring {BACKEND_ENV}"),
        }
    }
}

/// Find the first config file in standard locations.
fn find_config_file() -> Option<PathBuf> {
    for name in CONFIG_FILENAMES {
        let p = PathBuf::from(name);
        if p.exists() {
            return Some(p);
        }
    }

    let dir = config_dir().ok()?;
    CONFIG_FILENAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|p| p.exists())
}

/// Returns the user-global config directory (`~/.config/picsearch/`).
pub fn config_dir() -> Result<PathBuf> {
    directories::ProjectDirs::from("", "", "picsearch")
        .map(|d| d.config_dir().to_path_buf())
        .context("could not resolve a home directory for the user config")
}

fn parse_config(raw: &str, path: &Path) -> Result<PicsearchConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => Ok(toml::from_str(raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        _ => Err(Error::UnsupportedFormat { ext: ext.into() }),
    }
}
