//! Configuration loading and env substitution.
//!
//! Config files: `picsearch.toml`, `picsearch.yaml`, or `picsearch.json`
//! Searched in `./` then `~/.config/picsearch/`.
//!
//! Supports `${ENV_VAR}` substitution in all string values, plus the
//! `SAUCENAO_API_KEY` and `PICSEARCH_BACKEND` overrides.

pub mod env_subst;
pub mod error;
pub mod loader;
pub mod schema;

pub use {
    error::{Error, Result},
    loader::{apply_env_overrides, config_dir, discover_and_load, load_config},
    schema::{BackendKind, PicsearchConfig, SauceNaoConfig, SearchConfig},
};
