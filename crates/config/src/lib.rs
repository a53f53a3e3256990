//! Configuration loading, env substitution, environment overrides and validation.
//!
//! Config files: `projectp.toml`, `projectp.yaml`, `projectp.yml` or `projectp.json`,
//! searched in `./` then `~/.config/projectp/`.
//!
//! Supports `${ENV_VAR}` substitution in all string values.

pub mod env_subst;
pub mod error;
pub mod loader;
pub mod schema;
pub mod validate;

pub use {
    error::{Error, Result},
    loader::{
        apply_env_overrides, config_dir, discover_and_load, find_config_file, load_config,
    },
    schema::{DetectorConfig, ProjectPConfig, StagingConfig, TelegramConfig},
    validate::validate,
};
