use std::path::{Path, PathBuf};

use {secrecy::Secret, tracing::debug};

use crate::{
    env_subst::substitute_env,
    error::{Context, Error, Result},
    schema::ProjectPConfig,
};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &[
    "projectp.toml",
    "projectp.yaml",
    "projectp.yml",
    "projectp.json",
];

/// Token variables, first match wins. `TGTOKEN` is what existing deployments set.
const TOKEN_VARS: &[&str] = &["TGTOKEN", "PROJECTP_TELEGRAM_TOKEN"];

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> Result<ProjectPConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    parse_config(&substitute_env(&raw), path)
}

/// Discover and load config from standard locations.
///
/// Search order:
/// 1. `./projectp.{toml,yaml,yml,json}` (project-local)
/// 2. `~/.config/projectp/projectp.{toml,yaml,yml,json}` (user-global)
///
/// Returns `ProjectPConfig::default()` if no config file is found. A file that
/// exists but does not parse is an error.
pub fn discover_and_load() -> Result<ProjectPConfig> {
    match find_config_file() {
        Some(path) => {
            debug!(path = %path.display(), "loading config");
            load_config(&path)
        },
        None => {
            debug!("no config file found, using defaults");
            Ok(ProjectPConfig::default())
        },
    }
}

/// Find the first config file in standard locations.
pub fn find_config_file() -> Option<PathBuf> {
    CONFIG_FILENAMES
        .iter()
        .map(PathBuf::from)
        .find(|p| p.exists())
        .or_else(|| {
            let dir = config_dir()?;
            CONFIG_FILENAMES
                .iter()
                .map(|name| dir.join(name))
                .find(|p| p.exists())
        })
}

/// Returns the user-global config directory (`~/.config/projectp/`).
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "projectp").map(|d| d.config_dir().to_path_buf())
}

/// Overlay process environment variables on top of the file config.
pub fn apply_env_overrides(config: ProjectPConfig) -> ProjectPConfig {
    apply_env_overrides_with(config, |name| std::env::var(name).ok())
}

pub(crate) fn apply_env_overrides_with(
    mut config: ProjectPConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> ProjectPConfig {
    let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

    if let Some(token) = TOKEN_VARS.iter().copied().find_map(&non_empty) {
        config.telegram.token = Secret::new(token);
    }
    if let Some(dir) = non_empty("PROJECTP_INPUT_DIR") {
        config.staging.input_dir = PathBuf::from(dir);
    }
    if let Some(dir) = non_empty("PROJECTP_OUTPUT_DIR") {
        config.staging.output_dir = PathBuf::from(dir);
    }
    if let Some(binary) = non_empty("PROJECTP_DETECTOR_BINARY") {
        config.detector.binary_path = Some(binary);
    }
    if let Some(model) = non_empty("PROJECTP_MODEL_PATH") {
        config.detector.model_path = Some(model);
    }
    config
}

fn parse_config(raw: &str, path: &Path) -> Result<ProjectPConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => Ok(toml::from_str(raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        _ => Err(Error::UnsupportedFormat {
            ext: ext.to_string(),
        }),
    }
}
