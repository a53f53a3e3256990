//! Startup validation of the effective configuration.

use crate::{
    error::{Error, Result},
    schema::ProjectPConfig,
};

/// Validate a fully resolved config (file + env overrides + CLI overrides).
///
/// `require_token` is false for commands that never talk to Telegram, such as
/// a local `detect` run.
pub fn validate(config: &ProjectPConfig, require_token: bool) -> Result<()> {
    if require_token && !config.telegram.has_token() {
        return Err(Error::MissingToken);
    }

    let suffix = &config.staging.target_suffix;
    if suffix.is_empty() {
        return Err(Error::invalid("staging.target_suffix", "must not be empty"));
    }
    if !suffix
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(Error::invalid(
            "staging.target_suffix",
            format!("{suffix:?} may only contain letters, digits, '_' and '-'"),
        ));
    }

    if config.staging.input_dir.as_os_str().is_empty() {
        return Err(Error::invalid("staging.input_dir", "must not be empty"));
    }
    if config.staging.output_dir.as_os_str().is_empty() {
        return Err(Error::invalid("staging.output_dir", "must not be empty"));
    }

    let p = config.detector.percentile;
    if !(0.0..=100.0).contains(&p) {
        return Err(Error::invalid(
            "detector.percentile",
            format!("{p} is outside 0..=100"),
        ));
    }
    if config.detector.timeout_secs == 0 {
        return Err(Error::invalid("detector.timeout_secs", "must be positive"));
    }
    if config.telegram.max_attachment_mib == 0 {
        return Err(Error::invalid(
            "telegram.max_attachment_mib",
            "must be positive",
        ));
    }

    Ok(())
}
