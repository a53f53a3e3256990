use std::path::Path;

use tracing::debug;

use crate::{Error, Result, StagingLayout};

/// Create the input staging and output directories if they are missing.
pub async fn prepare_directories(layout: &StagingLayout) -> Result<()> {
    for dir in [layout.input_dir(), layout.output_dir()] {
        ensure_dir(dir).await?;
    }
    Ok(())
}

async fn ensure_dir(dir: &Path) -> Result<()> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| Error::directory(dir, e))?;
    debug!(path = %dir.display(), "staging directory ready");
    Ok(())
}
