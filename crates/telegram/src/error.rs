use std::path::PathBuf;

use thiserror::Error;

/// Moving bytes between Telegram and the staging area failed.
#[derive(Debug, Error)]
pub enum TransferError {
    #[error(transparent)]
    Telegram(#[from] teloxide::RequestError),

    #[error(transparent)]
    Download(#[from] teloxide::DownloadError),

    #[error("attachment of {size} bytes exceeds the {limit} byte limit")]
    TooLarge { size: u64, limit: u64 },

    #[error("{}: {source}", path.display())]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl TransferError {
    #[must_use]
    pub fn file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::File {
            path: path.into(),
            source,
        }
    }
}

/// Failure of one media request. Never changes session state.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Transfer(#[from] TransferError),

    #[error(transparent)]
    Detect(#[from] projectp_detect::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
