use std::{error::Error as StdError, time::Duration};

/// Detector failures. Each one aborts only the request that triggered it.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("detector binary `{name}` not found (configure detector.binary_path or add it to PATH)")]
    BinaryNotFound { name: String },

    #[error("detector exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },

    #[error("detector timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("detector output lacks the `total` timing")]
    MissingTotal,

    #[error("invalid detector output: {0}")]
    InvalidOutput(#[from] serde_json::Error),

    #[error("admission gate closed")]
    GateClosed,

    #[error("{context}: {source}")]
    External {
        context: String,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
}

impl Error {
    #[must_use]
    pub fn external<E>(context: impl Into<String>, source: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::External {
            context: context.into(),
            source: Box::new(source),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
