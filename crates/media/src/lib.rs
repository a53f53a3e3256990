//! Media staging: deterministic file addressing, staging directories, the
//! detection-count statistic and the summary shown to users.

pub mod addressing;
pub mod error;
pub mod stats;
pub mod store;
pub mod summary;

pub use {
    addressing::{StagedFile, StagingLayout},
    error::{Error, Result},
    stats::percentile,
    store::prepare_directories,
    summary::ResponseSummary,
};
