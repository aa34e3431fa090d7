use thiserror::Error;

/// Failures that end the run.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Core(#[from] tracerouter_core::Error),
    #[error("unable to resolve project: {0}")]
    Project(String),
    #[error("unable to write report: {0}")]
    Io(#[from] std::io::Error),
}
