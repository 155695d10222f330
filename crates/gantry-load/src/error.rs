use gantry_core::error::CoreError;
use gantry_dest::DestError;
use thiserror::Error;

/// Errors raised while driving load packages into a destination
#[derive(Error, Debug)]
pub enum LoadError {
    /// Package finished with failed jobs and the loader is configured to raise
    #[error("[L001] Load package {load_id} finished with {failed} failed jobs; first failure: {message}")]
    JobsFailed {
        load_id: String,
        failed: usize,
        message: String,
    },

    /// A spawned load job task panicked instead of returning a result
    #[error("[L002] Load job task panicked: {message}")]
    JobPanicked { message: String },

    /// Loader configuration that cannot schedule any work
    #[error("[L003] Invalid loader configuration: {message}")]
    InvalidConfig { message: String },

    /// Package storage or schema error
    #[error("{0}")]
    Core(#[from] CoreError),

    /// Destination client error
    #[error("{0}")]
    Dest(#[from] DestError),
}

/// Result type alias for load operations
pub type LoadResult<T> = Result<T, LoadError>;
