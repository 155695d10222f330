//! Error types for gantry-dest

use gantry_core::package::FileFormat;
use gantry_core::CoreError;
use thiserror::Error;

/// Destination operation errors
#[derive(Error, Debug)]
pub enum DestError {
    /// Connection error (D001)
    #[error("[D001] Destination connection failed: {0}")]
    Connection(String),

    /// Query execution error (D002)
    #[error("[D002] SQL execution failed: {0}")]
    Execution(String),

    /// Schema verification failure (D003)
    #[error("[D003] Schema verification failed for table '{table}': {reason}")]
    SchemaMismatch { table: String, reason: String },

    /// Unsupported job file format (D004)
    #[error("[D004] File format '{format}' is not supported by {destination}")]
    UnsupportedFileFormat {
        format: FileFormat,
        destination: String,
    },

    /// Not implemented (D005)
    #[error("[D005] Feature not implemented for {backend}: {feature}")]
    NotImplemented { backend: String, feature: String },

    /// Mutex poisoned (D006)
    #[error("[D006] Destination mutex poisoned: {0}")]
    MutexPoisoned(String),

    /// Job file path is not valid UTF-8 (D007)
    #[error("[D007] Invalid job file path: {0}")]
    InvalidPath(String),

    /// Core schema/package error (D008)
    #[error("[D008] {0}")]
    Core(#[from] CoreError),
}

/// Result type alias for DestError
pub type DestResult<T> = Result<T, DestError>;

impl From<duckdb::Error> for DestError {
    fn from(err: duckdb::Error) -> Self {
        // duckdb::Error does not expose structured variants, so the message
        // is all we can carry.
        DestError::Execution(err.to_string())
    }
}
