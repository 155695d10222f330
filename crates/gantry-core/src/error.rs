//! Error types for gantry-core

use thiserror::Error;

/// Core error type for Gantry
#[derive(Error, Debug)]
pub enum CoreError {
    /// G001: Malformed job file name
    #[error("[G001] Invalid job file name '{name}': {reason}")]
    InvalidJobFileName { name: String, reason: String },

    /// G002: Unrecognized job file extension
    #[error("[G002] Unknown file format '{extension}' (expected csv or jsonl)")]
    UnknownFileFormat { extension: String },

    /// G003: Table not present in schema
    #[error("[G003] Table not found in schema: {name}")]
    TableNotFound { name: String },

    /// G004: Nested table references a parent the schema does not define
    #[error("[G004] Table '{table}' references unknown parent '{parent}'")]
    UnknownParent { table: String, parent: String },

    /// G005: Parent references form a cycle
    #[error("[G005] Circular table nesting detected: {cycle}")]
    CircularNesting { cycle: String },

    /// G006: Duplicate table name
    #[error("[G006] Duplicate table name: {name}")]
    DuplicateTable { name: String },

    /// G007: Duplicate resource within one source
    #[error("[G007] Duplicate resource '{resource}' in source '{source_name}'")]
    DuplicateResource {
        resource: String,
        source_name: String,
    },

    /// G008: Load package directory not found
    #[error("[G008] Load package not found: {load_id}")]
    PackageNotFound { load_id: String },

    /// G009: Job file not found in the expected package folder
    #[error("[G009] Job file '{file_name}' not found in {folder} of package {load_id}")]
    JobNotFound {
        load_id: String,
        folder: String,
        file_name: String,
    },

    /// G010: IO error
    #[error("[G010] IO error: {0}")]
    Io(#[from] std::io::Error),

    /// G011: IO error with file path context
    #[error("[G011] Failed to access '{path}': {source}")]
    IoWithPath {
        path: String,
        source: std::io::Error,
    },

    /// G012: JSON serialization/deserialization error
    #[error("[G012] JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// G013: YAML serialization/deserialization error
    #[error("[G013] YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Result type alias for CoreError
pub type CoreResult<T> = Result<T, CoreError>;
