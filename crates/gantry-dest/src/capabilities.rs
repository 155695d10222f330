//! Destination capability declarations consumed by the loader.
//!
//! Capabilities are published by a client up front so the loader can check a
//! flag once instead of probing the destination at every call site.

use gantry_core::package::FileFormat;
use serde::{Deserialize, Serialize};

/// Job scheduling policy for a load
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ParallelismStrategy {
    /// One job at a time
    Sequential,
    /// Any number of jobs, but never two on the same table
    TableSequential,
    /// No ordering constraints beyond the worker count
    Parallel,
}

impl std::fmt::Display for ParallelismStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParallelismStrategy::Sequential => write!(f, "sequential"),
            ParallelismStrategy::TableSequential => write!(f, "table-sequential"),
            ParallelismStrategy::Parallel => write!(f, "parallel"),
        }
    }
}

/// Static capabilities a destination publishes about itself
#[derive(Debug, Clone)]
pub struct DestinationCapabilities {
    /// Job file formats the destination can ingest
    pub supported_file_formats: Vec<FileFormat>,

    /// Preferred job file size, when the destination cares
    pub recommended_file_size: Option<u64>,

    /// Scheduling policy the destination prefers when the loader config does
    /// not set one
    pub loader_parallelism_strategy: Option<ParallelismStrategy>,

    /// Hard ceiling on parallel load jobs regardless of configured workers
    pub max_parallel_load_jobs: Option<usize>,

    /// Whether the client implements dropping tables
    pub supports_table_drop: bool,
}

impl Default for DestinationCapabilities {
    fn default() -> Self {
        Self {
            supported_file_formats: vec![FileFormat::Csv, FileFormat::Jsonl],
            recommended_file_size: None,
            loader_parallelism_strategy: None,
            max_parallel_load_jobs: None,
            supports_table_drop: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_serde_names() {
        let json = serde_json::to_string(&ParallelismStrategy::TableSequential).unwrap();
        assert_eq!(json, "\"table-sequential\"");
        let parsed: ParallelismStrategy = serde_json::from_str("\"sequential\"").unwrap();
        assert_eq!(parsed, ParallelismStrategy::Sequential);
        assert_eq!(
            ParallelismStrategy::TableSequential.to_string(),
            "table-sequential"
        );
    }

    #[test]
    fn test_default_capabilities() {
        let caps = DestinationCapabilities::default();
        assert!(caps.supported_file_formats.contains(&FileFormat::Csv));
        assert!(caps.loader_parallelism_strategy.is_none());
        assert!(!caps.supports_table_drop);
    }
}
