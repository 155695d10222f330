//! Loader configuration

use gantry_core::error::CoreResult;
use gantry_dest::ParallelismStrategy;
use serde::{Deserialize, Serialize};

fn default_workers() -> usize {
    20
}

fn default_true() -> bool {
    true
}

/// Settings that control how load packages are dispatched
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct LoaderConfig {
    /// Upper bound on concurrently running load jobs
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Overrides the parallelism strategy advertised by the destination
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parallelism_strategy: Option<ParallelismStrategy>,

    /// Fail the whole package when any job fails; when off, failed jobs are
    /// recorded and the package still completes
    #[serde(default = "default_true")]
    pub raise_on_failed_jobs: bool,

    /// Truncate staging tables once the package finishes
    #[serde(default)]
    pub truncate_staging_dataset: bool,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            parallelism_strategy: None,
            raise_on_failed_jobs: true,
            truncate_staging_dataset: false,
        }
    }
}

impl LoaderConfig {
    /// Parse a configuration from YAML
    pub fn from_yaml(content: &str) -> CoreResult<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Set the worker count
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Force a parallelism strategy regardless of destination capabilities
    pub fn with_parallelism_strategy(mut self, strategy: ParallelismStrategy) -> Self {
        self.parallelism_strategy = Some(strategy);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LoaderConfig::default();
        assert_eq!(config.workers, 20);
        assert_eq!(config.parallelism_strategy, None);
        assert!(config.raise_on_failed_jobs);
        assert!(!config.truncate_staging_dataset);
    }

    #[test]
    fn test_from_yaml_partial() {
        let config = LoaderConfig::from_yaml("workers: 4\nraise_on_failed_jobs: false\n")
            .expect("should parse");
        assert_eq!(config.workers, 4);
        assert!(!config.raise_on_failed_jobs);
        assert_eq!(config.parallelism_strategy, None);
    }

    #[test]
    fn test_from_yaml_strategy() {
        let config =
            LoaderConfig::from_yaml("parallelism_strategy: table-sequential\n").expect("should parse");
        assert_eq!(
            config.parallelism_strategy,
            Some(ParallelismStrategy::TableSequential)
        );
    }

    #[test]
    fn test_from_yaml_rejects_unknown_fields() {
        let result = LoaderConfig::from_yaml("workres: 4\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_builder_methods() {
        let config = LoaderConfig::default()
            .with_workers(1)
            .with_parallelism_strategy(ParallelismStrategy::Sequential);
        assert_eq!(config.workers, 1);
        assert_eq!(
            config.parallelism_strategy,
            Some(ParallelismStrategy::Sequential)
        );
    }
}
