//! gantry-load - Load orchestration for Gantry
//!
//! This crate drives load packages into a destination: it resolves table
//! chains for merge and replace consistency, prepares and migrates the
//! destination (including its staging dataset), and dispatches job files
//! concurrently under a worker-slot scheduler.

pub mod chain;
pub mod config;
pub mod error;
pub mod init;
pub mod loader;
pub mod scheduler;

pub use chain::{completed_table_chain, extend_tables_with_table_chain};
pub use config::LoaderConfig;
pub use error::{LoadError, LoadResult};
pub use init::init_client;
pub use loader::{LoadSummary, Loader};
pub use scheduler::{available_worker_slots, filter_new_jobs};
