//! gantry-dest - Destination layer for Gantry
//!
//! This crate provides the `JobClient` trait the loader drives destinations
//! through, the capability declarations destinations publish, and the
//! DuckDB implementation with primary/staging dataset support.

pub mod capabilities;
pub mod duckdb;
pub mod error;
pub mod traits;

pub use capabilities::{DestinationCapabilities, ParallelismStrategy};
pub use duckdb::DuckDbJobClient;
pub use error::{DestError, DestResult};
pub use traits::JobClient;
