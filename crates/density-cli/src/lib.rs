//! Density CLI - loads a dataset from disk, runs one evaluation and writes
//! a JSON report.
//!
//! Binaries:
//! - density-estimate: area or track evaluation from a JSON run config

pub mod config;
pub mod loader;
pub mod report;

pub use config::Config;
pub use loader::{load_dataset, load_run_config, parse_dataset, DatasetFile};
pub use report::{summary_line, Report};
