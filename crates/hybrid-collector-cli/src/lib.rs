//! Hybrid collector CLI: collect, validate, and export unified records.

pub mod config;
pub mod runner;

pub use config::{fetch_policy, resolve_config_path, resolve_config_path_in};
pub use runner::{check_sources, load_config, run_sources, RunOptions, RunSummary};
