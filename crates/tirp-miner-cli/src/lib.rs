//! TIRP miner CLI: dataset loading, run configuration, cancellation and exit codes.

pub mod config;
pub mod runner;

pub use config::{resolve_output_path, resolve_threads, stats_path};
pub use runner::{load_store, mine, ExitStatus, MineRequest, RunSummary};
