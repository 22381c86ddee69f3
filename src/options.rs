use std::path::PathBuf;

use clap::Parser;

use crate::arch::OsAbi;
use crate::logging::LevelFilter;
use crate::regcache::CacheOptions;

#[derive(Clone, Debug, Parser)]
#[command(version, about = "regcache: register inspection for a traced inferior")]
pub struct Options {
    /// Path to process executable
    pub executable: PathBuf,

    /// Arguments passed to the inferior by `run` when none are given there.
    #[arg(trailing_var_arg = true)]
    pub args: Vec<String>,

    /// OS ABI used to pick the register layout variant.
    #[arg(long, default_value = "linux")]
    pub osabi: OsAbi,

    /// Registers the target cannot provide read as zero instead of `<unavailable>`.
    #[arg(long)]
    pub synthetic_zero: bool,

    /// Store every register write, even when the value did not change.
    #[arg(long)]
    pub store_unchanged: bool,

    /// Also write the log to this file.
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Log level; falls back to `RUST_LOG`, then `warn`.
    #[arg(long, value_enum)]
    pub log_level: Option<LevelFilter>,
}

impl Options {
    pub fn cache_options(&self) -> CacheOptions {
        CacheOptions {
            synthetic_zero: self.synthetic_zero,
            suppress_redundant_stores: !self.store_unchanged,
        }
    }
}
