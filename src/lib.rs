//! spacelens library crate
//!
//! The scanning engine (concurrent scanner, size resolver, caches) is usable
//! on its own; the `tui` module drives it interactively.

pub mod cleaner;
pub mod cli;
pub mod config;
pub mod disk_usage;
pub mod disk_usage_cache;
pub mod error;
pub mod logging;
pub mod model;
pub mod overview;
pub mod progress;
pub mod rules;
pub mod scan_cache;
pub mod size;
pub mod size_resolver;
pub mod spinner;
pub mod tools;
pub mod top_n;
pub mod tui;
pub mod utils;
