use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::info;

use crate::cleaner;
use crate::config::Config;
use crate::disk_usage::{ConcurrentScanner, ScanOptions};
use crate::disk_usage_cache::{default_cache_dir, CacheStore};
use crate::logging;
use crate::overview;
use crate::rules::ScanRules;
use crate::scan_cache::ScanCache;
use crate::size_resolver::SizeResolver;
use crate::tools::Accelerators;
use crate::tui::{self, state::AppState, state::Settings, Services};

#[derive(Parser, Debug)]
#[command(name = "spacelens")]
#[command(version)]
#[command(about = "Interactive terminal disk-usage analyzer")]
#[command(
    long_about = "Browse what takes up space on disk. Folders are scanned concurrently, \
    results are cached between runs, and large files are collected along the way.\n\n\
    Examples:\n  \
    spacelens                 # Overview of home, applications and system roots\n  \
    spacelens ~/Downloads     # Start in a specific folder\n  \
    spacelens --no-cache .    # Scan fresh, without reading or writing the cache"
)]
pub struct Cli {
    /// Folder to analyze. Without it, the overview of system roots is shown.
    pub path: Option<PathBuf>,

    /// Neither read nor write persisted scan results
    #[arg(long)]
    pub no_cache: bool,

    /// Write the effective configuration to the config file and exit
    #[arg(long)]
    pub write_config: bool,

    /// Log to stderr instead of the log file
    #[arg(long)]
    pub log_stderr: bool,
}

/// Make `path` absolute against the current directory without following symlinks.
pub fn resolve_path(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().context("Failed to read the current directory")?;
    let joined = cwd.join(path);
    let mut resolved = PathBuf::new();
    for component in joined.components() {
        match component {
            std::path::Component::CurDir => {}
            std::path::Component::ParentDir => {
                resolved.pop();
            }
            other => resolved.push(other),
        }
    }
    Ok(resolved)
}

impl Cli {
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }

    pub fn run(self) -> Result<()> {
        let cache_dir = default_cache_dir()?;
        let _log_guard = logging::init(&cache_dir, self.log_stderr)?;
        let config = Config::load();

        if self.write_config {
            let path = config.save()?;
            println!("Wrote {}", path.display());
            return Ok(());
        }

        let start = match &self.path {
            Some(path) => {
                let path = resolve_path(path)?;
                if !path.is_dir() {
                    anyhow::bail!("Not a directory: {}", path.display());
                }
                Some(path)
            }
            None => None,
        };

        let store = (config.cache.enabled && !self.no_cache)
            .then(|| Arc::new(CacheStore::new(&cache_dir).with_max_age(config.cache.max_age())));
        if let Some(store) = &store {
            let store = Arc::clone(store);
            thread::spawn(move || store.prune());
        }

        let rules = Arc::new(ScanRules::from_config(&config.scan));
        let accel = Accelerators::from_config(&config.tools);
        let scanner = Arc::new(ConcurrentScanner::new(
            ScanOptions::from_config(&config.scan),
            Arc::clone(&rules),
            accel.clone(),
        ));

        let services = Services {
            cache: Arc::new(ScanCache::new(scanner, store.clone())),
            resolver: Arc::new(SizeResolver::new(
                store.clone(),
                accel.disk_usage.clone(),
                config.scan.apparent_size,
            )),
            deleter: Arc::from(cleaner::deleter_for(config.delete.use_trash)),
            rules,
            open_timeout: config.tools.open_timeout(),
            tick: Duration::from_millis(config.ui.tick_ms.max(10)),
        };

        let settings = Settings {
            entry_viewport: config.ui.entry_viewport,
            large_viewport: config.ui.large_viewport,
            overview_batch: config.overview.max_concurrent,
        };
        let overview_sizes = store
            .as_ref()
            .map(|s| s.overview_sizes())
            .unwrap_or_default();

        info!(
            "starting in {}",
            start
                .as_deref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "overview".into())
        );
        let app_state = AppState::new(
            start,
            settings,
            overview::create_overview_entries(),
            overview_sizes,
        );
        tui::run(app_state, services)
    }
}
