//! Classification tables used while scanning
//!
//! Built once at startup from the defaults below plus any additions from the
//! config file, then shared read-only by every scan.

use crate::config::ScanConfig;
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use std::collections::HashSet;
use std::path::{Component, Path};
use tracing::warn;

/// Dependency, build and cache directories reported as one opaque entry.
pub const FOLD_DIRS: &[&str] = &[
    // JavaScript
    "node_modules",
    "bower_components",
    ".npm",
    ".tnpm",
    ".yarn",
    ".pnpm-store",
    ".next",
    ".nuxt",
    ".turbo",
    ".parcel-cache",
    ".angular",
    ".svelte-kit",
    // Python
    "__pycache__",
    ".venv",
    "venv",
    "virtualenv",
    ".tox",
    ".pytest_cache",
    ".mypy_cache",
    ".ruff_cache",
    ".eggs",
    // JVM
    ".gradle",
    ".m2",
    // Rust / Go
    "target",
    ".cargo",
    ".rustup",
    "go-build",
    // Apple tooling
    "DerivedData",
    "Pods",
    "Carthage",
    "CoreSimulator",
    ".build",
    // VCS and misc caches
    ".git",
    ".hg",
    ".svn",
    ".dart_tool",
    ".terraform",
    ".cache",
];

/// Nested package-manager cache shards (`.npm/_cacache/*`, `.npm/a/`, ...).
pub const FOLD_PATTERNS: &[&str] = &[
    "**/.npm/*",
    "**/.npm/**/_*/*",
    "**/.npm/**/?",
    "**/.tnpm/*",
    "**/.tnpm/**/_*/*",
    "**/.tnpm/**/?",
];

/// Source and text formats never offered to the large-file list.
pub const SKIP_EXTENSIONS: &[&str] = &[
    "rs", "go", "c", "h", "cc", "cpp", "hpp", "m", "mm", "swift", "java", "kt", "kts", "scala",
    "py", "pyi", "rb", "php", "pl", "lua", "js", "jsx", "mjs", "cjs", "ts", "tsx", "vue", "svelte",
    "css", "scss", "sass", "less", "html", "htm", "xml", "json", "yaml", "yml", "toml", "ini",
    "cfg", "conf", "md", "rst", "txt", "csv", "sh", "bash", "zsh", "fish", "sql", "gradle",
    "lock", "map",
];

/// Children of the filesystem root that are never sized or listed.
pub const ROOT_SYSTEM_DIRS: &[&str] = &[
    "dev",
    "proc",
    "sys",
    "run",
    "lost+found",
    "System",
    "private",
    "cores",
    ".vol",
    ".fseventsd",
    ".Spotlight-V100",
    ".DocumentRevisions-V100",
    ".MobileBackups",
    ".Trashes",
    "Volumes",
];

/// Project dependency/build directories that are safe to delete by hand.
pub const CLEANABLE_DIRS: &[&str] = &[
    "node_modules",
    "bower_components",
    ".yarn",
    ".pnpm-store",
    "venv",
    ".venv",
    "virtualenv",
    "__pycache__",
    ".pytest_cache",
    ".mypy_cache",
    ".ruff_cache",
    ".tox",
    ".eggs",
    "htmlcov",
    ".ipynb_checkpoints",
    "vendor",
    ".bundle",
    ".gradle",
    "out",
    "build",
    "dist",
    "target",
    ".next",
    ".nuxt",
    ".output",
    ".parcel-cache",
    ".turbo",
    ".vite",
    ".nx",
    "coverage",
    ".coverage",
    ".nyc_output",
    ".angular",
    ".svelte-kit",
    ".astro",
    ".docusaurus",
    "DerivedData",
    "Pods",
    ".build",
    "Carthage",
    ".dart_tool",
    ".terraform",
];

/// Locations that system-cleanup tooling already handles.
const SYSTEM_CLEANUP_MARKERS: &[&str] = &[
    "/Library/Caches/",
    "/Library/Logs/",
    "/Library/Saved Application State/",
    "/.Trash/",
    "/Library/DiagnosticReports/",
];

#[derive(Debug, Clone)]
pub struct ScanRules {
    fold_dirs: HashSet<String>,
    fold_patterns: GlobSet,
    skip_extensions: HashSet<String>,
    root_system_dirs: HashSet<String>,
    cleanable_dirs: HashSet<String>,
}

impl Default for ScanRules {
    fn default() -> Self {
        Self::build(&[], &[], &[])
    }
}

impl ScanRules {
    pub fn from_config(config: &ScanConfig) -> Self {
        Self::build(
            &config.extra_fold_dirs,
            &config.extra_fold_patterns,
            &config.extra_skip_extensions,
        )
    }

    fn build(extra_dirs: &[String], extra_patterns: &[String], extra_exts: &[String]) -> Self {
        let fold_dirs = FOLD_DIRS
            .iter()
            .map(|s| s.to_string())
            .chain(extra_dirs.iter().cloned())
            .collect();

        let mut builder = GlobSetBuilder::new();
        let patterns = FOLD_PATTERNS
            .iter()
            .map(|s| s.to_string())
            .chain(extra_patterns.iter().cloned());
        for pattern in patterns {
            match GlobBuilder::new(&pattern).literal_separator(true).build() {
                Ok(glob) => {
                    builder.add(glob);
                }
                Err(e) => warn!("ignoring fold pattern {:?}: {}", pattern, e),
            }
        }
        let fold_patterns = builder.build().unwrap_or_else(|e| {
            warn!("fold patterns unusable: {}", e);
            GlobSet::empty()
        });

        let skip_extensions = SKIP_EXTENSIONS
            .iter()
            .map(|s| s.to_string())
            .chain(
                extra_exts
                    .iter()
                    .map(|e| e.trim_start_matches('.').to_lowercase()),
            )
            .collect();

        Self {
            fold_dirs,
            fold_patterns,
            skip_extensions,
            root_system_dirs: ROOT_SYSTEM_DIRS.iter().map(|s| s.to_string()).collect(),
            cleanable_dirs: CLEANABLE_DIRS.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Whether a directory should be folded into a single opaque entry.
    pub fn should_fold(&self, name: &str, path: &Path) -> bool {
        self.fold_dirs.contains(name) || self.fold_patterns.is_match(path)
    }

    /// True when the file's extension marks it as source or text.
    pub fn skip_for_large_tracking(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| self.skip_extensions.contains(&e.to_lowercase()))
            .unwrap_or(false)
    }

    /// True when any component of `path` is a fold directory.
    pub fn is_in_folded_dir(&self, path: &Path) -> bool {
        path.components().any(|c| match c {
            Component::Normal(name) => self.fold_dirs.contains(name.to_string_lossy().as_ref()),
            _ => false,
        })
    }

    /// Skipped entirely when scanning the filesystem root.
    pub fn is_root_system_dir(&self, name: &str) -> bool {
        self.root_system_dirs.contains(name)
    }

    /// Display hint: a dependency/build directory the user could remove.
    pub fn is_cleanable_dir(&self, path: &Path) -> bool {
        let path_str = path.to_string_lossy();
        if path_str.is_empty()
            || SYSTEM_CLEANUP_MARKERS
                .iter()
                .any(|marker| path_str.contains(marker))
        {
            return false;
        }
        path.file_name()
            .map(|n| self.cleanable_dirs.contains(n.to_string_lossy().as_ref()))
            .unwrap_or(false)
    }
}
