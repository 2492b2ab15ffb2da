//! External accelerators and side actions
//!
//! Everything here shells out to a platform command under a hard timeout.
//! None of it is required: a missing binary, a timeout or unparseable output is
//! reported as an error and the caller moves on to its next strategy.

use crate::config::ToolsConfig;
use crate::error::{AnalyzeError, Result};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::debug;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Run a command to completion, killing it once `timeout` elapses.
///
/// Returns stdout on a zero exit status.
pub fn run_with_timeout(tool: &'static str, cmd: &mut Command, timeout: Duration) -> Result<String> {
    let mut child = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| AnalyzeError::tool(tool, format!("failed to start: {}", e)))?;

    // Drain both pipes on their own threads so a chatty child cannot block on a full pipe.
    let stdout = child.stdout.take().map(|mut out| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = out.read_to_end(&mut buf);
            buf
        })
    });
    let stderr = child.stderr.take().map(|mut err| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = err.read_to_end(&mut buf);
            buf
        })
    });

    let deadline = Instant::now() + timeout;
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) if Instant::now() >= deadline => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(AnalyzeError::tool(
                    tool,
                    format!("timed out after {:?}", timeout),
                ));
            }
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(e) => return Err(AnalyzeError::tool(tool, e.to_string())),
        }
    };

    let out = stdout.and_then(|h| h.join().ok()).unwrap_or_default();
    let err = stderr.and_then(|h| h.join().ok()).unwrap_or_default();

    if !status.success() {
        let stderr = String::from_utf8_lossy(&err);
        let stderr = stderr.trim();
        return Err(AnalyzeError::tool(
            tool,
            if stderr.is_empty() {
                format!("exited with {}", status)
            } else {
                format!("exited with {} ({})", status, stderr)
            },
        ));
    }

    Ok(String::from_utf8_lossy(&out).into_owned())
}

/// Fast whole-subtree sizing.
pub trait DiskUsageTool: Send + Sync {
    /// On-disk bytes under `path`. Never returns zero on success.
    fn disk_usage(&self, path: &Path) -> Result<u64>;
}

/// `du -sk <path>`
#[derive(Debug, Clone)]
pub struct DuTool {
    timeout: Duration,
}

impl DuTool {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl DiskUsageTool for DuTool {
    fn disk_usage(&self, path: &Path) -> Result<u64> {
        let out = run_with_timeout("du", Command::new("du").arg("-sk").arg(path), self.timeout)?;
        parse_du_output(&out)
    }
}

/// First field of `du -sk` output, in kilobytes, converted to bytes.
pub fn parse_du_output(out: &str) -> Result<u64> {
    let field = out
        .split_whitespace()
        .next()
        .ok_or_else(|| AnalyzeError::tool("du", "empty output"))?;
    let kb: i64 = field
        .parse()
        .map_err(|_| AnalyzeError::tool("du", format!("unparseable output {:?}", field)))?;
    if kb <= 0 {
        return Err(AnalyzeError::tool("du", format!("non-positive size {}", kb)));
    }
    Ok((kb as u64).saturating_mul(1024))
}

/// Content index able to list files above a size under a root.
pub trait ContentIndex: Send + Sync {
    /// Candidate paths, unfiltered and unsorted.
    fn search(&self, root: &Path, min_size: u64) -> Result<Vec<PathBuf>>;
}

/// Spotlight's `mdfind`.
#[derive(Debug, Clone)]
pub struct MdfindIndex {
    timeout: Duration,
}

impl MdfindIndex {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl ContentIndex for MdfindIndex {
    fn search(&self, root: &Path, min_size: u64) -> Result<Vec<PathBuf>> {
        let query = format!("kMDItemFSSize >= {}", min_size);
        let out = run_with_timeout(
            "mdfind",
            Command::new("mdfind").arg("-onlyin").arg(root).arg(query),
            self.timeout,
        )?;
        Ok(out
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(PathBuf::from)
            .collect())
    }
}

/// The optional accelerators a scan may use.
#[derive(Clone, Default)]
pub struct Accelerators {
    pub disk_usage: Option<Arc<dyn DiskUsageTool>>,
    pub index: Option<Arc<dyn ContentIndex>>,
}

impl Accelerators {
    /// Pure filesystem walking, no external commands.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn from_config(config: &ToolsConfig) -> Self {
        let disk_usage: Option<Arc<dyn DiskUsageTool>> = if config.use_du {
            Some(Arc::new(DuTool::new(config.du_timeout())))
        } else {
            None
        };
        let index: Option<Arc<dyn ContentIndex>> = if config.use_index {
            Some(Arc::new(MdfindIndex::new(config.index_timeout())))
        } else {
            None
        };
        Self { disk_usage, index }
    }

    pub fn with_disk_usage(mut self, tool: Arc<dyn DiskUsageTool>) -> Self {
        self.disk_usage = Some(tool);
        self
    }

    pub fn with_index(mut self, index: Arc<dyn ContentIndex>) -> Self {
        self.index = Some(index);
        self
    }
}

fn open_command(path: &Path) -> Command {
    if cfg!(target_os = "windows") {
        let mut cmd = Command::new("cmd");
        // `start` needs a window title argument; empty string is fine.
        cmd.args(["/C", "start", ""]).arg(path);
        cmd
    } else if cfg!(target_os = "macos") {
        let mut cmd = Command::new("open");
        cmd.arg(path);
        cmd
    } else {
        let mut cmd = Command::new("xdg-open");
        cmd.arg(path);
        cmd
    }
}

fn reveal_command(path: &Path) -> Command {
    if cfg!(target_os = "windows") {
        let mut cmd = Command::new("explorer");
        cmd.arg("/select,").arg(path);
        cmd
    } else if cfg!(target_os = "macos") {
        let mut cmd = Command::new("open");
        cmd.arg("-R").arg(path);
        cmd
    } else {
        // No portable way to select a file; open the containing directory.
        let target = if path.is_dir() {
            path
        } else {
            path.parent().unwrap_or(path)
        };
        let mut cmd = Command::new("xdg-open");
        cmd.arg(target);
        cmd
    }
}

fn spawn_detached(tool: &'static str, mut cmd: Command, timeout: Duration) {
    thread::spawn(move || {
        if let Err(e) = run_with_timeout(tool, &mut cmd, timeout) {
            debug!("{}", e);
        }
    });
}

/// Open with the default application. Best-effort; failures are only logged.
pub fn open_path(path: &Path, timeout: Duration) {
    spawn_detached("open", open_command(path), timeout);
}

/// Show in the platform file browser. Best-effort; failures are only logged.
pub fn reveal_path(path: &Path, timeout: Duration) {
    spawn_detached("reveal", reveal_command(path), timeout);
}
