//! Shared filesystem and display helpers

use chrono::{DateTime, Utc};
use std::fs::Metadata;
use std::path::Path;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

/// Returns true if this path is a Windows reparse point (junction/symlink/mount point).
///
/// Junctions are not reported as symlinks by `file_type()`, so they need their
/// own check to keep walks from looping.
pub fn is_windows_reparse_point(path: &Path) -> bool {
    #[cfg(windows)]
    {
        use std::os::windows::fs::MetadataExt;
        const FILE_ATTRIBUTE_REPARSE_POINT: u32 = 0x0400;
        if let Ok(meta) = std::fs::symlink_metadata(path) {
            return meta.file_attributes() & FILE_ATTRIBUTE_REPARSE_POINT != 0;
        }
        false
    }
    #[cfg(not(windows))]
    {
        let _ = path;
        false
    }
}

/// On-disk footprint of a file.
///
/// Allocated blocks when the platform reports them, so sparse files and cloud
/// placeholders count what they really occupy. Never more than the logical
/// length. With `apparent` set, always the logical length.
pub fn actual_size(meta: &Metadata, apparent: bool) -> u64 {
    let logical = meta.len();
    if apparent {
        return logical;
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::MetadataExt;
        let allocated = meta.blocks().saturating_mul(512);
        allocated.min(logical)
    }
    #[cfg(not(unix))]
    {
        logical
    }
}

pub fn last_access(meta: &Metadata) -> Option<DateTime<Utc>> {
    meta.accessed().ok().map(DateTime::<Utc>::from)
}

/// Last access time read straight from the filesystem.
pub fn last_access_of(path: &Path) -> Option<DateTime<Utc>> {
    std::fs::metadata(path).ok().and_then(|m| last_access(&m))
}

/// "3mo", "45d" style age for items unused for at least 30 days.
pub fn format_unused_time(last_access: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Option<String> {
    let days = (now - last_access?).num_days();
    if days < 30 {
        return None;
    }
    Some(if days >= 365 {
        format!(">{}y", days / 365)
    } else if days >= 90 {
        format!(">{}mo", days / 30)
    } else {
        format!(">{}d", days)
    })
}

/// Replace the home directory prefix with `~`.
pub fn display_path(path: &Path) -> String {
    if let Some(home) = directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf()) {
        if let Ok(rest) = path.strip_prefix(&home) {
            if rest.as_os_str().is_empty() {
                return "~".to_string();
            }
            return format!("~/{}", rest.display());
        }
    }
    path.display().to_string()
}

/// Shorten to `max_width` display columns by cutting out the middle.
pub fn truncate_middle(s: &str, max_width: usize) -> String {
    if s.width() <= max_width {
        return s.to_string();
    }
    if max_width <= 3 {
        return ".".repeat(max_width);
    }
    let keep = max_width - 3;
    let head_budget = keep / 2;
    let tail_budget = keep - head_budget;

    let mut head = String::new();
    let mut used = 0;
    for c in s.chars() {
        let w = c.width().unwrap_or(0);
        if used + w > head_budget {
            break;
        }
        used += w;
        head.push(c);
    }

    let mut tail: Vec<char> = Vec::new();
    used = 0;
    for c in s.chars().rev() {
        let w = c.width().unwrap_or(0);
        if used + w > tail_budget {
            break;
        }
        used += w;
        tail.push(c);
    }
    tail.reverse();

    format!("{}...{}", head, tail.into_iter().collect::<String>())
}

/// Pad (or truncate) to exactly `width` display columns.
pub fn pad_name(s: &str, width: usize) -> String {
    let s = truncate_middle(s, width);
    let pad = width.saturating_sub(s.width());
    format!("{}{}", s, " ".repeat(pad))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_actual_size_never_exceeds_logical() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("small.bin");
        fs::write(&file, b"hello").unwrap();
        let meta = fs::metadata(&file).unwrap();
        assert!(actual_size(&meta, false) <= 5);
        assert_eq!(actual_size(&meta, true), 5);
    }

    #[test]
    fn test_unused_time_buckets() {
        let now = Utc::now();
        assert_eq!(format_unused_time(None, now), None);
        assert_eq!(format_unused_time(Some(now - chrono::Duration::days(3)), now), None);
        assert_eq!(
            format_unused_time(Some(now - chrono::Duration::days(45)), now),
            Some(">45d".to_string())
        );
        assert_eq!(
            format_unused_time(Some(now - chrono::Duration::days(120)), now),
            Some(">4mo".to_string())
        );
        assert_eq!(
            format_unused_time(Some(now - chrono::Duration::days(800)), now),
            Some(">2y".to_string())
        );
    }

    #[test]
    fn test_truncate_middle() {
        assert_eq!(truncate_middle("short", 10), "short");
        let cut = truncate_middle("/very/long/path/to/some/file.bin", 15);
        assert_eq!(cut.width(), 15);
        assert!(cut.starts_with("/very"));
        assert!(cut.ends_with(".bin"));
        assert!(cut.contains("..."));
    }

    #[test]
    fn test_pad_name_fixed_width() {
        assert_eq!(pad_name("ab", 5), "ab   ");
        assert_eq!(pad_name("abcdefghij", 7).width(), 7);
    }
}
