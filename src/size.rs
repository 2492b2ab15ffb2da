//! Size parsing and human-readable formatting

use anyhow::{bail, Context, Result};

const KIB: u64 = 1024;

/// Parse human-readable size strings to bytes
///
/// Binary units, case-insensitive, with or without the trailing "B":
/// "100MB" and "100m" are both 104_857_600. A bare number is bytes.
pub fn parse_size(s: &str) -> Result<u64> {
    let s = s.trim();
    if s.is_empty() {
        bail!("Empty size string");
    }

    let num_end = s
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit() && *c != '.')
        .map(|(i, _)| i)
        .unwrap_or(s.len());

    if num_end == 0 {
        bail!("Size string must start with a number: {}", s);
    }

    let (num_str, unit) = s.split_at(num_end);
    let num: f64 = num_str
        .parse()
        .with_context(|| format!("Invalid number: {}", num_str))?;

    let multiplier = match unit.trim().to_uppercase().as_str() {
        "" | "B" => 1,
        "K" | "KB" => KIB,
        "M" | "MB" => KIB.pow(2),
        "G" | "GB" => KIB.pow(3),
        "T" | "TB" => KIB.pow(4),
        other => bail!("Unknown size unit: {}. Supported: B, KB, MB, GB, TB", other),
    };

    Ok((num * multiplier as f64) as u64)
}

/// "1.5 GiB"-style rendering used across the UI.
pub fn format_bytes(bytes: u64) -> String {
    bytesize::to_string(bytes, true)
}

/// Thousands separators: 1234567 -> "1,234,567"
pub fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    for (i, c) in s.chars().enumerate() {
        if i > 0 && (s.len() - i) % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result
}
