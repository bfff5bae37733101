//! Parsing of human-readable resource figures
//!
//! The engine reports usage as strings such as `"21.5MiB / 1GiB"`,
//! `"1.2kB / 648B"` or `"0.15%"`. Everything is normalized here; values
//! that cannot be parsed become 0 and are logged, never fatal.

use tracing::warn;

const KIB: f64 = 1024.0;
const MIB: f64 = KIB * 1024.0;
const GIB: f64 = MIB * 1024.0;
const TIB: f64 = GIB * 1024.0;

/// Memory usage normalized to MiB
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MemoryUsage {
    pub used_mb: f64,
    pub limit_mb: f64,
    pub percent: f64,
}

/// Parse a size with an optional binary or decimal suffix into bytes
pub fn parse_byte_size(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    let split = raw
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(raw.len());
    let (number, unit) = raw.split_at(split);

    let value: f64 = number.parse().ok()?;
    let multiplier = match unit.trim().to_ascii_lowercase().as_str() {
        "" | "b" => 1.0,
        "kib" => KIB,
        "mib" => MIB,
        "gib" => GIB,
        "tib" => TIB,
        "k" | "kb" => 1e3,
        "m" | "mb" => 1e6,
        "g" | "gb" => 1e9,
        "t" | "tb" => 1e12,
        _ => return None,
    };

    Some(value * multiplier)
}

fn bytes_or_zero(raw: &str, what: &str) -> f64 {
    match parse_byte_size(raw) {
        Some(bytes) => bytes,
        None => {
            warn!(value = %raw, field = what, "Unparseable size, defaulting to 0");
            0.0
        }
    }
}

/// Split `"<a> / <b>"` into its two halves
fn split_pair(raw: &str) -> (&str, &str) {
    match raw.split_once('/') {
        Some((left, right)) => (left.trim(), right.trim()),
        None => (raw.trim(), ""),
    }
}

/// Parse `"<used> / <limit>"` memory usage
pub fn parse_memory_usage(raw: &str) -> MemoryUsage {
    let (used, limit) = split_pair(raw);
    let used_mb = bytes_or_zero(used, "memory_used") / MIB;
    let limit_mb = bytes_or_zero(limit, "memory_limit") / MIB;

    let percent = if limit_mb > 0.0 {
        used_mb / limit_mb * 100.0
    } else {
        0.0
    };

    MemoryUsage {
        used_mb,
        limit_mb,
        percent,
    }
}

/// Parse an `"<in> / <out>"` I/O pair into bytes
pub fn parse_io_pair(raw: &str) -> (u64, u64) {
    let (left, right) = split_pair(raw);
    (
        bytes_or_zero(left, "io_in").round() as u64,
        bytes_or_zero(right, "io_out").round() as u64,
    )
}

/// Parse a percentage such as `"12.5%"`
pub fn parse_percent(raw: &str) -> f64 {
    let trimmed = raw.trim().trim_end_matches('%').trim();
    match trimmed.parse::<f64>() {
        Ok(value) if value.is_finite() => value,
        _ => {
            warn!(value = %raw, "Unparseable percentage, defaulting to 0");
            0.0
        }
    }
}

/// Parse a plain count such as a PID total
pub fn parse_count(raw: &str) -> u32 {
    match raw.trim().parse::<u32>() {
        Ok(value) => value,
        Err(_) => {
            warn!(value = %raw, "Unparseable count, defaulting to 0");
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 0.01
    }

    #[test]
    fn test_memory_binary_suffixes() {
        let usage = parse_memory_usage("512MiB / 1GiB");
        assert!(approx(usage.used_mb, 512.0));
        assert!(approx(usage.limit_mb, 1024.0));
        assert!(approx(usage.percent, 50.0));
    }

    #[test]
    fn test_memory_zero_limit_has_no_percent() {
        let usage = parse_memory_usage("0B / 0B");
        assert_eq!(usage.used_mb, 0.0);
        assert_eq!(usage.percent, 0.0);
    }

    #[test]
    fn test_memory_decimal_suffixes() {
        let usage = parse_memory_usage("500MB / 1GB");
        assert!(approx(usage.percent, 50.0));
        assert!(approx(usage.limit_mb, 1e9 / MIB));
    }

    #[test]
    fn test_memory_garbage_defaults_to_zero() {
        let usage = parse_memory_usage("-- / --");
        assert_eq!(usage, MemoryUsage::default());

        let usage = parse_memory_usage("");
        assert_eq!(usage.percent, 0.0);
    }

    #[test]
    fn test_byte_size_variants() {
        assert_eq!(parse_byte_size("648B"), Some(648.0));
        assert_eq!(parse_byte_size("1.5kB"), Some(1500.0));
        assert_eq!(parse_byte_size("2KiB"), Some(2048.0));
        assert_eq!(parse_byte_size("42"), Some(42.0));
        assert_eq!(parse_byte_size("12 parsecs"), None);
        assert_eq!(parse_byte_size("MiB"), None);
    }

    #[test]
    fn test_io_pair() {
        assert_eq!(parse_io_pair("1.2kB / 648B"), (1200, 648));
        assert_eq!(parse_io_pair("0B / 0B"), (0, 0));
        assert_eq!(parse_io_pair("--"), (0, 0));
    }

    #[test]
    fn test_percent_and_count() {
        assert!(approx(parse_percent("12.5%"), 12.5));
        assert_eq!(parse_percent("--"), 0.0);
        assert_eq!(parse_count("7"), 7);
        assert_eq!(parse_count("n/a"), 0);
    }
}
