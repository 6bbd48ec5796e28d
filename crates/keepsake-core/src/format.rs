const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];

/// Format a byte count for humans, e.g. `2.5 MB`.
///
/// Uses base 1024 and at most two decimals; anything past gigabytes is still
/// expressed in GB.
pub fn format_file_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    let mut scaled = bytes as f64;
    let mut exponent = 0;
    while scaled >= 1024.0 && exponent < UNITS.len() - 1 {
        scaled /= 1024.0;
        exponent += 1;
    }
    let rounded = (scaled * 100.0).round() / 100.0;

    format!("{} {}", rounded, UNITS[exponent])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_bytes() {
        assert_eq!(format_file_size(0), "0 Bytes");
    }

    #[test]
    fn small_values_stay_in_bytes() {
        assert_eq!(format_file_size(512), "512 Bytes");
    }

    #[test]
    fn fractional_units() {
        assert_eq!(format_file_size(1536), "1.5 KB");
        assert_eq!(format_file_size(2_621_440), "2.5 MB");
    }

    #[test]
    fn video_ceiling() {
        assert_eq!(format_file_size(200 * 1024 * 1024), "200 MB");
        assert_eq!(format_file_size(201 * 1024 * 1024), "201 MB");
    }

    #[test]
    fn huge_values_cap_at_gigabytes() {
        assert_eq!(format_file_size(2048 * 1024 * 1024 * 1024), "2048 GB");
    }
}
