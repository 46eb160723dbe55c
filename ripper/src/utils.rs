/// Replace characters that are not allowed in file names with `_`.
pub fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | '<' | '>' | ':' | '"' | '|' | '?' | '*' => '_',
            _ => c,
        })
        .collect()
}

pub fn format_bytes(bytesval: usize, precision: usize) -> String {
    let mut val = bytesval as f32;

    for unit in ["bytes", "KiB", "MiB", "GiB", "TiB"] {
        if val < 1024.0 {
            return format!("{:.precision$} {}", val, unit, precision = precision);
        }

        val /= 1024.0;
    }

    format!("{:.precision$} PiB", val, precision = precision)
}

/// Format a duration given in `timescale` units as `mm:ss`.
pub fn format_duration(duration: u64, timescale: u32) -> String {
    let seconds = duration / timescale.max(1) as u64;
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_replaces_reserved_characters_only() {
        assert_eq!(sanitize(r#"a/b\c<d>e:f"g|h?i*j"#), "a_b_c_d_e_f_g_h_i_j");
        assert_eq!(
            sanitize("AC/DC - Back in Black (Remastered)"),
            "AC_DC - Back in Black (Remastered)"
        );
        assert_eq!(sanitize("Björk. #1 ~ 'Live' & more!"), "Björk. #1 ~ 'Live' & more!");
    }

    #[test]
    fn bytes() {
        assert_eq!(format_bytes(512, 0), "512 bytes");
        assert_eq!(format_bytes(1536, 1), "1.5 KiB");
        assert_eq!(format_bytes(3 * 1024 * 1024, 2), "3.00 MiB");
    }

    #[test]
    fn durations() {
        assert_eq!(format_duration(44100 * 125, 44100), "02:05");
        assert_eq!(format_duration(0, 0), "00:00");
    }
}
