use chrono::{DateTime, Local, Utc};

/// Running-timer rendering, `MM:SS` under an hour and `H:MM:SS` above.
pub fn format_elapsed(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{:02}:{:02}", minutes, secs)
    }
}

/// Table timestamp rendering in local time, `-` when absent.
pub fn format_timestamp(value: Option<&DateTime<Utc>>) -> String {
    match value {
        Some(ts) => ts.with_timezone(&Local).format("%d %b %H:%M").to_string(),
        None => "-".to_string(),
    }
}

/// Server ids can be long ObjectId-style strings; keep table columns narrow.
pub fn short_id(id: &str, max: usize) -> String {
    if id.chars().count() <= max {
        id.to_string()
    } else {
        let head: String = id.chars().take(max.saturating_sub(1)).collect();
        format!("{}…", head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elapsed_formats_by_magnitude() {
        assert_eq!(format_elapsed(0), "00:00");
        assert_eq!(format_elapsed(45), "00:45");
        assert_eq!(format_elapsed(125), "02:05");
        assert_eq!(format_elapsed(3_725), "1:02:05");
    }

    #[test]
    fn missing_timestamp_renders_dash() {
        assert_eq!(format_timestamp(None), "-");
    }

    #[test]
    fn short_id_truncates_long_ids() {
        assert_eq!(short_id("abc", 10), "abc");
        assert_eq!(short_id("0123456789abcdef", 10), "012345678…");
    }
}
