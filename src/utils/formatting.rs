/// Format a duration in seconds for display
pub fn format_seconds(total_secs: u64) -> String {
    if total_secs < 60 {
        format!("{} second{}", total_secs, if total_secs == 1 { "" } else { "s" })
    } else if total_secs < 3600 {
        let mins = total_secs / 60;
        format!("{} minute{}", mins, if mins == 1 { "" } else { "s" })
    } else if total_secs < 86400 {
        let hours = total_secs / 3600;
        format!("{} hour{}", hours, if hours == 1 { "" } else { "s" })
    } else if total_secs < 604800 {
        let days = total_secs / 86400;
        format!("{} day{}", days, if days == 1 { "" } else { "s" })
    } else {
        let weeks = total_secs / 604800;
        format!("{} week{}", weeks, if weeks == 1 { "" } else { "s" })
    }
}

/// Truncate a string to a maximum length, adding ellipsis if needed
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_seconds() {
        assert_eq!(format_seconds(1), "1 second");
        assert_eq!(format_seconds(45), "45 seconds");
        assert_eq!(format_seconds(90), "1 minute");
        assert_eq!(format_seconds(3600), "1 hour");
        assert_eq!(format_seconds(86400), "1 day");
        assert_eq!(format_seconds(86400 * 3), "3 days");
        assert_eq!(format_seconds(604800 * 2), "2 weeks");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a longer string", 10), "a longe...");
    }
}
