use chrono::NaiveDate;

/// This is the standard way of converting a day into a string in worklog.
pub fn date_to_day_name(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Formats whole seconds as `HH:MM:SS`. Hours keep growing past 99 instead of wrapping.
pub fn format_clock(seconds: u64) -> String {
    format!(
        "{:02}:{:02}:{:02}",
        seconds / 3600,
        (seconds % 3600) / 60,
        seconds % 60
    )
}
