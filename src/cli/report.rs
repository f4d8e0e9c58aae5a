use std::collections::HashMap;

use ansi_term::Style;
use chrono::Local;

use crate::{
    aggregate::{activity_trend, DailySummary, Summaries},
    store::entities::ActivityEntry,
    utils::{
        percentage::seconds_percentage,
        time::{date_to_day_name, format_clock},
    },
};

const SPARK_LEVELS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

pub fn format_money(amount: f64, currency: &str) -> String {
    format!("{amount:.2} {currency}")
}

/// Lists entries in the order they were logged, in local time.
pub fn render_log(entries: &[ActivityEntry]) -> String {
    if entries.is_empty() {
        return "No activities logged yet.\n".into();
    }

    let mut out = String::new();
    for entry in entries {
        let rate = match (entry.hourly_rate, entry.currency.as_deref()) {
            (Some(rate), Some(currency)) => format!("{}/h", format_money(rate, currency)),
            _ => "-".into(),
        };
        out += &format!(
            "{}\t{}\t{}\t{}\t{}\n",
            entry
                .started_at
                .with_timezone(&Local)
                .format("%Y-%m-%d %H:%M:%S"),
            entry.ended_at.with_timezone(&Local).format("%H:%M:%S"),
            format_clock(entry.duration_seconds),
            entry.activity,
            rate
        );
    }
    out
}

pub fn render_summary(summaries: &Summaries, trend_days: usize) -> String {
    if summaries.is_empty() {
        return "No activities logged yet. Start tracking to see your summary here.\n".into();
    }

    let heading = Style::new().bold();
    let total = summaries.total_seconds();
    let mut out = format!("{}\n", heading.paint("Activity Summary"));
    for item in &summaries.activities {
        let billable = match (item.total_billable, item.currency.as_deref()) {
            (Some(amount), Some(currency)) => format_money(amount, currency),
            _ => "Not billable".into(),
        };
        let trend = activity_trend(&summaries.daily, &item.activity, trend_days)
            .map(|v| sparkline(&v))
            .unwrap_or_default();
        out += &format!(
            "{}\t{}\t{}\t{}\t{}\n",
            format_clock(item.total_seconds),
            seconds_percentage(item.total_seconds, total),
            billable,
            trend,
            item.activity
        );
    }

    let currencies = summaries
        .activities
        .iter()
        .filter_map(|v| Some((&*v.activity, v.currency.as_deref()?)))
        .collect::<HashMap<_, _>>();

    for day in &summaries.daily {
        out += &format!("\n{}\n", heading.paint(date_to_day_name(day.date)));
        for time in &day.activities {
            out += &format!("{}\t{}\n", format_clock(time.seconds), time.activity);
        }
        out += &format!("{}\tTotal\n", format_clock(day.total_seconds));
        if let Some(amount) = day.billable_amount {
            out += &format!("{}\tTotal billable\n", day_money(day, amount, &currencies));
        }
    }
    out
}

/// Shows the currency only when every rated activity of the day bills in the same one.
fn day_money(day: &DailySummary, amount: f64, currencies: &HashMap<&str, &str>) -> String {
    let mut used = day
        .activities
        .iter()
        .filter_map(|v| currencies.get(&*v.activity).copied());
    match used.next() {
        Some(first) if used.all(|v| v == first) => format_money(amount, first),
        _ => format!("{amount:.2}"),
    }
}

fn sparkline(values: &[u64]) -> String {
    let max = values.iter().copied().max().unwrap_or(0);
    values
        .iter()
        .map(|v| {
            if max == 0 {
                SPARK_LEVELS[0]
            } else {
                let level = (*v as f64 / max as f64 * (SPARK_LEVELS.len() - 1) as f64).round();
                SPARK_LEVELS[level as usize]
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use crate::{
        aggregate::aggregate_in,
        store::entities::{ActivityEntry, RateEntry},
    };

    use super::{format_money, render_log, render_summary, sparkline};

    fn entry(activity: &str, seconds: u64, day: u32) -> ActivityEntry {
        let started_at = Utc.with_ymd_and_hms(2024, 1, day, 10, 0, 0).unwrap();
        ActivityEntry {
            id: format!("{activity}{day}").into(),
            activity: activity.into(),
            started_at,
            ended_at: started_at + chrono::Duration::seconds(seconds as i64),
            duration_seconds: seconds,
            hourly_rate: None,
            currency: None,
        }
    }

    #[test]
    fn test_sparkline() {
        assert_eq!(sparkline(&[0, 7, 14]), "▁▅█");
        assert_eq!(sparkline(&[0, 0]), "▁▁");
    }

    #[test]
    fn test_format_money() {
        assert_eq!(format_money(75., "USD"), "75.00 USD");
    }

    #[test]
    fn summary_lists_billable_amounts() {
        let entries = [entry("Coding", 3600, 1), entry("Coding", 1800, 2), entry("Email", 600, 2)];
        let rates = [RateEntry::new("Coding", 50., "USD")];
        let summary = render_summary(&aggregate_in(&entries, &rates, &Utc), 14);

        assert!(summary.contains("01:30:00\t90%\t75.00 USD"));
        assert!(summary.contains("Not billable"));
        assert!(summary.contains("2024-01-02"));
        assert!(summary.contains("25.00 USD\tTotal billable"));
        let newer = summary.find("2024-01-02").unwrap();
        let older = summary.find("2024-01-01").unwrap();
        assert!(newer < older);
    }

    #[test]
    fn log_lists_each_run_with_its_rate() {
        let mut rated = entry("Coding", 1800, 1);
        rated.hourly_rate = Some(36.);
        rated.currency = Some("USD".into());
        let log = render_log(&[rated, entry("Email", 600, 2)]);

        let lines = log.lines().collect::<Vec<_>>();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("\t00:30:00\tCoding\t36.00 USD/h"));
        assert!(lines[1].ends_with("\t00:10:00\tEmail\t-"));
        assert!(render_log(&[]).starts_with("No activities logged yet"));
    }

    #[test]
    fn empty_summary_has_hint() {
        let summary = render_summary(&Default::default(), 14);
        assert!(summary.starts_with("No activities logged yet"));
    }
}
