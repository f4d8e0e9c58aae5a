//! Derives per-activity and per-day totals from the log and the current rate table.
//!
//! Billing always uses the rate that is in the table right now. Changing a rate reprices the
//! whole history of that activity, including past days. The rate stamped on each entry is
//! kept for reference only.

use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use chrono::{Local, NaiveDate, TimeZone};
use serde::Serialize;
use tracing::{instrument, trace};

use crate::store::entities::{ActivityEntry, RateEntry};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivitySummary {
    pub activity: Arc<str>,
    pub total_seconds: u64,
    pub hourly_rate: Option<f64>,
    pub currency: Option<Arc<str>>,
    pub total_billable: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivityTime {
    pub activity: Arc<str>,
    pub seconds: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailySummary {
    pub date: NaiveDate,
    /// Activities of the day in the order they were first logged.
    pub activities: Vec<ActivityTime>,
    pub total_seconds: u64,
    /// [None] when no activity of the day has a rate.
    pub billable_amount: Option<f64>,
}

impl DailySummary {
    pub fn seconds_for(&self, activity: &str) -> u64 {
        self.activities
            .iter()
            .find(|v| &*v.activity == activity)
            .map_or(0, |v| v.seconds)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Summaries {
    /// Sorted by total time, longest first. Ties keep first-seen order.
    pub activities: Vec<ActivitySummary>,
    /// Most recent day first.
    pub daily: Vec<DailySummary>,
}

impl Summaries {
    pub fn total_seconds(&self) -> u64 {
        self.activities.iter().map(|v| v.total_seconds).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.activities.is_empty()
    }
}

/// Aggregates using the local calendar for day boundaries.
pub fn aggregate(entries: &[ActivityEntry], rates: &[RateEntry]) -> Summaries {
    aggregate_in(entries, rates, &Local)
}

/// Aggregates with day boundaries taken from `tz`. An entry belongs to the day it started on,
/// even when it runs past midnight.
#[instrument(skip_all, fields(entries = entries.len(), rates = rates.len()))]
pub fn aggregate_in<Tz: TimeZone>(
    entries: &[ActivityEntry],
    rates: &[RateEntry],
    tz: &Tz,
) -> Summaries {
    let rates = rate_lookup(rates);

    let mut activities = Vec::<ActivitySummary>::new();
    let mut activity_index = HashMap::<Arc<str>, usize>::new();
    let mut days = BTreeMap::<NaiveDate, Vec<ActivityTime>>::new();

    for entry in entries {
        let index = *activity_index
            .entry(entry.activity.clone())
            .or_insert_with(|| {
                activities.push(ActivitySummary {
                    activity: entry.activity.clone(),
                    total_seconds: 0,
                    hourly_rate: None,
                    currency: None,
                    total_billable: None,
                });
                activities.len() - 1
            });
        let summary = &mut activities[index];
        summary.total_seconds = summary.total_seconds.saturating_add(entry.duration_seconds);

        let date = entry.started_at.with_timezone(tz).date_naive();
        let day = days.entry(date).or_default();
        match day.iter_mut().find(|v| v.activity == entry.activity) {
            Some(time) => time.seconds = time.seconds.saturating_add(entry.duration_seconds),
            None => day.push(ActivityTime {
                activity: entry.activity.clone(),
                seconds: entry.duration_seconds,
            }),
        }
    }

    for summary in activities.iter_mut() {
        if let Some(rate) = rates.get(&*summary.activity) {
            summary.hourly_rate = Some(rate.hourly_rate);
            summary.currency = Some(rate.currency.clone());
            summary.total_billable = Some(rate.billable(summary.total_seconds));
        }
    }
    // Stable, so equal totals keep the order activities were first logged in.
    activities.sort_by(|a, b| b.total_seconds.cmp(&a.total_seconds));

    let daily = days
        .into_iter()
        .rev()
        .map(|(date, activities)| {
            let total_seconds = activities.iter().map(|v| v.seconds).sum();
            let billable_amount = activities
                .iter()
                .filter_map(|v| rates.get(&*v.activity).map(|r| r.billable(v.seconds)))
                .fold(None, |sum: Option<f64>, v| Some(sum.unwrap_or(0.) + v));
            DailySummary {
                date,
                activities,
                total_seconds,
                billable_amount,
            }
        })
        .collect::<Vec<_>>();

    trace!(
        "Aggregated into {} activities over {} days",
        activities.len(),
        daily.len()
    );

    Summaries { activities, daily }
}

fn rate_lookup(rates: &[RateEntry]) -> HashMap<&str, &RateEntry> {
    let mut lookup = HashMap::new();
    for rate in rates {
        lookup.entry(&*rate.activity).or_insert(rate);
    }
    lookup
}

/// Seconds spent on `activity` on each of the most recent `days` logged days, oldest first.
/// Returns [None] if the activity has no time in that window.
pub fn activity_trend(daily: &[DailySummary], activity: &str, days: usize) -> Option<Vec<u64>> {
    let mut trend = daily
        .iter()
        .take(days)
        .map(|day| day.seconds_for(activity))
        .collect::<Vec<_>>();
    if trend.iter().all(|v| *v == 0) {
        return None;
    }
    trend.reverse();
    Some(trend)
}
