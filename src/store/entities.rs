use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::timer::CompletedRun;

/// One completed run as it is stored in the log. Entries are never mutated after they are
/// appended.
#[derive(PartialEq, Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEntry {
    pub id: Arc<str>,
    pub activity: Arc<str>,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    /// Ticks counted by the timer. This is the duration every summary is built from.
    pub duration_seconds: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hourly_rate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<Arc<str>>,
}

/// Billing rate for an activity name. At most one exists per exact name.
#[derive(PartialEq, Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct RateEntry {
    pub activity: Arc<str>,
    pub hourly_rate: f64,
    pub currency: Arc<str>,
}

impl RateEntry {
    pub fn new(activity: impl Into<Arc<str>>, hourly_rate: f64, currency: impl Into<Arc<str>>) -> Self {
        Self {
            activity: activity.into(),
            hourly_rate,
            currency: currency.into(),
        }
    }

    /// Amount billed for `seconds` of work at this rate.
    pub fn billable(&self, seconds: u64) -> f64 {
        seconds as f64 / 3600. * self.hourly_rate
    }
}

/// Everything needed to append an entry, minus the id the store assigns.
#[derive(Debug, Clone)]
pub struct NewEntry {
    pub activity: Arc<str>,
    pub run: CompletedRun,
    pub hourly_rate: Option<f64>,
    pub currency: Option<Arc<str>>,
}

impl NewEntry {
    pub fn new(activity: impl Into<Arc<str>>, run: CompletedRun) -> Self {
        Self {
            activity: activity.into(),
            run,
            hourly_rate: None,
            currency: None,
        }
    }

    /// Stamps the rate that was set when the run began.
    pub fn with_rate(self, rate: Option<&RateEntry>) -> Self {
        Self {
            hourly_rate: rate.map(|r| r.hourly_rate),
            currency: rate.map(|r| r.currency.clone()),
            ..self
        }
    }

    pub(super) fn into_entry(self, id: Arc<str>) -> ActivityEntry {
        ActivityEntry {
            id,
            activity: self.activity,
            started_at: self.run.started_at,
            ended_at: self.run.ended_at,
            duration_seconds: self.run.elapsed_seconds,
            hourly_rate: self.hourly_rate,
            currency: self.currency,
        }
    }
}
