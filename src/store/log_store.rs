use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
    aggregate::{aggregate, Summaries},
    error::TrackerError,
};

use super::{
    entities::{ActivityEntry, NewEntry, RateEntry},
    key_value::KeyValueStore,
};

pub const LOGS_KEY: &str = "activity_logs";
pub const RATES_KEY: &str = "activity_rates";

/// Yes/no gate in front of destructive operations.
#[cfg_attr(test, mockall::automock)]
pub trait Confirmation {
    fn confirm(&mut self, prompt: &str) -> bool;
}

pub const CLEAR_PROMPT: &str =
    "Are you sure you want to clear all activity logs? This action cannot be undone.";

/// Single owner of the entry log and the rate table. Every mutation is persisted right away
/// and followed by a fresh [Summaries] value for subscribers.
///
/// Persistence is best effort. Unreadable documents load as empty lists and failed writes are
/// logged and dropped, so the tracker keeps working without its storage.
pub struct ActivityLogStore<S: KeyValueStore> {
    storage: S,
    entries: Vec<ActivityEntry>,
    rates: Vec<RateEntry>,
    summaries: watch::Sender<Summaries>,
}

impl<S: KeyValueStore> ActivityLogStore<S> {
    pub async fn load(storage: S) -> Self {
        let entries = read_list::<ActivityEntry>(&storage, LOGS_KEY).await;
        let rates = read_list::<RateEntry>(&storage, RATES_KEY).await;
        info!("Loaded {} entries and {} rates", entries.len(), rates.len());

        let (summaries, _) = watch::channel(aggregate(&entries, &rates));
        Self {
            storage,
            entries,
            rates,
            summaries,
        }
    }

    /// Entries in the order they were appended.
    pub fn entries(&self) -> &[ActivityEntry] {
        &self.entries
    }

    pub fn rates(&self) -> &[RateEntry] {
        &self.rates
    }

    pub fn summaries(&self) -> Summaries {
        self.summaries.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Summaries> {
        self.summaries.subscribe()
    }

    /// Exact, case sensitive lookup.
    pub fn get_rate(&self, activity: &str) -> Option<&RateEntry> {
        self.rates.iter().find(|r| &*r.activity == activity)
    }

    /// Validates a run that is about to start. A given rate replaces the stored one. Returns the
    /// rate to stamp onto the entry once the run stops.
    pub async fn begin_run(
        &mut self,
        activity: &str,
        rate: Option<(f64, Arc<str>)>,
    ) -> Result<Option<RateEntry>, TrackerError> {
        validate_activity(activity)?;
        if let Some((hourly_rate, currency)) = rate {
            self.upsert_rate(RateEntry::new(activity, hourly_rate, currency))
                .await?;
        }
        Ok(self.get_rate(activity).cloned())
    }

    pub async fn append(&mut self, new_entry: NewEntry) -> Result<ActivityEntry, TrackerError> {
        validate_activity(&new_entry.activity)?;

        let id: Arc<str> = Uuid::new_v4().to_string().into();
        let entry = new_entry.into_entry(id);
        debug!("Appending {entry:?}");
        self.entries.push(entry.clone());

        self.persist(LOGS_KEY, &self.entries).await;
        self.publish();
        Ok(entry)
    }

    /// Replaces the rate row for the exact activity name.
    pub async fn upsert_rate(&mut self, rate: RateEntry) -> Result<(), TrackerError> {
        validate_activity(&rate.activity)?;
        if !rate.hourly_rate.is_finite() || rate.hourly_rate < 0. {
            return Err(TrackerError::InvalidRate(rate.hourly_rate));
        }

        self.rates.retain(|r| r.activity != rate.activity);
        info!(
            "Rate for {:?} set to {} {}",
            rate.activity, rate.hourly_rate, rate.currency
        );
        self.rates.push(rate);

        self.persist(RATES_KEY, &self.rates).await;
        self.publish();
        Ok(())
    }

    /// Discards every entry once `confirmation` agrees. The rate table is kept. Returns whether
    /// anything was cleared.
    pub async fn clear(&mut self, confirmation: &mut dyn Confirmation) -> bool {
        if !confirmation.confirm(CLEAR_PROMPT) {
            debug!("Clearing declined");
            return false;
        }

        self.entries.clear();
        if let Err(e) = self.storage.remove(LOGS_KEY).await {
            error!("Failed to remove {LOGS_KEY} {e:?}");
        }
        info!("Activity log cleared");
        self.publish();
        true
    }

    async fn persist<T: Serialize>(&self, key: &str, values: &[T]) {
        let document = match serde_json::to_string(values) {
            Ok(v) => v,
            Err(e) => {
                error!("Failed to serialize {key} {e:?}");
                return;
            }
        };
        if let Err(e) = self.storage.write(key, document).await {
            error!("Failed to persist {key}, change is kept in memory only {e:?}");
        }
    }

    fn publish(&self) {
        self.summaries
            .send_replace(aggregate(&self.entries, &self.rates));
    }
}

fn validate_activity(activity: &str) -> Result<(), TrackerError> {
    if activity.trim().is_empty() {
        Err(TrackerError::EmptyActivity)
    } else {
        Ok(())
    }
}

async fn read_list<T: DeserializeOwned>(storage: &impl KeyValueStore, key: &str) -> Vec<T> {
    let document = match storage.read(key).await {
        Ok(Some(v)) => v,
        Ok(None) => return vec![],
        Err(e) => {
            warn!("Failed to read {key}, starting empty {e:?}");
            return vec![];
        }
    };
    match serde_json::from_str::<Vec<T>>(&document) {
        Ok(v) => v,
        Err(e) => {
            // Ignore corrupted documents instead of refusing to start.
            warn!("Stored {key} is malformed, starting empty: {e}");
            vec![]
        }
    }
}
