use std::sync::Arc;

use anyhow::Result;
use tempfile::tempdir;
use tokio::sync::watch;
use worklog::{
    aggregate::aggregate,
    store::{
        entities::{NewEntry, RateEntry},
        key_value::FileKeyValueStore,
        log_store::{ActivityLogStore, Confirmation},
    },
    timer::Timer,
    utils::clock::DefaultClock,
};

struct Answer(bool);

impl Confirmation for Answer {
    fn confirm(&mut self, _prompt: &str) -> bool {
        self.0
    }
}

/// Paused time auto-advances to the next tick while the test waits.
async fn wait_for(counter: &mut watch::Receiver<u64>, target: u64) {
    while *counter.borrow_and_update() < target {
        counter.changed().await.expect("timer alive");
    }
}

#[tokio::test(start_paused = true)]
async fn timed_runs_are_logged_and_summarized() -> Result<()> {
    let dir = tempdir()?;
    let mut store = ActivityLogStore::load(FileKeyValueStore::new(dir.path().join("store"))?).await;
    let mut summaries = store.subscribe();

    let rate = store
        .begin_run("Coding", Some((36., "USD".into())))
        .await?;

    let mut timer = Timer::new(Arc::new(DefaultClock));
    let mut counter = timer.subscribe();
    timer.start();
    wait_for(&mut counter, 1800).await;
    let run = timer.stop().expect("timer was running");
    assert_eq!(run.elapsed_seconds, 1800);

    let entry = store
        .append(NewEntry::new("Coding", run).with_rate(rate.as_ref()))
        .await?;
    timer.reset();
    assert_eq!(timer.elapsed(), 0);
    assert_eq!(entry.duration_seconds, 1800);
    assert_eq!(entry.hourly_rate, Some(36.));

    assert!(summaries.has_changed()?);
    let current = summaries.borrow_and_update().clone();
    assert_eq!(current.activities[0].total_seconds, 1800);
    assert_eq!(current.activities[0].total_billable, Some(18.));
    assert_eq!(current.daily.len(), 1);

    // Nothing to stop once idle, the log stays as it is.
    assert!(timer.stop().is_none());
    assert_eq!(store.entries().len(), 1);

    let mut reloaded =
        ActivityLogStore::load(FileKeyValueStore::new(dir.path().join("store"))?).await;
    assert_eq!(reloaded.entries(), store.entries());
    assert_eq!(reloaded.rates(), &[RateEntry::new("Coding", 36., "USD")]);
    assert_eq!(reloaded.summaries(), aggregate(store.entries(), store.rates()));

    assert!(!reloaded.clear(&mut Answer(false)).await);
    assert_eq!(reloaded.entries().len(), 1);

    assert!(reloaded.clear(&mut Answer(true)).await);
    let reopened =
        ActivityLogStore::load(FileKeyValueStore::new(dir.path().join("store"))?).await;
    assert!(reopened.entries().is_empty());
    assert_eq!(reopened.rates().len(), 1);
    Ok(())
}
