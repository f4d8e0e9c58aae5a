//! Stopwatch for a single in-progress run.
//!
//! The timer counts whole-second ticks produced by a spawned task. The tick count, not the
//! difference between the wall-clock timestamps, is the duration of a run.

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use tokio::{sync::watch, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use crate::utils::clock::Clock;

pub const TICK_PERIOD: Duration = Duration::from_secs(1);

/// Interval produced by [Timer::stop].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletedRun {
    pub elapsed_seconds: u64,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    Idle,
    Running,
}

/// Handle to the periodic tick task. Dropping it cancels the task, so every path that
/// discards the handle also stops the ticking.
struct TickTask {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl Drop for TickTask {
    fn drop(&mut self) {
        self.token.cancel();
        self.handle.abort();
    }
}

pub struct Timer {
    clock: Arc<dyn Clock>,
    tick_period: Duration,
    elapsed: Arc<watch::Sender<u64>>,
    started_at: Option<DateTime<Utc>>,
    ticker: Option<TickTask>,
}

impl Timer {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        let (elapsed, _) = watch::channel(0);
        Self {
            clock,
            tick_period: TICK_PERIOD,
            elapsed: Arc::new(elapsed),
            started_at: None,
            ticker: None,
        }
    }

    pub fn state(&self) -> TimerState {
        if self.ticker.is_some() {
            TimerState::Running
        } else {
            TimerState::Idle
        }
    }

    pub fn is_running(&self) -> bool {
        self.state() == TimerState::Running
    }

    /// Seconds counted in the current run. Stays visible after [Timer::stop] until the next
    /// [Timer::start] or [Timer::reset].
    pub fn elapsed(&self) -> u64 {
        *self.elapsed.borrow()
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    /// Observes the counter. Every tick publishes a new value.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.elapsed.subscribe()
    }

    /// Starts a new run counting from zero. Does nothing while already running. Must be
    /// called from within a tokio runtime.
    pub fn start(&mut self) {
        if self.is_running() {
            debug!("Timer already running, ignoring start");
            return;
        }

        let started_at = self.clock.time();
        self.started_at = Some(started_at);
        self.elapsed.send_replace(0);

        let token = CancellationToken::new();
        let handle = tokio::spawn(tick_loop(
            self.clock.clone(),
            self.tick_period,
            self.elapsed.clone(),
            token.clone(),
        ));
        self.ticker = Some(TickTask { token, handle });
        info!("Timer started at {started_at}");
    }

    /// Stops ticking and returns the completed interval. Returns [None] when idle.
    pub fn stop(&mut self) -> Option<CompletedRun> {
        let ticker = self.ticker.take()?;
        drop(ticker);

        let ended_at = self.clock.time();
        let started_at = self.started_at.unwrap_or(ended_at);
        let run = CompletedRun {
            elapsed_seconds: self.elapsed(),
            started_at,
            ended_at: ended_at.max(started_at),
        };
        info!("Timer stopped after {} seconds", run.elapsed_seconds);
        Some(run)
    }

    /// Returns to idle with a zeroed counter, cancelling the tick task if one is active.
    pub fn reset(&mut self) {
        self.ticker = None;
        self.started_at = None;
        self.elapsed.send_replace(0);
        debug!("Timer reset");
    }
}

async fn tick_loop(
    clock: Arc<dyn Clock>,
    period: Duration,
    elapsed: Arc<watch::Sender<u64>>,
    token: CancellationToken,
) {
    let mut next_tick = clock.instant();
    loop {
        next_tick += period;

        tokio::select! {
            biased;
            _ = token.cancelled() => return,
            _ = clock.sleep_until(next_tick) => (),
        }

        // The check happens under the channel's write lock, so a tick can't land after
        // stop or reset observed the cancellation.
        elapsed.send_if_modified(|value| {
            if token.is_cancelled() {
                false
            } else {
                *value += 1;
                true
            }
        });
        trace!("Tick {}", *elapsed.borrow());
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use async_trait::async_trait;
    use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
    use tokio::{sync::watch, time::Instant};

    use crate::utils::{
        clock::{Clock, TestClock},
        logging::TEST_LOGGING,
    };

    use super::{Timer, TimerState};

    const TEST_START_DATE: NaiveDateTime = NaiveDateTime::new(
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
    );

    fn test_timer() -> Timer {
        Timer::new(Arc::new(TestClock::new(
            Utc.from_utc_datetime(&TEST_START_DATE),
        )))
    }

    /// Wall clock that moves an hour back on every reading after the first.
    struct SteppingBackClock {
        start_time: DateTime<Utc>,
        readings: std::sync::atomic::AtomicI64,
    }

    impl SteppingBackClock {
        fn new(start_time: DateTime<Utc>) -> Self {
            Self {
                start_time,
                readings: Default::default(),
            }
        }
    }

    #[async_trait]
    impl Clock for SteppingBackClock {
        fn time(&self) -> DateTime<Utc> {
            let n = self
                .readings
                .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            self.start_time - chrono::Duration::hours(n)
        }

        fn instant(&self) -> Instant {
            Instant::now()
        }

        async fn sleep_until(&self, instant: Instant) {
            tokio::time::sleep_until(instant).await;
        }
    }

    /// Paused time auto-advances to the next tick whenever the test is waiting.
    async fn wait_for(counter: &mut watch::Receiver<u64>, target: u64) {
        while *counter.borrow_and_update() < target {
            counter.changed().await.expect("timer alive");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn counts_whole_seconds_between_start_and_stop() {
        *TEST_LOGGING;
        let mut timer = test_timer();
        let mut counter = timer.subscribe();
        timer.start();
        wait_for(&mut counter, 5).await;
        tokio::time::sleep(Duration::from_millis(500)).await;

        let run = timer.stop().expect("timer was running");
        assert_eq!(run.elapsed_seconds, 5);
        assert_eq!(run.started_at, Utc.from_utc_datetime(&TEST_START_DATE));
        assert_eq!(
            run.ended_at,
            run.started_at + chrono::Duration::milliseconds(5500)
        );
        assert_eq!(timer.state(), TimerState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_keeps_counter_until_reset() {
        let mut timer = test_timer();
        let mut counter = timer.subscribe();
        timer.start();
        wait_for(&mut counter, 3).await;
        timer.stop();

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(timer.elapsed(), 3);

        timer.reset();
        assert_eq!(timer.elapsed(), 0);
        assert!(timer.started_at().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn stop_without_start_is_noop() {
        let mut timer = test_timer();
        assert!(timer.stop().is_none());
        assert_eq!(timer.elapsed(), 0);
        assert_eq!(timer.state(), TimerState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn start_while_running_is_idempotent() {
        let mut timer = test_timer();
        let mut counter = timer.subscribe();
        timer.start();
        wait_for(&mut counter, 2).await;
        let started_at = timer.started_at();
        timer.start();
        wait_for(&mut counter, 4).await;

        assert_eq!(timer.started_at(), started_at);
        let run = timer.stop().expect("timer was running");
        assert_eq!(run.elapsed_seconds, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn reset_while_running_cancels_ticks() {
        let mut timer = test_timer();
        let mut counter = timer.subscribe();
        timer.start();
        wait_for(&mut counter, 4).await;

        timer.reset();
        assert_eq!(timer.state(), TimerState::Idle);
        assert_eq!(timer.elapsed(), 0);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(timer.elapsed(), 0);
        assert!(timer.stop().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn consecutive_runs_count_from_reset() {
        let mut timer = test_timer();
        let mut counter = timer.subscribe();

        timer.start();
        wait_for(&mut counter, 2).await;
        let first = timer.stop().expect("first run");
        timer.reset();

        timer.start();
        wait_for(&mut counter, 7).await;
        let second = timer.stop().expect("second run");

        assert_eq!(first.elapsed_seconds, 2);
        assert_eq!(second.elapsed_seconds, 7);
        assert!(second.started_at > first.started_at);
    }

    #[tokio::test(start_paused = true)]
    async fn restart_without_reset_counts_only_new_ticks() {
        let mut timer = test_timer();
        let mut counter = timer.subscribe();

        timer.start();
        wait_for(&mut counter, 3).await;
        let first = timer.stop().expect("first run");

        timer.start();
        assert_eq!(timer.elapsed(), 0);
        wait_for(&mut counter, 2).await;
        let second = timer.stop().expect("second run");

        assert_eq!(first.elapsed_seconds, 3);
        assert_eq!(second.elapsed_seconds, 2);
        assert!(second.started_at >= first.ended_at);
    }

    #[tokio::test(start_paused = true)]
    async fn end_never_precedes_start_when_wall_clock_steps_back() {
        let clock = Arc::new(SteppingBackClock::new(Utc.from_utc_datetime(&TEST_START_DATE)));
        let mut timer = Timer::new(clock);
        let mut counter = timer.subscribe();
        timer.start();
        wait_for(&mut counter, 1).await;

        let run = timer.stop().expect("timer was running");
        assert_eq!(run.elapsed_seconds, 1);
        assert_eq!(run.ended_at, run.started_at);
    }

    #[tokio::test(start_paused = true)]
    async fn subscribers_see_every_tick() {
        let mut timer = test_timer();
        let mut counter = timer.subscribe();
        timer.start();

        let mut seen = vec![];
        for _ in 0..3 {
            counter.changed().await.expect("timer alive");
            seen.push(*counter.borrow_and_update());
        }
        assert_eq!(seen, [1, 2, 3]);
        timer.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_timer_stops_tick_task() {
        let mut timer = test_timer();
        let mut counter = timer.subscribe();
        timer.start();
        wait_for(&mut counter, 2).await;
        drop(timer);

        // Resolves with an error once the tick task released the last sender.
        while counter.changed().await.is_ok() {}
        assert_eq!(*counter.borrow(), 2);
    }
}
