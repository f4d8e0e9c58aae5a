use std::{
    io::{self, Write},
    sync::Arc,
};

use anyhow::Result;
use clap::Parser;
use tokio_stream::{wrappers::WatchStream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{
    store::{entities::NewEntry, key_value::KeyValueStore, log_store::ActivityLogStore},
    timer::Timer,
    utils::{clock::Clock, shutdown::detect_shutdown, time::format_clock},
};

use super::{report::format_money, validation_error, DEFAULT_CURRENCY};

#[derive(Debug, Parser)]
pub struct TrackCommand {
    #[arg(help = "Name of the activity, e.g. \"UI Design\", \"Coding\", \"Meeting\"")]
    activity: String,
    #[arg(long = "rate", help = "Hourly rate. Replaces the stored rate of the activity")]
    hourly_rate: Option<f64>,
    #[arg(long, default_value = DEFAULT_CURRENCY, help = "Currency of the hourly rate")]
    currency: String,
}

/// Runs the timer for one activity until the user stops it, then logs the run.
pub async fn process_track_command(
    store: &mut ActivityLogStore<impl KeyValueStore>,
    clock: Arc<dyn Clock>,
    TrackCommand {
        activity,
        hourly_rate,
        currency,
    }: TrackCommand,
) -> Result<()> {
    let rate = store
        .begin_run(&activity, hourly_rate.map(|v| (v, currency.into())))
        .await
        .map_err(validation_error)?;

    let stop = CancellationToken::new();
    tokio::spawn(detect_shutdown(stop.clone()));
    wait_for_enter(stop.clone());

    let mut timer = Timer::new(clock);
    timer.start();
    println!("Tracking {activity}. Press Enter or Ctrl-C to stop.");

    render_until_stopped(&activity, &timer, &stop).await;

    let Some(run) = timer.stop() else {
        return Ok(());
    };
    let entry = store
        .append(NewEntry::new(activity, run).with_rate(rate.as_ref()))
        .await
        .map_err(validation_error)?;
    timer.reset();
    info!("Logged run {}", entry.id);

    match rate {
        Some(rate) => println!(
            "\nLogged {} of {} ({} at the current rate)",
            format_clock(entry.duration_seconds),
            entry.activity,
            format_money(rate.billable(entry.duration_seconds), &rate.currency)
        ),
        None => println!(
            "\nLogged {} of {}",
            format_clock(entry.duration_seconds),
            entry.activity
        ),
    }
    Ok(())
}

async fn render_until_stopped(activity: &str, timer: &Timer, stop: &CancellationToken) {
    let mut ticks = WatchStream::new(timer.subscribe());
    loop {
        tokio::select! {
            _ = stop.cancelled() => return,
            tick = ticks.next() => match tick {
                Some(seconds) => {
                    print!("\r{activity}  {}", format_clock(seconds));
                    if let Err(e) = io::stdout().flush() {
                        warn!("Failed to redraw the timer {e:?}");
                    }
                }
                None => return,
            },
        }
    }
}

/// Reading stdin blocks, so it happens on a plain thread that can't hold up runtime shutdown.
fn wait_for_enter(stop: CancellationToken) {
    std::thread::spawn(move || {
        let mut line = String::new();
        match io::stdin().read_line(&mut line) {
            Ok(0) | Err(_) => {}
            Ok(_) => stop.cancel(),
        }
    });
}
