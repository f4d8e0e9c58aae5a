pub mod confirm;
pub mod report;
pub mod track;

use std::{path::PathBuf, sync::Arc};

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use confirm::{AssumeYes, TerminalConfirmation};
use report::{render_log, render_summary};
use track::{process_track_command, TrackCommand};
use tracing::level_filters::LevelFilter;

use crate::{
    error::TrackerError,
    store::{
        entities::RateEntry,
        key_value::{FileKeyValueStore, KeyValueStore},
        log_store::ActivityLogStore,
    },
    utils::{
        clock::DefaultClock,
        dir::application_path,
        logging::{enable_logging, LOG_PREFIX},
    },
};

pub const DEFAULT_CURRENCY: &str = "USD";
const DEFAULT_TREND_DAYS: usize = 14;

#[derive(Parser, Debug)]
#[command(name = "worklog", version, long_about = None)]
#[command(about = "Stopwatch for tracking and billing time spent on activities", long_about = None)]
struct Args {
    #[command(subcommand)]
    commands: Commands,
    #[arg(
        long,
        global = true,
        env = "WORKLOG_DIR",
        help = "Application directory. By default uses $XDG_STATE_HOME/worklog or $HOME/.local/state/worklog"
    )]
    dir: Option<PathBuf>,
    #[arg(long, global = true, help = "Print logs to the console")]
    log: bool,
    #[arg(long = "log-filter", global = true, help = "Log level, overrides RUST_LOG")]
    log_filter: Option<LevelFilter>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(about = "Start timing an activity. Stop with Enter or Ctrl-C")]
    Track {
        #[command(flatten)]
        command: TrackCommand,
    },
    #[command(about = "Set the hourly rate of an activity")]
    Rate {
        activity: String,
        hourly_rate: f64,
        #[arg(long, default_value = DEFAULT_CURRENCY)]
        currency: String,
    },
    #[command(about = "List every logged run")]
    Log {},
    #[command(about = "Show totals per activity and per day")]
    Summary {
        #[arg(long, default_value_t = DEFAULT_TREND_DAYS, help = "Days shown in the trend column")]
        trend_days: usize,
    },
    #[command(about = "Delete every logged run. Rates are kept")]
    Clear {
        #[arg(short, long, help = "Skip the confirmation prompt")]
        yes: bool,
    },
}

pub async fn run_cli() -> Result<()> {
    let args = Args::parse();

    let app_dir = application_path(args.dir)?;
    let log_level = if args.log && args.log_filter.is_none() {
        Some(LevelFilter::DEBUG)
    } else {
        args.log_filter
    };
    enable_logging(LOG_PREFIX, &app_dir.join("logs"), log_level, args.log)?;

    let storage = FileKeyValueStore::new(app_dir.join("store"))?;
    let mut store = ActivityLogStore::load(storage).await;

    match args.commands {
        Commands::Track { command } => {
            process_track_command(&mut store, Arc::new(DefaultClock), command).await
        }
        Commands::Rate {
            activity,
            hourly_rate,
            currency,
        } => {
            store
                .upsert_rate(RateEntry::new(activity, hourly_rate, currency))
                .await
                .map_err(validation_error)?;
            Ok(())
        }
        Commands::Log {} => {
            print!("{}", render_log(store.entries()));
            Ok(())
        }
        Commands::Summary { trend_days } => {
            print!("{}", render_summary(&store.summaries(), trend_days));
            Ok(())
        }
        Commands::Clear { yes } => {
            clear(&mut store, yes).await;
            Ok(())
        }
    }
}

async fn clear(store: &mut ActivityLogStore<impl KeyValueStore>, yes: bool) {
    let cleared = if yes {
        store.clear(&mut AssumeYes).await
    } else {
        store.clear(&mut TerminalConfirmation).await
    };
    if cleared {
        println!("Activity log cleared");
    } else {
        println!("Nothing was cleared");
    }
}

/// Reports rejected input the same way clap reports malformed arguments.
pub(crate) fn validation_error(error: TrackerError) -> anyhow::Error {
    Args::command()
        .error(clap::error::ErrorKind::ValueValidation, error.to_string())
        .into()
}
