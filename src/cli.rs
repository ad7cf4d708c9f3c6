//! Command line definitions for the schedule board.

use std::path::PathBuf;
use std::time::Duration;

use chrono::NaiveDate;
use clap::{ArgAction, Parser, Subcommand, ValueEnum};

use crate::config::{AppConfig, BackendSource, DEFAULT_BACKEND_URL, DEFAULT_PORT};
use crate::logging::LogFormat;

#[derive(Parser, Debug)]
#[command(
    name = "schedule-board",
    version,
    about = "Teacher-by-timeslot lesson board for a selected day"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Base URL of the collection backend.
    #[arg(
        long = "backend-url",
        env = "SCHEDULE_BACKEND_URL",
        default_value = DEFAULT_BACKEND_URL,
        global = true
    )]
    pub backend_url: String,

    /// Serve records from a JSON fixture instead of the backend.
    #[arg(long, value_name = "PATH", global = true)]
    pub fixture: Option<PathBuf>,

    /// Quiet period before a reload runs, in milliseconds.
    #[arg(long = "debounce-ms", env = "SCHEDULE_DEBOUNCE_MS", default_value_t = 250, global = true)]
    pub debounce_ms: u64,

    /// Lessons fetched per collection and day.
    #[arg(long = "page-size", default_value_t = 200, global = true)]
    pub page_size: u32,

    /// More log output (-v debug, -vv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log errors.
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format.
    #[arg(long = "log-format", value_enum, default_value = "pretty", global = true)]
    pub log_format: LogFormatArg,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Load one day and print the board.
    Show {
        /// Day to show (YYYY-MM-DD), defaults to today.
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Also write the board to a CSV file.
        #[arg(long, value_name = "PATH")]
        csv: Option<PathBuf>,
    },

    /// Print the board and reprint it whenever lessons change. Ctrl-C stops.
    Watch {
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Serve the live board over HTTP.
    Web {
        #[arg(long, default_value_t = DEFAULT_PORT)]
        port: u16,

        #[arg(long)]
        date: Option<NaiveDate>,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Pretty => LogFormat::Pretty,
            LogFormatArg::Compact => LogFormat::Compact,
            LogFormatArg::Json => LogFormat::Json,
        }
    }
}

impl Cli {
    pub fn app_config(&self) -> AppConfig {
        let backend = match &self.fixture {
            Some(path) => BackendSource::Fixture(path.clone()),
            None => BackendSource::Remote(self.backend_url.clone()),
        };
        let (port, start_date) = match &self.command {
            Command::Show { date, .. } | Command::Watch { date } => (DEFAULT_PORT, *date),
            Command::Web { port, date } => (*port, *date),
        };
        AppConfig {
            backend,
            debounce: Duration::from_millis(self.debounce_ms),
            page_size: self.page_size,
            port,
            start_date,
        }
    }
}
