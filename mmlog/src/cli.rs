use std::{fmt, path::PathBuf};

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone};
use clap::{Parser, ValueEnum};
use log::LevelFilter;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Name of the channel to dump (the URL name, e.g. "town-square")
    pub channel: String,

    /// Only fetch posts created or modified after this date/time
    /// (e.g. "2024-05-01", "2024-05-01 13:30", RFC 3339)
    #[arg(long, value_name = "DATETIME", value_parser = parse_since)]
    pub since: Option<DateTime<Local>>,

    /// Number of most recent posts to fetch when --since is not given
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=200))]
    pub limit: Option<u32>,

    /// Show full names instead of usernames
    #[arg(long)]
    pub full_name: bool,

    /// Mattermost server URL
    #[arg(long, env = "MATTERMOST_URL")]
    pub mm_url: Option<String>,

    /// Mattermost access token
    #[arg(long, env = "MATTERMOST_TOKEN", hide_env_values = true)]
    pub mm_token: Option<String>,

    /// Name of the team the channel belongs to
    #[arg(long, env = "MATTERMOST_TEAM")]
    pub team: Option<String>,

    /// Configuration file (defaults to $XDG_CONFIG_HOME/mmlog/config.toml)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log verbosity
    #[arg(short, long, value_name = "LEVEL", default_value_t = LogLevel::Warn)]
    pub log_level: LogLevel,
}

const DATE_TIME_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

/// Parses the `--since` bound, interpreting zone-less inputs in local time.
pub fn parse_since(input: &str) -> Result<DateTime<Local>, String> {
    let input = input.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Ok(dt.with_timezone(&Local));
    }

    let naive = DATE_TIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(input, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(input, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
        .ok_or_else(|| format!("invalid date/time `{input}`"))?;

    Local
        .from_local_datetime(&naive)
        .earliest()
        .ok_or_else(|| format!("`{input}` does not exist in the local time zone"))
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Off,
}

impl From<LogLevel> for LevelFilter {
    fn from(log_level: LogLevel) -> Self {
        match log_level {
            LogLevel::Trace => LevelFilter::Trace,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Off => LevelFilter::Off,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "trace"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
            LogLevel::Off => write!(f, "off"),
        }
    }
}
