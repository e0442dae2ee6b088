use std::{fmt, fs, str::FromStr};

use anyhow::Context;
use fern::colors::{Color, ColoredLevelConfig};
use log::LevelFilter;
use serde::{Deserialize, Serialize};

pub fn default_logs_datetime_format() -> String {
    String::from("[%Y-%m-%d] (%H:%M:%S%.3f)")
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(value: LogLevel) -> Self {
        match value {
            LogLevel::Off => LevelFilter::Off,
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            LogLevel::Off => "off",
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        };
        write!(f, "{}", value)
    }
}

impl FromStr for LogLevel {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_lowercase().as_str() {
            "off" => LogLevel::Off,
            "error" => LogLevel::Error,
            "warn" => LogLevel::Warn,
            "info" => LogLevel::Info,
            "debug" => LogLevel::Debug,
            "trace" => LogLevel::Trace,
            _ => return Err("Invalid log level"),
        })
    }
}

/// Options of the global logger
#[derive(Debug, Clone)]
pub struct LoggerOptions<'a> {
    pub level: LogLevel,
    pub file_level: Option<LogLevel>,
    pub logs_path: &'a str,
    pub filename_log: &'a str,
    pub disable_file_logging: bool,
    pub disable_file_log_date_based: bool,
    pub disable_log_color: bool,
    pub datetime_format: &'a str,
}

/// Install the global logger: console output, plus a log file unless disabled.
/// File names are prefixed with the current date unless date based naming is disabled.
pub fn setup_logger(options: LoggerOptions<'_>) -> anyhow::Result<()> {
    let colors = ColoredLevelConfig::new()
        .error(Color::Red)
        .warn(Color::Yellow)
        .info(Color::Green)
        .debug(Color::Cyan)
        .trace(Color::Magenta);

    let datetime_format = options.datetime_format.to_owned();
    let disable_log_color = options.disable_log_color;
    let console = fern::Dispatch::new()
        .format(move |out, message, record| {
            let time = chrono::Local::now().format(&datetime_format);
            if disable_log_color {
                out.finish(format_args!(
                    "{} {} [{}] {}",
                    time,
                    record.level(),
                    record.target(),
                    message
                ))
            } else {
                out.finish(format_args!(
                    "{} {} [{}] {}",
                    time,
                    colors.color(record.level()),
                    record.target(),
                    message
                ))
            }
        })
        .level(options.level.into())
        .chain(std::io::stdout());

    let mut dispatch = fern::Dispatch::new().chain(console);

    if !options.disable_file_logging {
        fs::create_dir_all(options.logs_path).context("Error while creating logs directory")?;

        let datetime_format = options.datetime_format.to_owned();
        let file = fern::Dispatch::new()
            .format(move |out, message, record| {
                out.finish(format_args!(
                    "{} {} [{}] {}",
                    chrono::Local::now().format(&datetime_format),
                    record.level(),
                    record.target(),
                    message
                ))
            })
            .level(options.file_level.unwrap_or(options.level).into());

        let file = if options.disable_file_log_date_based {
            let path = format!("{}{}", options.logs_path, options.filename_log);
            file.chain(fern::log_file(path).context("Error while opening log file")?)
        } else {
            file.chain(fern::DateBased::new(
                options.logs_path,
                format!("%Y-%m-%d.{}", options.filename_log),
            ))
        };

        dispatch = dispatch.chain(file);
    }

    dispatch
        .apply()
        .context("Error while installing the global logger")?;

    Ok(())
}
