use log::LevelFilter;
use strum_macros::{Display, EnumString};

/// Verbosity accepted by ``setup_logger``
#[derive(Clone, Copy, Debug, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum LogLevel {
    Off,
    Error,
    #[strum(serialize = "warn", serialize = "warning")]
    Warn,
    Info,
    Debug,
    Trace,
}
impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => LevelFilter::Off,
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}
/// Installs the global logger. Call only once per process.
/// ``RUST_LOG`` still wins over ``level`` when it is set; ``module_filter``
/// restricts the default level to one crate (for example ``retarget_core``).
pub fn setup_logger(level: LogLevel, module_filter: Option<&str>) {
    let mut builder = env_logger::Builder::new();
    match module_filter {
        Some(module) => {
            builder.filter_level(LevelFilter::Warn);
            builder.filter_module(module, level.into());
        }
        None => {
            builder.filter_level(level.into());
        }
    }
    builder.parse_default_env();
    builder.format_timestamp_millis();
    // a second init (tests, embedding) keeps the first logger
    let _ = builder.try_init();
}
