use colored::Colorize;
use log::LevelFilter;
use middleware::logger::LoggerMiddleware;

pub mod middleware {
    pub mod logger;
}

pub const LOG_FILE: &str = "accounts.log";

/// Debug in development, info in production.
pub fn level_for_environment(is_production: bool) -> LevelFilter {
    if is_production {
        LevelFilter::Info
    } else {
        LevelFilter::Debug
    }
}

/// Installs the global logger: stdout plus [`LOG_FILE`].
pub fn setup(level: LevelFilter) -> Result<(), fern::InitError> {
    fern::Dispatch::new()
        .format(|out, message, record| {
            let level = match record.level() {
                log::Level::Error => record.level().to_string().red(),
                log::Level::Warn => record.level().to_string().yellow(),
                log::Level::Info => record.level().to_string().green(),
                log::Level::Debug => record.level().to_string().magenta(),
                log::Level::Trace => record.level().to_string().bright_black(),
            };
            out.finish(format_args!(
                "{} {} [{}] {}",
                chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ"),
                level,
                record.target(),
                message
            ))
        })
        .level(level)
        .level_for("hyper", LevelFilter::Off)
        .level_for("h2", LevelFilter::Off)
        .level_for("sqlx", LevelFilter::Warn)
        .level_for("actix_server", LevelFilter::Info)
        .chain(std::io::stdout())
        .chain(fern::log_file(LOG_FILE)?)
        .apply()?;
    Ok(())
}

pub fn middleware(console_logging_enabled: bool) -> LoggerMiddleware {
    LoggerMiddleware::new(console_logging_enabled)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn production_logs_less() {
        assert_eq!(level_for_environment(true), LevelFilter::Info);
        assert_eq!(level_for_environment(false), LevelFilter::Debug);
    }
}
