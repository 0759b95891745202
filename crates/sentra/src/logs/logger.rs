use chrono::Utc;
use env_logger::Builder;
use log::Level;
use std::env;
use std::io::Write;

/// Initializes the global logger.
///
/// Format: `2026-02-14T09:31:05.112Z INFO  sentra::services::pipeline > msg`.
/// Level selection follows `RUST_LOG` (default `info`); `NO_COLOR` disables
/// ANSI coloring of the level column.
pub fn configure_logger() {
    let no_color = env::var("NO_COLOR").is_ok();

    Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(move |buf, record| {
            let level = record.level();
            let level_padded = format!("{:<5}", level.to_string());
            let level_column = if no_color {
                level_padded
            } else {
                let color = match level {
                    Level::Error => "\x1b[31m",
                    Level::Warn => "\x1b[33m",
                    Level::Info => "\x1b[32m",
                    Level::Debug => "\x1b[34m",
                    Level::Trace => "\x1b[35m",
                };
                format!("{}{}\x1b[0m", color, level_padded)
            };

            writeln!(
                buf,
                "{} {} {} > {}",
                Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ"),
                level_column,
                record.target(),
                record.args(),
            )
        })
        .init();
}
