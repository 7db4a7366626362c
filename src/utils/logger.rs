use colored::Colorize;
use env_logger::Builder;
use log::{Level, LevelFilter};
use std::io::Write;

/// Logging setup for host processes and tests: colored single-line records,
/// warnings only from dependencies, debug-level SQL from this crate when
/// `verbose`. Safe to call more than once; later calls are no-ops.
pub fn setup_logging(verbose: bool) {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    let _ = Builder::from_default_env()
        .filter_level(LevelFilter::Warn)
        .filter_module(env!("CARGO_PKG_NAME"), level)
        .format(|buf, record| {
            let name = env!("CARGO_PKG_NAME");
            let line = match record.level() {
                Level::Error | Level::Warn => {
                    let level_str = match record.level() {
                        Level::Warn => "WARN".yellow(),
                        Level::Error => "ERROR".red(),
                        _ => "".normal(),
                    };
                    format!(
                        "[{} {} {}] {}",
                        name.cyan(),
                        level_str,
                        record.target(),
                        record.args()
                    )
                }
                _ => format!("[{}] {}", name.cyan(), record.args()),
            };
            writeln!(buf, "{line}")
        })
        .try_init();
}
