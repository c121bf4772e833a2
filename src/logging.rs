use std::fs::OpenOptions;
use std::path::Path;
use std::str::FromStr;

use log::LevelFilter;
use simplelog::{ConfigBuilder, WriteLogger};

use crate::config::Config;
use crate::policy::{Classification, TrustTier};

/// Longest command prefix written to the log.
const MAX_LOGGED_COMMAND: usize = 200;

/// Install a file logger from `settings.log_file` / `settings.log_level`.
///
/// Best-effort: stdout carries the protocol, so if the file cannot be opened
/// logging stays off and the server runs anyway.
pub fn init(config: &Config) {
    let Some(path) = config.log_path() else {
        return;
    };
    let level = LevelFilter::from_str(&config.settings.log_level).unwrap_or(LevelFilter::Info);
    if let Err(e) = init_file(&path, level) {
        eprintln!("safe-shell: logging disabled ({}): {e}", path.display());
    }
}

fn init_file(path: &Path, level: LevelFilter) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let log_config = ConfigBuilder::new()
        .set_time_format_rfc3339()
        .set_target_level(LevelFilter::Off)
        .build();
    WriteLogger::init(level, log_config, file)?;
    Ok(())
}

/// Log one policy decision as a single tab-separated line.
pub fn log_decision(tier: TrustTier, classification: &Classification, command: &str) {
    log::info!(
        "{tier}\t{decision}\t{cmd}",
        tier = tier.as_str(),
        decision = classification.label(),
        cmd = one_line(command),
    );
}

/// Flatten line breaks, then cap length, so each record stays on one line.
fn one_line(command: &str) -> String {
    command
        .replace("\r\n", "; ")
        .replace(['\n', '\r'], "; ")
        .chars()
        .take(MAX_LOGGED_COMMAND)
        .collect()
}
