//! safe-shell: MCP stdio server.
//!
//! Reads JSON-RPC requests from stdin, one per line, and writes responses to
//! stdout. Logs go to the file named in the configuration, never to stdout.

use std::path::PathBuf;
use std::sync::Arc;

use safe_shell::config::Config;
use safe_shell::logging;
use safe_shell::server::{self, Server};

const USAGE: &str = "usage: safe-shell [--config <path>] [--version]";

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Option<PathBuf>, String> {
    let mut config_path = None;
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                let path = args.next().ok_or("--config requires a path")?;
                config_path = Some(PathBuf::from(path));
            }
            "--version" => {
                println!("safe-shell {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "-h" | "--help" => {
                println!("{USAGE}");
                std::process::exit(0);
            }
            other => return Err(format!("unknown argument: {other}")),
        }
    }
    Ok(config_path)
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let config_path = match parse_args(std::env::args().skip(1)) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("safe-shell: {e}\n{USAGE}");
            std::process::exit(2);
        }
    };

    let config = Config::load(config_path.as_deref());
    logging::init(&config);
    log::info!(
        "starting: {} allowed commands, manual tier {}",
        config.policy.allow.len(),
        if config.settings.manual_tier { "on" } else { "off" },
    );

    let server = Arc::new(Server::from_config(&config));
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let result = server::serve(server, stdin, tokio::io::stdout()).await;
    if let Err(ref e) = result {
        log::error!("transport failed: {e}");
    }
    result
}
