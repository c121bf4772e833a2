//! safe-shell: an MCP server that runs shell commands behind a trust decision.
//!
//! Two tools are exposed. `shell` runs a command immediately, but only when
//! it is byte-for-byte one of the configured allow-list entries; anything
//! else comes back as an error listing what is allowed. `shell_slow` runs any
//! command and relies on the client to get user approval first.
//!
//! # Architecture
//!
//! - **[`policy`]** — Exact-match allow-list and trust tiers.
//! - **[`exec`]** — Child-process runner: bounded capture or detached spawn.
//! - **[`gateway`]** — One invocation: classify, execute, render a result.
//! - **[`server`]** — JSON-RPC/MCP stdio transport and tool catalogue.
//! - **[`config`]** — Configuration loading: embedded defaults + user overlay merge.
//! - **[`logging`]** — File logger setup and decision records.

/// Configuration types, loading, and overlay merge logic.
pub mod config;
/// Shell command execution.
pub mod exec;
/// Policy check plus execution for a single tool call.
pub mod gateway;
/// File-based logging.
pub mod logging;
/// Allow-list policy engine.
pub mod policy;
/// MCP stdio server.
pub mod server;

use policy::{Classification, CommandPolicy, TrustTier};

/// Classify a command for the `shell` tool against the default allow-list.
///
/// This is the main entry point for tests and simple usage.
/// The server builds its policy from the loaded configuration instead.
pub fn classify(command: &str) -> Classification {
    let config = config::Config::default_config();
    CommandPolicy::from_config(&config.policy).classify(TrustTier::Auto, command)
}
