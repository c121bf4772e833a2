//! Tool catalogue: one `shell`-style tool per trust tier.

use serde_json::{Value, json};

use super::protocol::ToolDefinition;
use crate::policy::TrustTier;

pub const SERVER_NAME: &str = "safe-shell";

pub const INSTRUCTIONS: &str = "IMPORTANT: Always use the shell tool first. \
    Only use shell_slow if shell returns an error saying the command is not whitelisted.";

const SHELL_DESCRIPTION: &str = "Run a terminal command in the current directory. \
    The shell is not stateful and will not remember any previous commands. \
    When a command is run in the background ALWAYS suggest using shell commands to stop it; \
    NEVER suggest using Ctrl+C. When suggesting subsequent shell commands ALWAYS format them \
    in shell command blocks. Do NOT perform actions requiring special/admin privileges. \
    IMPORTANT: To edit files, use Edit/MultiEdit tools instead of bash commands (sed, awk, etc). \
    Choose terminal commands and scripts optimized for linux and x64 and shell /bin/bash.";

fn tier_suffix(tier: TrustTier) -> &'static str {
    match tier {
        TrustTier::Auto => {
            "Always use this first. Only runs whitelisted commands - if the command is not \
             allowed, returns an error with the list of allowed commands and instructions to \
             use shell_slow instead."
        }
        TrustTier::Manual => {
            "Runs any command but requires user approval. Never use this before trying shell first."
        }
    }
}

pub fn input_schema() -> Value {
    json!({
        "$schema": "http://json-schema.org/draft-07/schema#",
        "type": "object",
        "additionalProperties": false,
        "properties": {
            "command": {
                "type": "string",
                "description": "The command to run. This will be passed directly into the IDE shell."
            },
            "waitForCompletion": {
                "type": "boolean",
                "description": "Whether to wait for the command to complete before returning. \
                    Default is true. Set to false to run the command in the background. \
                    Set to true to run the command in the foreground and wait to collect the output."
            }
        },
        "required": ["command"]
    })
}

pub fn definition(tier: TrustTier) -> ToolDefinition {
    ToolDefinition {
        name: tier.tool_name(),
        description: format!("{SHELL_DESCRIPTION} {}", tier_suffix(tier)),
        input_schema: input_schema(),
    }
}
