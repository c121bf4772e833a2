//! One invocation end to end: classify, execute, render.

use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::exec::Runner;
use crate::logging;
use crate::policy::{Classification, CommandPolicy, TrustTier};

fn default_wait() -> bool {
    true
}

/// Tool arguments for `shell` and `shell_slow`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ExecutionRequest {
    pub command: String,
    #[serde(default = "default_wait")]
    pub wait_for_completion: bool,
}

impl ExecutionRequest {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            wait_for_completion: true,
        }
    }

    pub fn detached(mut self) -> Self {
        self.wait_for_completion = false;
        self
    }
}

/// Text handed back to the agent, flagged when it describes a failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    pub text: String,
    pub is_error: bool,
}

impl ExecutionResult {
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: false,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: true,
        }
    }
}

/// Policy engine and runner bound together. Immutable after construction.
#[derive(Debug, Clone)]
pub struct Gateway {
    policy: CommandPolicy,
    runner: Runner,
}

impl Gateway {
    pub fn new(policy: CommandPolicy, runner: Runner) -> Self {
        Self { policy, runner }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            CommandPolicy::from_config(&config.policy),
            Runner::from_settings(&config.settings),
        )
    }

    pub fn policy(&self) -> &CommandPolicy {
        &self.policy
    }

    /// Handle one tool invocation. Never fails: every problem becomes an
    /// error result the agent can read.
    pub async fn invoke(&self, tier: TrustTier, request: &ExecutionRequest) -> ExecutionResult {
        let classification = self.policy.classify(tier, &request.command);
        logging::log_decision(tier, &classification, &request.command);

        if let Classification::Denied(denial) = classification {
            return ExecutionResult::error(denial.to_string());
        }

        match self
            .runner
            .execute(&request.command, request.wait_for_completion)
            .await
        {
            Ok(outcome) => ExecutionResult::success(outcome.into_text()),
            Err(e) => {
                log::warn!("execution failed: {e}");
                ExecutionResult::error(e.to_string())
            }
        }
    }
}
