pub mod decision;

pub use decision::{Classification, Denial, TrustTier};

use crate::config::PolicyConfig;

/// Exact-match allow-list for the [`TrustTier::Auto`] tier.
///
/// Entries are whole command lines compared byte for byte. Nothing is
/// trimmed, tokenized or globbed: `npm run lint ` (trailing space) is a
/// different command from `npm run lint`.
#[derive(Debug, Clone)]
pub struct CommandPolicy {
    allowed: Vec<String>,
}

impl CommandPolicy {
    /// Build a policy from entries in declaration order.
    /// Duplicates are dropped so the denial listing stays clean.
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut allowed: Vec<String> = Vec::new();
        for entry in entries {
            let entry = entry.into();
            if !allowed.contains(&entry) {
                allowed.push(entry);
            }
        }
        Self { allowed }
    }

    pub fn from_config(config: &PolicyConfig) -> Self {
        Self::new(config.allow.iter().cloned())
    }

    /// Allow-list entries in declaration order.
    pub fn allowed(&self) -> &[String] {
        &self.allowed
    }

    pub fn contains(&self, command: &str) -> bool {
        self.allowed.iter().any(|entry| entry == command)
    }

    /// Decide whether `command` may run under `tier`.
    pub fn classify(&self, tier: TrustTier, command: &str) -> Classification {
        match tier {
            TrustTier::Manual => Classification::Allowed,
            TrustTier::Auto if self.contains(command) => Classification::Allowed,
            TrustTier::Auto => Classification::Denied(Denial {
                command: command.to_string(),
                allowed: self.allowed.clone(),
            }),
        }
    }
}
