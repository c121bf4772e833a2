use std::fmt;

/// Approval level an invocation arrives under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrustTier {
    /// Runs immediately, but only commands on the allow-list.
    Auto,
    /// Runs anything; the client obtains user approval before calling.
    Manual,
}

impl TrustTier {
    pub fn as_str(self) -> &'static str {
        match self {
            TrustTier::Auto => "auto",
            TrustTier::Manual => "manual",
        }
    }

    /// The tool name this tier is exposed under.
    pub fn tool_name(self) -> &'static str {
        match self {
            TrustTier::Auto => "shell",
            TrustTier::Manual => "shell_slow",
        }
    }

    pub fn from_tool_name(name: &str) -> Option<Self> {
        match name {
            "shell" => Some(TrustTier::Auto),
            "shell_slow" => Some(TrustTier::Manual),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Allowed,
    Denied(Denial),
}

impl Classification {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Classification::Allowed)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Classification::Allowed => "ALLOW",
            Classification::Denied(_) => "DENY",
        }
    }
}

/// A rejected command together with everything the caller may run instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Denial {
    pub command: String,
    /// Allow-list entries in declaration order.
    pub allowed: Vec<String>,
}

impl fmt::Display for Denial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Command not in whitelist: {}", self.command)?;
        writeln!(f)?;
        writeln!(f, "Allowed commands:")?;
        for entry in &self.allowed {
            writeln!(f, "  - {entry}")?;
        }
        writeln!(f)?;
        write!(
            f,
            "Use {} for other commands (requires user approval).",
            TrustTier::Manual.tool_name()
        )
    }
}
