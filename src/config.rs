use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Embedded default configuration.
const DEFAULT_CONFIG: &str = include_str!("../config.default.toml");

/// Location of the user overlay, relative to `$HOME`.
const USER_CONFIG_PATH: &str = ".config/safe-shell/config.toml";

// ── Final (merged) config types ──

#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub policy: PolicyConfig,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Settings {
    /// Interpreter invoked as `<shell> -c <command>`.
    #[serde(default = "default_shell")]
    pub shell: String,
    /// Capture ceiling per output stream, in bytes.
    #[serde(default = "default_max_buffer_bytes")]
    pub max_buffer_bytes: usize,
    /// Whether the manual-approval tool is exposed at all.
    #[serde(default = "default_true")]
    pub manual_tier: bool,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Log file path; `~` is expanded. Empty disables logging.
    #[serde(default)]
    pub log_file: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            shell: default_shell(),
            max_buffer_bytes: default_max_buffer_bytes(),
            manual_tier: true,
            log_level: default_log_level(),
            log_file: String::new(),
        }
    }
}

fn default_shell() -> String {
    "/bin/sh".into()
}

fn default_max_buffer_bytes() -> usize {
    crate::exec::DEFAULT_MAX_BUFFER
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".into()
}

#[derive(Debug, Deserialize, Serialize, Default)]
pub struct PolicyConfig {
    /// Exact command lines runnable without approval, in display order.
    #[serde(default)]
    pub allow: Vec<String>,
}

// ── Overlay types (user config that merges with defaults) ──

#[derive(Debug, Deserialize, Default)]
struct ConfigOverlay {
    #[serde(default)]
    settings: SettingsOverlay,
    #[serde(default)]
    policy: PolicyOverlay,
}

#[derive(Debug, Deserialize, Default)]
struct SettingsOverlay {
    shell: Option<String>,
    max_buffer_bytes: Option<usize>,
    manual_tier: Option<bool>,
    log_level: Option<String>,
    log_file: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct PolicyOverlay {
    #[serde(default)]
    replace: bool,
    #[serde(default)]
    allow: Vec<String>,
    #[serde(default)]
    remove_allow: Vec<String>,
}

// ── Merge logic ──

/// Merge a user list into a default list.
/// In replace mode: user list replaces default entirely.
/// In merge mode: remove items first, then extend with additions (deduped, order kept).
fn merge_list(base: &mut Vec<String>, add: Vec<String>, remove: &[String], replace: bool) {
    if replace {
        *base = add;
    } else {
        base.retain(|item| !remove.contains(item));
        for item in add {
            if !base.contains(&item) {
                base.push(item);
            }
        }
    }
}

impl Config {
    /// Load the default embedded configuration.
    pub fn default_config() -> Self {
        toml::from_str(DEFAULT_CONFIG).expect("embedded default config must parse")
    }

    /// Load configuration with resolution order:
    /// 1. Start with embedded defaults
    /// 2. Merge the overlay from `path`, or from ~/.config/safe-shell/config.toml
    ///
    /// Scalars override, lists extend. `replace = true` in `[policy]` swaps the
    /// allow-list wholesale; `remove_allow` subtracts entries.
    pub fn load(path: Option<&Path>) -> Self {
        let mut config = Self::default_config();
        let path = path.map(Path::to_path_buf).or_else(user_config_path);
        if let Some(overlay) = path.and_then(|p| Self::load_overlay(&p)) {
            config.apply_overlay(overlay);
        }
        config
    }

    /// Try to read and parse an overlay file. Missing files are not an error.
    fn load_overlay(path: &Path) -> Option<ConfigOverlay> {
        let content = std::fs::read_to_string(path).ok()?;
        match toml::from_str(&content) {
            Ok(overlay) => Some(overlay),
            Err(e) => {
                // Logging is configured from this file, so stderr is all we have.
                eprintln!("safe-shell: config parse error in {}: {e}", path.display());
                None
            }
        }
    }

    /// Apply an overlay on top of this config (merge semantics).
    fn apply_overlay(&mut self, overlay: ConfigOverlay) {
        let s = overlay.settings;
        if let Some(v) = s.shell {
            self.settings.shell = v;
        }
        if let Some(v) = s.max_buffer_bytes {
            self.settings.max_buffer_bytes = v;
        }
        if let Some(v) = s.manual_tier {
            self.settings.manual_tier = v;
        }
        if let Some(v) = s.log_level {
            self.settings.log_level = v;
        }
        if let Some(v) = s.log_file {
            self.settings.log_file = v;
        }

        let p = overlay.policy;
        merge_list(&mut self.policy.allow, p.allow, &p.remove_allow, p.replace);
    }

    /// Resolve `settings.log_file` with `~` and `$VAR` expansion.
    pub fn log_path(&self) -> Option<PathBuf> {
        if self.settings.log_file.is_empty() {
            return None;
        }
        let expanded = shellexpand::full(&self.settings.log_file)
            .map(|s| s.into_owned())
            .unwrap_or_else(|_| shellexpand::tilde(&self.settings.log_file).into_owned());
        Some(PathBuf::from(expanded))
    }

    /// Apply an overlay from a TOML string. Used for testing.
    #[cfg(test)]
    fn apply_overlay_str(&mut self, toml_str: &str) {
        let overlay: ConfigOverlay = toml::from_str(toml_str).unwrap();
        self.apply_overlay(overlay);
    }
}

fn user_config_path() -> Option<PathBuf> {
    let home = std::env::var_os("HOME")?;
    Some(Path::new(&home).join(USER_CONFIG_PATH))
}
