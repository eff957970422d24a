use std::env;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Env lookup for one profile: `{PROFILE}_{KEY}` first, then `{KEY}`.
/// Unset, empty and unparsable values fall back to the default.
struct ProfiledEnv<'a> {
    profile: &'a str,
}

impl ProfiledEnv<'_> {
    fn get(&self, key: &str) -> Option<String> {
        if !self.profile.is_empty() {
            if let Some(v) = env_opt(&format!("{}_{}", self.profile, key)) {
                return Some(v);
            }
        }
        env_opt(key)
    }

    fn u64_or(&self, key: &str, default: u64) -> u64 {
        self.get(key).and_then(|v| v.parse().ok()).unwrap_or(default)
    }

    fn millis_or(&self, key: &str, default_ms: u64) -> Duration {
        Duration::from_millis(self.u64_or(key, default_ms))
    }
}

// ── Defaults ──────────────────────────────────────────────────

/// Rule root used when `SENTINEL_RULE_DIR` is not set.
pub const DEFAULT_RULE_DIR: &str = "sentinel-rules";
/// Default poll interval for the file watchers.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 3_000;
/// Default upper bound on a single rule file read or write.
pub const DEFAULT_IO_TIMEOUT_MS: u64 = 10_000;
/// Files larger than this are refused by the watcher (4 MiB).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 4 * 1024 * 1024;

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub rules: RulesConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `SENTINEL_PROFILE` env var. When set (e.g. `PROD`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        Self::for_profile(&env_opt("SENTINEL_PROFILE").unwrap_or_default())
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            rules: RulesConfig::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!("  rules:       root_dir={}", self.rules.root_dir.display());
        tracing::info!(
            "  polling:     interval={}ms, io_timeout={}ms, max_file_size={}",
            self.rules.poll_interval.as_millis(),
            self.rules.io_timeout.as_millis(),
            self.rules.max_file_size
        );
    }

    /// Return a JSON view of the effective configuration.
    pub fn summary(&self) -> serde_json::Value {
        serde_json::json!({
            "profile": self.profile_label(),
            "rules": {
                "root_dir": self.rules.root_dir,
                "poll_interval_ms": self.rules.poll_interval.as_millis() as u64,
                "io_timeout_ms": self.rules.io_timeout.as_millis() as u64,
                "max_file_size": self.rules.max_file_size,
            },
        })
    }
}

// ── Rule files ────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RulesConfig {
    /// Directory holding the five rule files.
    pub root_dir: PathBuf,
    /// How often each watcher re-reads its file.
    pub poll_interval: Duration,
    /// Bound on a single read-and-publish tick or push write.
    pub io_timeout: Duration,
    /// Largest rule file the watcher will read.
    pub max_file_size: u64,
}

impl RulesConfig {
    fn from_env_profiled(profile: &str) -> Self {
        let env = ProfiledEnv { profile };
        Self {
            root_dir: env
                .get("SENTINEL_RULE_DIR")
                .map_or_else(|| PathBuf::from(DEFAULT_RULE_DIR), PathBuf::from),
            poll_interval: env.millis_or("SENTINEL_RULE_POLL_INTERVAL_MS", DEFAULT_POLL_INTERVAL_MS),
            io_timeout: env.millis_or("SENTINEL_RULE_IO_TIMEOUT_MS", DEFAULT_IO_TIMEOUT_MS),
            max_file_size: env.u64_or("SENTINEL_RULE_MAX_FILE_SIZE", DEFAULT_MAX_FILE_SIZE),
        }
    }

    /// Defaults rooted at an explicit directory; handy for tests and tools.
    pub fn with_root(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            ..Self::default()
        }
    }
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from(DEFAULT_RULE_DIR),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            io_timeout: Duration::from_millis(DEFAULT_IO_TIMEOUT_MS),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}
