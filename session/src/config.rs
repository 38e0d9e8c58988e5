//! Configuration for analysis sessions.
//!
//! Every value has a compile-time default and can be overridden via a
//! dedicated environment variable or an optional JSON config file. Command
//! line flags are layered on top by the binary.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Hard cap on engine search threads.
pub const MAX_THREADS: u32 = 16;

/// Default transposition table size in MB.
pub const DEFAULT_HASH_MB: u32 = 16;

/// Default number of ranked lines.
pub const DEFAULT_MULTIPV: u32 = 1;

/// Default search time when a request carries neither depth nor time.
pub const DEFAULT_MOVETIME_MS: u64 = 1000;

/// Engine tunables requested by the caller. Unset fields fall back to
/// defaults when the handshake completes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub threads: Option<u32>,
    pub hash_mb: Option<u32>,
    pub multipv: Option<u32>,
    /// Engine-specific options sent verbatim after the standard ones,
    /// e.g. `("UCI_Variant", "crazyhouse")`.
    pub options: Vec<(String, String)>,
}

impl EngineConfig {
    /// Overlay the fields set in `other` on top of `self`.
    pub fn merge(&mut self, other: EngineConfig) {
        if other.threads.is_some() {
            self.threads = other.threads;
        }
        if other.hash_mb.is_some() {
            self.hash_mb = other.hash_mb;
        }
        if other.multipv.is_some() {
            self.multipv = other.multipv;
        }
        for (name, value) in other.options {
            match self.options.iter_mut().find(|(n, _)| *n == name) {
                Some(existing) => existing.1 = value,
                None => self.options.push((name, value)),
            }
        }
    }

    pub fn resolved_threads(&self) -> u32 {
        resolve_threads(self.threads)
    }

    pub fn resolved_hash_mb(&self) -> u32 {
        self.hash_mb.unwrap_or(DEFAULT_HASH_MB).max(1)
    }

    pub fn resolved_multipv(&self) -> u32 {
        self.multipv.unwrap_or(DEFAULT_MULTIPV).max(1)
    }
}

/// Thread count: the requested value or half the available cores, at least
/// one and at most [`MAX_THREADS`].
pub fn resolve_threads(requested: Option<u32>) -> u32 {
    let threads = requested.unwrap_or_else(|| {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get() as u32)
            .unwrap_or(1);
        cores / 2
    });
    threads.clamp(1, MAX_THREADS)
}

/// Everything needed to spawn a session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Engine executable. Probed in well-known locations when unset.
    pub engine_path: Option<PathBuf>,
    pub engine_args: Vec<String>,
    pub engine: EngineConfig,
    pub default_movetime_ms: Option<u64>,
}

impl SessionConfig {
    /// Defaults overridden by environment variables.
    pub fn from_env() -> Self {
        Self {
            engine_path: std::env::var("ANALYZE_ENGINE_PATH").ok().map(PathBuf::from),
            engine_args: Vec::new(),
            engine: EngineConfig {
                threads: env_parse("ANALYZE_THREADS"),
                hash_mb: env_parse("ANALYZE_HASH_MB"),
                multipv: env_parse("ANALYZE_MULTIPV"),
                options: Vec::new(),
            },
            default_movetime_ms: env_parse("ANALYZE_MOVETIME_MS"),
        }
    }

    /// Load a JSON config file and let the environment override it.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: SessionConfig = serde_json::from_str(&content)?;
        config.overlay(Self::from_env());
        Ok(config)
    }

    /// Overlay fields set in `other`.
    pub fn overlay(&mut self, other: SessionConfig) {
        if other.engine_path.is_some() {
            self.engine_path = other.engine_path;
        }
        if !other.engine_args.is_empty() {
            self.engine_args = other.engine_args;
        }
        if other.default_movetime_ms.is_some() {
            self.default_movetime_ms = other.default_movetime_ms;
        }
        self.engine.merge(other.engine);
    }

    pub fn movetime_ms(&self) -> u64 {
        self.default_movetime_ms.unwrap_or(DEFAULT_MOVETIME_MS)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Read(#[from] std::io::Error),
    #[error("invalid config file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Unparsable values fall back to the default.
fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}
