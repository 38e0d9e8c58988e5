//! Command-line arguments and how they fold into a [`SessionConfig`].
//!
//! Precedence, lowest first: built-in defaults, the JSON config file (or the
//! environment when no file is given), then explicit flags.

use std::path::PathBuf;

use clap::Parser;
use session::{AnalyzeOptions, EngineConfig, SessionConfig};

/// Analyze positions with a UCI engine.
#[derive(Debug, Parser)]
#[command(name = "analyze", version, about = "Analyze positions with a UCI engine")]
pub struct Cli {
    /// Positions to analyze, as FEN strings.
    #[arg(required = true)]
    pub positions: Vec<String>,

    /// Engine executable. Well-known install paths are probed when omitted.
    #[arg(short, long, value_name = "PATH")]
    pub engine: Option<PathBuf>,

    /// Extra argument passed to the engine executable.
    #[arg(long = "engine-arg", value_name = "ARG")]
    pub engine_args: Vec<String>,

    /// JSON config file.
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[arg(short, long)]
    pub threads: Option<u32>,

    /// Transposition table size in MB.
    #[arg(long = "hash", value_name = "MB")]
    pub hash_mb: Option<u32>,

    /// Number of candidate lines to report.
    #[arg(short, long)]
    pub multipv: Option<u32>,

    /// Engine option as NAME=VALUE, e.g. UCI_Variant=crazyhouse.
    #[arg(short = 'o', long = "option", value_name = "NAME=VALUE", value_parser = parse_option)]
    pub options: Vec<(String, String)>,

    /// Search to a fixed depth. Takes priority over --movetime.
    #[arg(short, long)]
    pub depth: Option<u32>,

    /// Search for a fixed time in milliseconds.
    #[arg(long, value_name = "MS")]
    pub movetime: Option<u64>,

    /// Submit every position at once; each one supersedes the previous.
    #[arg(long)]
    pub supersede: bool,

    /// Print every evaluation update, not just the final one.
    #[arg(short, long)]
    pub follow: bool,

    /// Emit JSON lines instead of text.
    #[arg(long)]
    pub json: bool,

    /// Write logs to a daily-rolling file in this directory instead of stderr.
    #[arg(long, value_name = "DIR")]
    pub log_dir: Option<PathBuf>,
}

impl Cli {
    /// Resolve the session config from file, environment, and flags.
    pub fn session_config(&self) -> anyhow::Result<SessionConfig> {
        let mut config = match &self.config {
            Some(path) => SessionConfig::load(path)?,
            None => SessionConfig::from_env(),
        };

        config.overlay(SessionConfig {
            engine_path: self.engine.clone(),
            engine_args: self.engine_args.clone(),
            engine: EngineConfig {
                threads: self.threads,
                hash_mb: self.hash_mb,
                multipv: self.multipv,
                options: self.options.clone(),
            },
            default_movetime_ms: None,
        });

        Ok(config)
    }

    pub fn analyze_options(&self) -> AnalyzeOptions {
        AnalyzeOptions {
            time_limit_ms: self.movetime,
            depth_limit: self.depth,
            multipv: None,
        }
    }
}

fn parse_option(s: &str) -> Result<(String, String), String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{}'", s))?;
    let name = name.trim();
    if name.is_empty() {
        return Err("option name is empty".to_string());
    }
    Ok((name.to_string(), value.trim().to_string()))
}
