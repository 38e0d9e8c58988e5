pub mod memory;
pub mod process;
pub mod uci;

pub use memory::{reserve_adaptive, HeapProbe, MemoryBudget, MemoryReserver, ReserveError};
pub use process::{find_engine_path, EngineLauncher, EngineProcess, ProcessLauncher};
pub use uci::{parse_uci_message, UciError, UciMessage};

use serde::Serialize;

/// Commands sent to the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCommand {
    Uci,
    SetOption { name: String, value: Option<String> },
    NewGame,
    IsReady,
    SetPosition { position: String },
    Go(SearchLimit),
    Stop,
    Quit,
}

/// Bound for a single "go" command. Depth and time are mutually exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchLimit {
    Depth(u32),
    MoveTime(u64), // milliseconds
}

impl SearchLimit {
    /// Pick the bound for a request. Depth takes priority over time; when
    /// neither is given the fallback move time is used.
    pub fn resolve(depth: Option<u32>, movetime_ms: Option<u64>, fallback_ms: u64) -> Self {
        match (depth, movetime_ms) {
            (Some(depth), _) => SearchLimit::Depth(depth),
            (None, Some(ms)) => SearchLimit::MoveTime(ms),
            (None, None) => SearchLimit::MoveTime(fallback_ms),
        }
    }
}

/// Engine analysis information
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineInfo {
    pub depth: Option<u32>,
    pub seldepth: Option<u32>,
    pub time_ms: Option<u64>,
    pub nodes: Option<u64>,
    pub score: Option<Score>,
    pub pv: Vec<String>, // Principal variation, opaque move tokens
    pub multipv: Option<u32>,
    pub currmove: Option<String>,
    pub hashfull: Option<u16>,
    pub nps: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Score {
    Centipawns(i32),
    Mate(i32), // Negative for being mated
}

impl Score {
    /// Sign of a mate score: +1 when the side to move mates, -1 when it is
    /// being mated. `None` for centipawn scores.
    pub fn mate_sign(&self) -> Option<i32> {
        match self {
            Score::Mate(n) if *n < 0 => Some(-1),
            Score::Mate(_) => Some(1),
            Score::Centipawns(_) => None,
        }
    }
}

impl std::fmt::Display for Score {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Score::Centipawns(cp) => write!(f, "{:+.2}", *cp as f64 / 100.0),
            Score::Mate(n) if *n < 0 => write!(f, "-M{}", n.unsigned_abs()),
            Score::Mate(n) => write!(f, "M{}", n),
        }
    }
}
