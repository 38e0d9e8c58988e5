//! Analysis sessions over an external engine.
//!
//! A session owns one engine process and serializes everything that talks to
//! it: the handshake, a single-worker queue where a new request preempts the
//! running one, and the aggregation of streamed evaluations into snapshots.
//! All state lives in one actor task; callers hold a [`SessionHandle`].

pub mod aggregator;
pub mod config;
pub mod events;
pub mod snapshot;

mod actor;
mod commands;
mod handle;
mod scheduler;
mod state;

use std::path::PathBuf;
use std::sync::Arc;

use engine::{find_engine_path, EngineLauncher, HeapProbe, MemoryReserver, ProcessLauncher};
use tokio::sync::{broadcast, mpsc};
use uuid::Uuid;

use actor::{run_session_actor, EngineSlot};
pub use commands::{AnalyzeOptions, BringupError, Lifecycle, SessionError, SessionInfo};
pub use config::{EngineConfig, SessionConfig};
pub use events::{SessionEvent, SessionStatus, UciDirection, UciLogEntry};
pub use handle::{AnalysisTicket, SessionHandle};
pub use snapshot::{CandidateLine, EvaluationSnapshot};
use state::SessionState;

/// Spawn a session backed by an engine executable.
///
/// The engine is not started until `start` or the first `analyze`.
pub fn spawn_session(config: SessionConfig) -> SessionHandle {
    let path = config
        .engine_path
        .clone()
        .or_else(find_engine_path)
        .unwrap_or_else(|| PathBuf::from("stockfish"));
    let launcher = ProcessLauncher {
        path,
        args: config.engine_args.clone(),
    };
    spawn_session_with(config, Arc::new(launcher), Arc::new(HeapProbe))
}

/// Spawn a session with a custom launcher and memory reserver.
pub fn spawn_session_with(
    config: SessionConfig,
    launcher: Arc<dyn EngineLauncher>,
    reserver: Arc<dyn MemoryReserver>,
) -> SessionHandle {
    let session_id = Uuid::new_v4().to_string();
    let (cmd_tx, cmd_rx) = mpsc::channel(32);
    let (event_tx, _) = broadcast::channel(256);

    let state = SessionState::new(session_id.clone(), &config, event_tx.clone());
    let slot = EngineSlot::new(launcher, reserver);

    tokio::spawn(async move {
        run_session_actor(state, slot, cmd_rx, event_tx).await;
    });

    SessionHandle::new(session_id, cmd_tx)
}
