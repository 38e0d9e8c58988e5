use tokio::sync::{broadcast, oneshot};

use crate::config::EngineConfig;
use crate::events::SessionEvent;
use crate::snapshot::EvaluationSnapshot;

#[derive(Debug, Clone, thiserror::Error)]
pub enum SessionError {
    #[error("Analysis was superseded or abandoned")]
    Abandoned,
    #[error("Session actor closed")]
    ActorClosed,
}

/// Bring-up failures. Reported as a status event, never returned to callers.
#[derive(Debug, thiserror::Error)]
pub enum BringupError {
    #[error("memory reservation failed: {0}")]
    Memory(#[from] engine::ReserveError),
    #[error("engine launch failed: {0}")]
    Launch(#[from] engine::UciError),
}

/// Engine lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Uninitialized,
    Loading,
    Ready,
}

/// Per-request knobs for [`crate::SessionHandle::analyze`].
#[derive(Debug, Clone, Default)]
pub struct AnalyzeOptions {
    pub time_limit_ms: Option<u64>,
    /// Takes priority over `time_limit_ms`.
    pub depth_limit: Option<u32>,
    pub multipv: Option<u32>,
}

impl AnalyzeOptions {
    pub fn movetime(ms: u64) -> Self {
        Self {
            time_limit_ms: Some(ms),
            ..Default::default()
        }
    }

    pub fn depth(depth: u32) -> Self {
        Self {
            depth_limit: Some(depth),
            ..Default::default()
        }
    }

    pub fn with_multipv(mut self, multipv: u32) -> Self {
        self.multipv = Some(multipv);
        self
    }
}

/// Point-in-time view of the session, for callers and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub session_id: String,
    pub lifecycle: Lifecycle,
    pub engine_label: String,
    pub active_multipv: u32,
    pub computing: bool,
    pub pending: bool,
    pub depth: u32,
}

/// Commands sent to the session actor. Each embeds a oneshot for the reply.
pub enum SessionCommand {
    Configure {
        config: EngineConfig,
        reply: oneshot::Sender<()>,
    },
    Start {
        reply: oneshot::Sender<()>,
    },
    Analyze {
        position: String,
        options: AnalyzeOptions,
        done: oneshot::Sender<Option<EvaluationSnapshot>>,
        reply: oneshot::Sender<()>,
    },
    Stop {
        reply: oneshot::Sender<()>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
    GetInfo {
        reply: oneshot::Sender<SessionInfo>,
    },
    Subscribe {
        reply: oneshot::Sender<broadcast::Receiver<SessionEvent>>,
    },
}
