use crate::snapshot::EvaluationSnapshot;

/// Events broadcast from the session actor to all subscribers.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Fresh evaluation for the running item (rank-1 refresh).
    Evaluation(EvaluationSnapshot),
    Status(SessionStatus),
    /// Handshake finished; the engine accepts work.
    Ready { engine_label: String },
    /// UCI debug log entry.
    UciMessage(UciLogEntry),
}

/// Human-facing progress of the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStatus {
    Loading,
    Computing,
    Idle,
    BringupFailed(String),
    EngineExited,
    ShutDown,
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionStatus::Loading => f.write_str("Loading engine..."),
            SessionStatus::Computing => f.write_str("Computing..."),
            SessionStatus::Idle => f.write_str("Ready"),
            SessionStatus::BringupFailed(reason) => write!(f, "Engine failed to start: {}", reason),
            SessionStatus::EngineExited => f.write_str("Engine exited"),
            SessionStatus::ShutDown => f.write_str("Engine shut down"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct UciLogEntry {
    pub direction: UciDirection,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UciDirection {
    ToEngine,
    FromEngine,
}
