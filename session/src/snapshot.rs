use engine::Score;
use serde::Serialize;

/// One ranked principal variation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CandidateLine {
    /// 1-based rank as reported by the engine's `multipv` field.
    pub rank: u32,
    pub moves: Vec<String>,
    pub score: Score,
    pub depth: u32,
}

/// Caller-visible evaluation at one point in time. Built fresh on every
/// rank-1 update; `lines` holds only ranks reported so far, in rank order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EvaluationSnapshot {
    pub depth: u32,
    pub score: Score,
    pub lines: Vec<CandidateLine>,
}

impl EvaluationSnapshot {
    pub fn best_line(&self) -> Option<&CandidateLine> {
        self.lines.first()
    }

    pub fn best_move(&self) -> Option<&str> {
        self.best_line()
            .and_then(|line| line.moves.first())
            .map(String::as_str)
    }
}
