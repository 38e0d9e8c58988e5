use engine::EngineInfo;

use crate::snapshot::{CandidateLine, EvaluationSnapshot};

/// Info lines shallower than this are noise and never reach the caller.
pub const MIN_DEPTH: u32 = 6;

/// Engines cap MultiPV well below this.
const MAX_RANK: u32 = 500;

/// Running evaluation for the current work item.
///
/// Lines are stored by rank with gaps allowed. A snapshot is produced only
/// when rank 1 is refreshed, so lower ranks in it may come from an earlier,
/// shallower iteration.
#[derive(Debug, Default)]
pub(crate) struct Aggregator {
    lines: Vec<Option<CandidateLine>>,
    depth: u32,
    snapshot: Option<EvaluationSnapshot>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop everything collected for the previous item.
    pub fn reset(&mut self) {
        self.lines.clear();
        self.depth = 0;
        self.snapshot = None;
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn snapshot(&self) -> Option<&EvaluationSnapshot> {
        self.snapshot.as_ref()
    }

    pub fn take_snapshot(&mut self) -> Option<EvaluationSnapshot> {
        self.snapshot.take()
    }

    /// Fold one info event in. Returns the new snapshot when the event
    /// refreshed the top line.
    pub fn ingest(&mut self, info: &EngineInfo) -> Option<EvaluationSnapshot> {
        let depth = info.depth.unwrap_or(0);
        let rank = info.multipv.unwrap_or(1);
        let score = info.score?;

        if depth < MIN_DEPTH || rank == 0 || rank > MAX_RANK {
            return None;
        }

        let slot = (rank - 1) as usize;
        if self.lines.len() <= slot {
            self.lines.resize(slot + 1, None);
        }
        self.lines[slot] = Some(CandidateLine {
            rank,
            moves: info.pv.clone(),
            score,
            depth,
        });
        self.depth = depth;

        if rank != 1 {
            return None;
        }

        let snapshot = EvaluationSnapshot {
            depth,
            score,
            lines: self.lines.iter().flatten().cloned().collect(),
        };
        self.snapshot = Some(snapshot.clone());
        Some(snapshot)
    }
}
