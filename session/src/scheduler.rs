use engine::SearchLimit;
use tokio::sync::oneshot;

use crate::snapshot::EvaluationSnapshot;

/// One analysis request.
#[derive(Debug)]
pub(crate) struct WorkItem {
    pub position: String,
    pub limit: SearchLimit,
    pub multipv: Option<u32>,
    pub on_done: Option<oneshot::Sender<Option<EvaluationSnapshot>>>,
}

impl WorkItem {
    /// Deliver the final result. Consumes the item so this happens once.
    pub fn finish(self, result: Option<EvaluationSnapshot>) {
        if let Some(tx) = self.on_done {
            let _ = tx.send(result);
        }
    }
}

#[derive(Debug)]
struct Current {
    item: WorkItem,
    started: bool,
    cancel_sent: bool,
}

/// What the session has to do after a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Submitted {
    /// Slot was free; start the item once the engine is ready.
    Current,
    /// Replaced an item that had not started yet.
    ReplacedWaiting,
    /// Queued behind a running item that must now be stopped.
    Preempt,
    /// Queued behind a running item that is already stopping.
    Queued,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Cancelled {
    Nothing,
    /// The running item must be stopped.
    Preempt,
    DroppedWaiting,
}

/// Single-worker queue: at most one current item and one pending item.
#[derive(Debug, Default)]
pub(crate) struct Scheduler {
    current: Option<Current>,
    pending: Option<WorkItem>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn submit(&mut self, item: WorkItem) -> Submitted {
        match self.current.as_mut() {
            None => {
                self.current = Some(Current {
                    item,
                    started: false,
                    cancel_sent: false,
                });
                Submitted::Current
            }
            Some(current) if !current.started => {
                tracing::debug!(position = %current.item.position, "Replacing waiting item");
                current.item = item;
                Submitted::ReplacedWaiting
            }
            Some(current) => {
                if let Some(discarded) = self.pending.replace(item) {
                    tracing::debug!(position = %discarded.position, "Discarding pending item");
                }
                if current.cancel_sent {
                    Submitted::Queued
                } else {
                    current.cancel_sent = true;
                    Submitted::Preempt
                }
            }
        }
    }

    pub fn cancel(&mut self) -> Cancelled {
        self.pending = None;
        match self.current.as_mut() {
            None => Cancelled::Nothing,
            Some(current) if !current.started => {
                self.current = None;
                Cancelled::DroppedWaiting
            }
            Some(current) if current.cancel_sent => Cancelled::Nothing,
            Some(current) => {
                current.cancel_sent = true;
                Cancelled::Preempt
            }
        }
    }

    /// The current item, if it is still waiting to be started.
    pub fn waiting(&self) -> Option<&WorkItem> {
        self.current
            .as_ref()
            .filter(|current| !current.started)
            .map(|current| &current.item)
    }

    pub fn mark_started(&mut self) {
        if let Some(current) = self.current.as_mut() {
            current.started = true;
        }
    }

    pub fn is_running(&self) -> bool {
        self.current.as_ref().is_some_and(|c| c.started)
    }

    /// Running and no stop signal sent yet: engine output still counts.
    pub fn accepts_output(&self) -> bool {
        self.current
            .as_ref()
            .is_some_and(|c| c.started && !c.cancel_sent)
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Terminal event for the running item: hand it back and promote the
    /// pending item to a waiting current item.
    pub fn complete(&mut self) -> Option<WorkItem> {
        if !self.is_running() {
            return None;
        }
        let finished = self.current.take().map(|c| c.item);
        self.current = self.pending.take().map(|item| Current {
            item,
            started: false,
            cancel_sent: false,
        });
        finished
    }

    /// Drop all work without delivering results.
    pub fn abandon(&mut self) {
        self.current = None;
        self.pending = None;
    }
}
