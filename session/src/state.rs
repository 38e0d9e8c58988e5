use engine::{EngineCommand, MemoryBudget, SearchLimit, UciMessage};
use tokio::sync::{broadcast, oneshot};

use crate::aggregator::Aggregator;
use crate::commands::{AnalyzeOptions, BringupError, Lifecycle, SessionInfo};
use crate::config::{EngineConfig, SessionConfig};
use crate::events::{SessionEvent, SessionStatus};
use crate::scheduler::{Cancelled, Scheduler, Submitted, WorkItem};
use crate::snapshot::EvaluationSnapshot;

/// Options as last sent to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Applied {
    threads: u32,
    hash_mb: u32,
}

/// Internal mutable state, owned entirely by the session actor. No locks.
///
/// Performs no I/O: engine commands are queued in order and drained by the
/// actor, caller-facing events go out on the broadcast channel.
pub(crate) struct SessionState {
    pub session_id: String,
    lifecycle: Lifecycle,
    engine_label: String,
    active_multipv: u32,
    requested: EngineConfig,
    applied: Option<Applied>,
    budget: Option<MemoryBudget>,
    default_movetime_ms: u64,
    scheduler: Scheduler,
    aggregator: Aggregator,
    outbox: Vec<EngineCommand>,
    event_tx: broadcast::Sender<SessionEvent>,
}

impl SessionState {
    pub fn new(
        session_id: String,
        config: &SessionConfig,
        event_tx: broadcast::Sender<SessionEvent>,
    ) -> Self {
        Self {
            session_id,
            lifecycle: Lifecycle::Uninitialized,
            engine_label: String::new(),
            active_multipv: 0,
            requested: config.engine.clone(),
            applied: None,
            budget: None,
            default_movetime_ms: config.movetime_ms(),
            scheduler: Scheduler::new(),
            aggregator: Aggregator::new(),
            outbox: Vec::new(),
            event_tx,
        }
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            session_id: self.session_id.clone(),
            lifecycle: self.lifecycle,
            engine_label: self.engine_label.clone(),
            active_multipv: self.active_multipv,
            computing: self.scheduler.is_running(),
            pending: self.scheduler.has_pending(),
            depth: self.aggregator.depth(),
        }
    }

    /// Commands queued since the last drain, in send order.
    pub fn take_commands(&mut self) -> Vec<EngineCommand> {
        std::mem::take(&mut self.outbox)
    }

    pub fn configure(&mut self, config: EngineConfig) {
        tracing::debug!(?config, "Engine configuration updated");
        self.requested.merge(config);
    }

    /// The engine process is up: start the handshake.
    pub fn on_launched(&mut self, budget: MemoryBudget) {
        if self.lifecycle != Lifecycle::Uninitialized {
            return;
        }
        self.budget = Some(budget);
        self.lifecycle = Lifecycle::Loading;
        self.send(EngineCommand::Uci);
        self.status(SessionStatus::Loading);
    }

    pub fn on_bringup_failed(&mut self, error: &BringupError) {
        tracing::error!("Engine bring-up failed: {}", error);
        self.reset();
        self.status(SessionStatus::BringupFailed(error.to_string()));
    }

    /// Explicit shutdown. Abandons all work; idempotent.
    pub fn on_shutdown(&mut self) {
        let was_running = self.lifecycle != Lifecycle::Uninitialized;
        self.reset();
        if was_running {
            self.status(SessionStatus::ShutDown);
        }
    }

    /// The engine's output closed underneath us.
    pub fn on_engine_exited(&mut self) {
        tracing::warn!("Engine exited unexpectedly");
        self.reset();
        self.status(SessionStatus::EngineExited);
    }

    fn reset(&mut self) {
        self.scheduler.abandon();
        self.aggregator.reset();
        self.outbox.clear();
        self.lifecycle = Lifecycle::Uninitialized;
        self.engine_label.clear();
        self.active_multipv = 0;
        self.applied = None;
        self.budget = None;
    }

    pub fn submit(
        &mut self,
        position: String,
        options: AnalyzeOptions,
        done: Option<oneshot::Sender<Option<EvaluationSnapshot>>>,
    ) {
        let item = WorkItem {
            position,
            limit: SearchLimit::resolve(
                options.depth_limit,
                options.time_limit_ms,
                self.default_movetime_ms,
            ),
            multipv: options.multipv,
            on_done: done,
        };

        match self.scheduler.submit(item) {
            Submitted::Current | Submitted::ReplacedWaiting => {
                if self.lifecycle == Lifecycle::Ready {
                    self.start_waiting();
                }
            }
            Submitted::Preempt => {
                tracing::debug!("Preempting running analysis");
                self.send(EngineCommand::Stop);
            }
            Submitted::Queued => {
                tracing::debug!("Stop already sent, replaced pending analysis");
            }
        }
    }

    /// Stop the running item and forget the pending one.
    pub fn cancel(&mut self) {
        match self.scheduler.cancel() {
            Cancelled::Preempt => self.send(EngineCommand::Stop),
            Cancelled::DroppedWaiting => tracing::debug!("Dropped analysis that never started"),
            Cancelled::Nothing => {}
        }
    }

    /// Handle one line of engine output.
    pub fn handle_line(&mut self, line: &str) {
        let msg = match engine::parse_uci_message(line) {
            Ok(msg) => msg,
            Err(e) => {
                tracing::trace!("Ignoring engine output: {}", e);
                return;
            }
        };

        match msg {
            UciMessage::Id { name, value } => {
                if name == "name" && self.engine_label.is_empty() {
                    tracing::info!(label = %value, "Engine identified");
                    self.engine_label = value;
                }
            }
            UciMessage::UciOk => self.on_uciok(),
            UciMessage::ReadyOk => self.on_readyok(),
            UciMessage::Info(info) => {
                if self.lifecycle != Lifecycle::Ready || !self.scheduler.accepts_output() {
                    return;
                }
                if let Some(snapshot) = self.aggregator.ingest(&info) {
                    let _ = self.event_tx.send(SessionEvent::Evaluation(snapshot));
                }
            }
            UciMessage::BestMove { mv, .. } => self.on_bestmove(mv),
        }
    }

    fn on_uciok(&mut self) {
        if self.lifecycle != Lifecycle::Loading {
            return;
        }

        let threads = self.requested.resolved_threads();
        let hash_mb = self.hash_mb();
        let multipv = self.requested.resolved_multipv();
        tracing::info!(threads, hash_mb, multipv, "Configuring engine");

        self.set_option("Threads", threads);
        self.set_option("Hash", hash_mb);
        self.set_option("MultiPV", multipv);
        for (name, value) in self.requested.options.clone() {
            self.send(EngineCommand::SetOption {
                name,
                value: Some(value),
            });
        }
        self.send(EngineCommand::NewGame);
        self.send(EngineCommand::IsReady);

        self.applied = Some(Applied { threads, hash_mb });
        self.active_multipv = multipv;
    }

    fn on_readyok(&mut self) {
        if self.lifecycle != Lifecycle::Loading {
            return;
        }
        self.lifecycle = Lifecycle::Ready;
        tracing::info!(label = %self.engine_label, "Engine ready");
        let _ = self.event_tx.send(SessionEvent::Ready {
            engine_label: self.engine_label.clone(),
        });

        if self.scheduler.waiting().is_some() {
            self.start_waiting();
        } else {
            self.status(SessionStatus::Idle);
        }
    }

    fn on_bestmove(&mut self, mv: Option<String>) {
        let Some(finished) = self.scheduler.complete() else {
            tracing::debug!(?mv, "Ignoring bestmove with no running analysis");
            return;
        };
        tracing::debug!(?mv, position = %finished.position, "Analysis finished");

        let result = self.aggregator.take_snapshot();
        finished.finish(result);
        self.aggregator.reset();

        if self.scheduler.waiting().is_some() {
            self.start_waiting();
        } else {
            self.status(SessionStatus::Idle);
        }
    }

    /// Send the waiting item to the engine. Requires `Ready`.
    fn start_waiting(&mut self) {
        let Some(item) = self.scheduler.waiting() else {
            return;
        };
        let position = item.position.clone();
        let limit = item.limit;
        let multipv = item
            .multipv
            .map(|m| m.max(1))
            .unwrap_or_else(|| self.requested.resolved_multipv());

        self.reapply_changed_options();
        if multipv != self.active_multipv {
            self.set_option("MultiPV", multipv);
            self.active_multipv = multipv;
        }
        tracing::info!(%position, ?limit, "Starting analysis");
        self.send(EngineCommand::SetPosition { position });
        self.send(EngineCommand::Go(limit));

        self.aggregator.reset();
        self.scheduler.mark_started();
        self.status(SessionStatus::Computing);
    }

    /// Threads and Hash changed by `configure` since the handshake.
    fn reapply_changed_options(&mut self) {
        let Some(applied) = self.applied else {
            return;
        };
        let threads = self.requested.resolved_threads();
        let hash_mb = self.hash_mb();

        if threads != applied.threads {
            self.set_option("Threads", threads);
        }
        if hash_mb != applied.hash_mb {
            self.set_option("Hash", hash_mb);
        }
        self.applied = Some(Applied { threads, hash_mb });
    }

    /// Requested hash, capped at the reserved memory budget.
    fn hash_mb(&self) -> u32 {
        let hash_mb = self.requested.resolved_hash_mb();
        match self.budget {
            Some(budget) => hash_mb.min(budget.megabytes().max(1)),
            None => hash_mb,
        }
    }

    fn set_option(&mut self, name: &str, value: u32) {
        self.send(EngineCommand::SetOption {
            name: name.to_string(),
            value: Some(value.to_string()),
        });
    }

    fn send(&mut self, cmd: EngineCommand) {
        self.outbox.push(cmd);
    }

    fn status(&self, status: SessionStatus) {
        tracing::debug!(%status, "Session status");
        let _ = self.event_tx.send(SessionEvent::Status(status));
    }
}
