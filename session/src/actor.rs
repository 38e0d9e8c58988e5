use std::sync::Arc;

use engine::memory::{max_pages, MIN_PAGES};
use engine::{EngineLauncher, EngineProcess, MemoryBudget, MemoryReserver};
use tokio::sync::{broadcast, mpsc};
use tracing::Instrument;

use super::commands::*;
use super::events::*;
use super::state::SessionState;

/// The engine process slot plus what it takes to fill it.
pub(crate) struct EngineSlot {
    launcher: Arc<dyn EngineLauncher>,
    reserver: Arc<dyn MemoryReserver>,
    process: Option<EngineProcess>,
}

impl EngineSlot {
    pub fn new(launcher: Arc<dyn EngineLauncher>, reserver: Arc<dyn MemoryReserver>) -> Self {
        Self {
            launcher,
            reserver,
            process: None,
        }
    }

    /// Next engine line. Never resolves while no engine is running.
    async fn next_line(&mut self) -> Option<String> {
        match self.process.as_mut() {
            Some(process) => process.recv_line().await,
            None => std::future::pending().await,
        }
    }

    async fn release(&mut self) {
        if let Some(process) = self.process.take() {
            process.shutdown().await;
        }
    }
}

/// The main session actor loop.
/// Owns all mutable state. Processes commands and engine output sequentially.
pub(crate) async fn run_session_actor(
    state: SessionState,
    slot: EngineSlot,
    cmd_rx: mpsc::Receiver<SessionCommand>,
    event_tx: broadcast::Sender<SessionEvent>,
) {
    let session_id = state.session_id.clone();
    run_session_actor_inner(state, slot, cmd_rx, event_tx)
        .instrument(tracing::info_span!("session", id = %session_id))
        .await;
}

async fn run_session_actor_inner(
    mut state: SessionState,
    mut slot: EngineSlot,
    mut cmd_rx: mpsc::Receiver<SessionCommand>,
    event_tx: broadcast::Sender<SessionEvent>,
) {
    tracing::info!("Session actor started");

    loop {
        tokio::select! {
            biased;

            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(cmd) => handle_command(&mut state, &mut slot, cmd, &event_tx).await,
                    None => {
                        tracing::info!("All handles dropped, session actor shutting down");
                        state.on_shutdown();
                        slot.release().await;
                        break;
                    }
                }
            }

            line = slot.next_line() => {
                match line {
                    Some(line) => {
                        log_uci(&event_tx, UciDirection::FromEngine, &line);
                        state.handle_line(&line);
                    }
                    None => {
                        slot.process = None;
                        state.on_engine_exited();
                    }
                }
            }
        }

        flush_commands(&mut state, &mut slot, &event_tx).await;
    }

    tracing::info!("Session actor exited");
}

async fn handle_command(
    state: &mut SessionState,
    slot: &mut EngineSlot,
    cmd: SessionCommand,
    event_tx: &broadcast::Sender<SessionEvent>,
) {
    match cmd {
        SessionCommand::Configure { config, reply } => {
            state.configure(config);
            let _ = reply.send(());
        }
        SessionCommand::Start { reply } => {
            start_engine(state, slot);
            let _ = reply.send(());
        }
        SessionCommand::Analyze {
            position,
            options,
            done,
            reply,
        } => {
            if state.lifecycle() == Lifecycle::Uninitialized {
                tracing::debug!("Analysis requested without an engine, starting one");
                start_engine(state, slot);
            }
            if state.lifecycle() == Lifecycle::Uninitialized {
                // Bring-up failed; dropping `done` tells the caller.
                tracing::warn!(%position, "Abandoning analysis, engine unavailable");
            } else {
                state.submit(position, options, Some(done));
            }
            let _ = reply.send(());
        }
        SessionCommand::Stop { reply } => {
            state.cancel();
            let _ = reply.send(());
        }
        SessionCommand::Shutdown { reply } => {
            state.on_shutdown();
            slot.release().await;
            let _ = reply.send(());
        }
        SessionCommand::GetInfo { reply } => {
            let _ = reply.send(state.info());
        }
        SessionCommand::Subscribe { reply } => {
            let _ = reply.send(event_tx.subscribe());
        }
    }
}

/// Reserve memory and launch the engine. Only from `Uninitialized`.
fn start_engine(state: &mut SessionState, slot: &mut EngineSlot) {
    if state.lifecycle() != Lifecycle::Uninitialized {
        tracing::debug!(lifecycle = ?state.lifecycle(), "Engine already started");
        return;
    }

    match bring_up(slot) {
        Ok((budget, process)) => {
            slot.process = Some(process);
            state.on_launched(budget);
        }
        Err(e) => state.on_bringup_failed(&e),
    }
}

#[tracing::instrument(level = "info", skip_all)]
fn bring_up(slot: &EngineSlot) -> Result<(MemoryBudget, EngineProcess), BringupError> {
    let budget = engine::reserve_adaptive(slot.reserver.as_ref(), MIN_PAGES, max_pages())?;
    let process = slot.launcher.launch(budget)?;
    Ok((budget, process))
}

/// Write queued commands to the engine, in order.
async fn flush_commands(
    state: &mut SessionState,
    slot: &mut EngineSlot,
    event_tx: &broadcast::Sender<SessionEvent>,
) {
    let commands = state.take_commands();
    let mut closed = false;

    if let Some(process) = slot.process.as_ref() {
        for cmd in commands {
            log_uci(event_tx, UciDirection::ToEngine, &cmd.to_string());
            if let Err(e) = process.send(&cmd).await {
                tracing::error!("Failed to send command to engine: {}", e);
                closed = true;
                break;
            }
        }
    }

    if closed {
        slot.process = None;
        state.on_engine_exited();
    }
}

fn log_uci(event_tx: &broadcast::Sender<SessionEvent>, direction: UciDirection, message: &str) {
    let _ = event_tx.send(SessionEvent::UciMessage(UciLogEntry {
        direction,
        message: message.to_string(),
    }));
}
