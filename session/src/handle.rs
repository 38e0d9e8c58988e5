use tokio::sync::{broadcast, mpsc, oneshot};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};

use super::commands::*;
use super::config::EngineConfig;
use super::events::SessionEvent;
use super::snapshot::EvaluationSnapshot;

/// Cheap, cloneable handle to a session actor.
///
/// Dropping the last handle stops the actor and the engine with it.
#[derive(Clone)]
pub struct SessionHandle {
    id: String,
    cmd_tx: mpsc::Sender<SessionCommand>,
}

/// Final result of one `analyze` call.
#[derive(Debug)]
pub struct AnalysisTicket {
    rx: oneshot::Receiver<Option<EvaluationSnapshot>>,
}

impl AnalysisTicket {
    /// Wait for the engine to finish this position. `Ok(None)` means the
    /// search ended before any qualifying evaluation arrived.
    pub async fn wait(self) -> Result<Option<EvaluationSnapshot>, SessionError> {
        self.rx.await.map_err(|_| SessionError::Abandoned)
    }
}

impl SessionHandle {
    pub(crate) fn new(id: String, cmd_tx: mpsc::Sender<SessionCommand>) -> Self {
        Self { id, cmd_tx }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub async fn configure(&self, config: EngineConfig) -> Result<(), SessionError> {
        let (tx, rx) = oneshot::channel();
        self.send(SessionCommand::Configure { config, reply: tx })
            .await?;
        rx.await.map_err(|_| SessionError::ActorClosed)
    }

    /// Bring the engine up. Failures arrive as a status event.
    pub async fn start(&self) -> Result<(), SessionError> {
        let (tx, rx) = oneshot::channel();
        self.send(SessionCommand::Start { reply: tx }).await?;
        rx.await.map_err(|_| SessionError::ActorClosed)
    }

    /// Submit a position. Supersedes whatever is queued; returns once the
    /// request is accepted, not when the search ends.
    pub async fn analyze(
        &self,
        position: impl Into<String>,
        options: AnalyzeOptions,
    ) -> Result<AnalysisTicket, SessionError> {
        let (done_tx, done_rx) = oneshot::channel();
        let (tx, rx) = oneshot::channel();
        self.send(SessionCommand::Analyze {
            position: position.into(),
            options,
            done: done_tx,
            reply: tx,
        })
        .await?;
        rx.await.map_err(|_| SessionError::ActorClosed)?;
        Ok(AnalysisTicket { rx: done_rx })
    }

    pub async fn stop(&self) -> Result<(), SessionError> {
        let (tx, rx) = oneshot::channel();
        self.send(SessionCommand::Stop { reply: tx }).await?;
        rx.await.map_err(|_| SessionError::ActorClosed)
    }

    /// Release the engine. The session stays usable; the next `start` or
    /// `analyze` brings a fresh engine up.
    pub async fn shutdown(&self) -> Result<(), SessionError> {
        let (tx, rx) = oneshot::channel();
        self.send(SessionCommand::Shutdown { reply: tx }).await?;
        rx.await.map_err(|_| SessionError::ActorClosed)
    }

    pub async fn info(&self) -> Result<SessionInfo, SessionError> {
        let (tx, rx) = oneshot::channel();
        self.send(SessionCommand::GetInfo { reply: tx }).await?;
        rx.await.map_err(|_| SessionError::ActorClosed)
    }

    pub async fn subscribe(&self) -> Result<broadcast::Receiver<SessionEvent>, SessionError> {
        let (tx, rx) = oneshot::channel();
        self.send(SessionCommand::Subscribe { reply: tx }).await?;
        rx.await.map_err(|_| SessionError::ActorClosed)
    }

    /// Event stream that skips over lag gaps instead of erroring.
    pub async fn events(&self) -> Result<impl Stream<Item = SessionEvent>, SessionError> {
        let rx = self.subscribe().await?;
        Ok(BroadcastStream::new(rx).filter_map(|event| match event {
            Ok(event) => Some(event),
            Err(e) => {
                tracing::warn!("Event subscriber lagged: {}", e);
                None
            }
        }))
    }

    async fn send(&self, cmd: SessionCommand) -> Result<(), SessionError> {
        self.cmd_tx
            .send(cmd)
            .await
            .map_err(|_| SessionError::ActorClosed)
    }
}
