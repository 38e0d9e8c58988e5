#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use engine::{EngineLauncher, EngineProcess, MemoryBudget, MemoryReserver, ReserveError, UciError};
use session::{EngineConfig, SessionConfig, SessionEvent, SessionHandle};
use tokio::sync::{broadcast, mpsc};

const TIMEOUT: Duration = Duration::from_secs(2);

/// Test side of an in-memory engine: reads what the session sent, writes
/// what the engine would print.
pub struct FakeEngine {
    commands: mpsc::Receiver<String>,
    output: Option<mpsc::Sender<String>>,
}

impl FakeEngine {
    pub async fn expect(&mut self, line: &str) {
        let got = tokio::time::timeout(TIMEOUT, self.commands.recv())
            .await
            .unwrap_or_else(|_| panic!("timed out waiting for '{}'", line))
            .expect("session closed the engine input");
        assert_eq!(got, line);
    }

    pub async fn expect_all(&mut self, lines: &[&str]) {
        for line in lines {
            self.expect(line).await;
        }
    }

    /// Nothing else arrives within a short window.
    pub async fn expect_silence(&mut self) {
        if let Ok(Some(line)) =
            tokio::time::timeout(Duration::from_millis(100), self.commands.recv()).await
        {
            panic!("unexpected command '{}'", line);
        }
    }

    pub async fn say(&self, line: &str) {
        self.output
            .as_ref()
            .expect("engine output already closed")
            .send(line.to_string())
            .await
            .expect("session dropped the engine output");
    }

    /// Simulate the process dying.
    pub fn close_output(&mut self) {
        self.output = None;
    }

    /// Answer the full handshake for the test session config.
    pub async fn handshake(&mut self) {
        self.expect("uci").await;
        self.say("id name FakeFish 1.0").await;
        self.say("id author Test").await;
        self.say("uciok").await;
        self.expect_all(&[
            "setoption name Threads value 1",
            "setoption name Hash value 16",
            "setoption name MultiPV value 1",
            "ucinewgame",
            "isready",
        ])
        .await;
        self.say("readyok").await;
    }
}

pub struct FakeLauncher {
    engines: mpsc::UnboundedSender<FakeEngine>,
    fail: bool,
}

impl EngineLauncher for FakeLauncher {
    fn launch(&self, _budget: MemoryBudget) -> Result<EngineProcess, UciError> {
        if self.fail {
            return Err(UciError::EngineNotFound("fake-engine".to_string()));
        }
        let (stdin_tx, stdin_rx) = mpsc::channel(64);
        let (stdout_tx, stdout_rx) = mpsc::channel(64);
        let _ = self.engines.send(FakeEngine {
            commands: stdin_rx,
            output: Some(stdout_tx),
        });
        Ok(EngineProcess::from_channels(stdin_tx, stdout_rx))
    }
}

/// Accepts any reservation.
pub struct Plenty;

impl MemoryReserver for Plenty {
    fn reserve(&self, pages: u32) -> Result<MemoryBudget, ReserveError> {
        Ok(MemoryBudget { pages })
    }
}

/// Exhausted at every size.
pub struct Starved;

impl MemoryReserver for Starved {
    fn reserve(&self, pages: u32) -> Result<MemoryBudget, ReserveError> {
        Err(ReserveError::ResourceExhausted { pages })
    }
}

pub fn test_config() -> SessionConfig {
    SessionConfig {
        engine: EngineConfig {
            threads: Some(1),
            hash_mb: Some(16),
            ..Default::default()
        },
        ..Default::default()
    }
}

pub fn spawn_fake() -> (SessionHandle, mpsc::UnboundedReceiver<FakeEngine>) {
    spawn_fake_with(false, Arc::new(Plenty))
}

pub fn spawn_fake_with(
    fail: bool,
    reserver: Arc<dyn MemoryReserver>,
) -> (SessionHandle, mpsc::UnboundedReceiver<FakeEngine>) {
    let (engines_tx, engines_rx) = mpsc::unbounded_channel();
    let launcher = FakeLauncher {
        engines: engines_tx,
        fail,
    };
    let handle = session::spawn_session_with(test_config(), Arc::new(launcher), reserver);
    (handle, engines_rx)
}

pub async fn next_engine(engines: &mut mpsc::UnboundedReceiver<FakeEngine>) -> FakeEngine {
    tokio::time::timeout(TIMEOUT, engines.recv())
        .await
        .expect("timed out waiting for engine launch")
        .expect("launcher dropped")
}

/// Skip events until one matches.
pub async fn wait_for<F>(events: &mut broadcast::Receiver<SessionEvent>, mut matches: F) -> SessionEvent
where
    F: FnMut(&SessionEvent) -> bool,
{
    tokio::time::timeout(TIMEOUT, async {
        loop {
            let event = events.recv().await.expect("event channel closed");
            if matches(&event) {
                return event;
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}
