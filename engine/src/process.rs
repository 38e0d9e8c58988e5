use crate::memory::MemoryBudget;
use crate::uci::{format_command, UciError};
use crate::EngineCommand;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Child;
use tokio::sync::mpsc;

/// Brings up an engine and hands back its line streams.
pub trait EngineLauncher: Send + Sync {
    fn launch(&self, budget: MemoryBudget) -> Result<EngineProcess, UciError>;
}

/// A running engine: one ordered outbound line queue, one inbound line stream.
pub struct EngineProcess {
    stdin: mpsc::Sender<String>,
    stdout: mpsc::Receiver<String>,
    child: Option<Child>,
}

impl EngineProcess {
    /// Wrap already-connected line channels, e.g. an in-process engine.
    pub fn from_channels(stdin: mpsc::Sender<String>, stdout: mpsc::Receiver<String>) -> Self {
        Self {
            stdin,
            stdout,
            child: None,
        }
    }

    /// Queue a command. Lines are written strictly in send order.
    pub async fn send(&self, cmd: &EngineCommand) -> Result<(), UciError> {
        self.stdin
            .send(format_command(cmd))
            .await
            .map_err(|_| UciError::EngineClosed)
    }

    /// Next line from the engine. `None` once the engine output has closed.
    pub async fn recv_line(&mut self) -> Option<String> {
        self.stdout.recv().await
    }

    /// Ask the engine to quit, then make sure the process is gone.
    pub async fn shutdown(mut self) {
        let _ = self.send(&EngineCommand::Quit).await;
        if let Some(mut child) = self.child.take() {
            let _ = tokio::time::timeout(Duration::from_secs(1), child.wait()).await;
            let _ = child.kill().await;
        }
    }
}

/// Spawns an engine executable speaking the protocol on stdin/stdout.
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    pub path: PathBuf,
    pub args: Vec<String>,
}

impl ProcessLauncher {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            args: Vec::new(),
        }
    }
}

impl EngineLauncher for ProcessLauncher {
    #[tracing::instrument(level = "info", skip(self), fields(path = %self.path.display()))]
    fn launch(&self, budget: MemoryBudget) -> Result<EngineProcess, UciError> {
        if !is_launchable(&self.path) {
            return Err(UciError::EngineNotFound(self.path.display().to_string()));
        }

        tracing::debug!("Spawning engine process");
        let mut process = tokio::process::Command::new(&self.path)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                tracing::error!("Failed to spawn engine: {}", e);
                match e.kind() {
                    std::io::ErrorKind::NotFound => {
                        UciError::EngineNotFound(self.path.display().to_string())
                    }
                    _ => UciError::Io(e),
                }
            })?;

        let mut stdin = process.stdin.take().ok_or(UciError::NoStdin)?;
        let stdout = process.stdout.take().ok_or(UciError::NoStdout)?;

        let (line_tx, line_rx) = mpsc::channel::<String>(256);
        let (stdin_tx, mut stdin_rx) = mpsc::channel::<String>(32);

        // Spawn output reader task
        tokio::spawn(async move {
            let mut reader = BufReader::new(stdout);
            let mut line = String::new();

            loop {
                line.clear();
                match reader.read_line(&mut line).await {
                    Ok(0) => {
                        tracing::warn!("Engine stdout EOF - engine closed");
                        break;
                    }
                    Ok(_) => {
                        let trimmed = line.trim();
                        if trimmed.is_empty() {
                            continue;
                        }
                        tracing::trace!("UCI << {}", trimmed);
                        if line_tx.send(trimmed.to_string()).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::error!("Error reading from engine stdout: {}", e);
                        break;
                    }
                }
            }
            tracing::debug!("Output reader task exiting");
        });

        // Spawn stdin writer task
        tokio::spawn(async move {
            while let Some(cmd) = stdin_rx.recv().await {
                tracing::trace!("UCI >> {}", cmd);
                if let Err(e) = stdin.write_all(format!("{}\n", cmd).as_bytes()).await {
                    tracing::error!("Failed to write to stdin: {}", e);
                    break;
                }
                if let Err(e) = stdin.flush().await {
                    tracing::error!("Failed to flush stdin: {}", e);
                    break;
                }
            }
            tracing::debug!("Stdin writer task exiting");
        });

        tracing::info!(budget_mb = budget.megabytes(), "Engine process spawned");
        Ok(EngineProcess {
            stdin: stdin_tx,
            stdout: line_rx,
            child: Some(process),
        })
    }
}

/// A bare name is resolved through `PATH` by the spawn itself.
fn is_launchable(path: &Path) -> bool {
    path.components().count() == 1 || path.exists()
}

/// Find an engine executable in common locations
pub fn find_engine_path() -> Option<PathBuf> {
    let candidates = [
        "/usr/local/bin/fairy-stockfish",
        "/usr/bin/fairy-stockfish",
        "/usr/local/bin/stockfish",
        "/usr/bin/stockfish",
        "/opt/homebrew/bin/stockfish",
        "/usr/games/stockfish",
    ];

    candidates
        .iter()
        .map(Path::new)
        .find(|path| path.exists())
        .map(Path::to_path_buf)
}
