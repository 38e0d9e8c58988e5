//! `analyze` - run positions through a UCI engine from the command line.
//!
//! Spawns one analysis session, submits the given positions, and prints the
//! final evaluation of each. Positions run one after another by default; with
//! `--supersede` they are submitted back to back so each preempts the one
//! before it and only the last runs to completion.
//!
//! Logs go to stderr (filtered by `RUST_LOG`, default `info`) or to a
//! daily-rolling file when `--log-dir` is given.

use std::path::Path;

use anyhow::Context;
use clap::Parser;
use session::{
    AnalysisTicket, Lifecycle, SessionError, SessionEvent, SessionHandle, SessionStatus,
};
use tokio_stream::StreamExt;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod cli;
mod report;

use cli::Cli;
use report::Record;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _guard = init_tracing(cli.log_dir.as_deref())?;

    let config = cli.session_config()?;
    tracing::debug!(?config, "Resolved session config");

    let handle = session::spawn_session(config);
    tracing::info!(session = handle.id(), "Session spawned");

    tokio::select! {
        result = run(&cli, &handle) => result?,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupted, stopping analysis");
            handle.stop().await?;
        }
    }

    handle.shutdown().await?;
    Ok(())
}

/// Install the global subscriber. The returned guard flushes the file writer
/// on drop and must outlive all logging.
fn init_tracing(log_dir: Option<&Path>) -> anyhow::Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("failed to create log directory {}", dir.display()))?;
            let file_appender = tracing_appender::rolling::daily(dir, "analyze");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

            tracing_subscriber::registry()
                .with(
                    fmt::layer()
                        .with_writer(non_blocking)
                        .with_ansi(false)
                        .with_target(true)
                        .with_line_number(true),
                )
                .with(filter)
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(std::io::stderr))
                .with(filter)
                .init();
            Ok(None)
        }
    }
}

/// Submit every position and print results while relaying session events.
async fn run(cli: &Cli, handle: &SessionHandle) -> anyhow::Result<()> {
    let events = handle.events().await?;
    tokio::pin!(events);

    let work = analyze_all(cli, handle);
    tokio::pin!(work);

    loop {
        tokio::select! {
            result = &mut work => return result,
            Some(event) = events.next() => print_event(cli, event),
        }
    }
}

async fn analyze_all(cli: &Cli, handle: &SessionHandle) -> anyhow::Result<()> {
    let options = cli.analyze_options();

    if cli.supersede {
        let mut tickets = Vec::with_capacity(cli.positions.len());
        for position in &cli.positions {
            let ticket = handle.analyze(position.as_str(), options.clone()).await?;
            tickets.push((position.as_str(), ticket));
        }
        let last = tickets.len().saturating_sub(1);
        for (i, (position, ticket)) in tickets.into_iter().enumerate() {
            finish(cli, handle, position, ticket, i < last).await?;
        }
    } else {
        for position in &cli.positions {
            let ticket = handle.analyze(position.as_str(), options.clone()).await?;
            finish(cli, handle, position, ticket, false).await?;
        }
    }

    Ok(())
}

/// Wait for one ticket and print its outcome. An abandoned ticket is only
/// expected when a later submission superseded it.
async fn finish(
    cli: &Cli,
    handle: &SessionHandle,
    position: &str,
    ticket: AnalysisTicket,
    may_be_superseded: bool,
) -> anyhow::Result<()> {
    let abandoned = match ticket.wait().await {
        Ok(snapshot) => {
            if cli.json {
                println!("{}", Record::Final { position, snapshot: snapshot.as_ref() }.to_json());
            } else {
                println!("{}\n", report::format_final(position, snapshot.as_ref()));
            }
            return Ok(());
        }
        Err(e @ SessionError::Abandoned) => e,
        Err(e) => {
            return Err(e).with_context(|| format!("analysis of '{}' did not complete", position))
        }
    };

    if may_be_superseded && was_superseded(handle.info().await?.lifecycle) {
        if cli.json {
            println!("{}", Record::Superseded { position }.to_json());
        } else {
            println!("{}\nsuperseded\n", position);
        }
        return Ok(());
    }

    Err(abandoned).with_context(|| format!("analysis of '{}' did not complete", position))
}

/// Every position is submitted before any ticket is awaited, so an engine
/// that is not up by then means abandoned tickets lost their engine rather
/// than their turn.
fn was_superseded(lifecycle: Lifecycle) -> bool {
    lifecycle != Lifecycle::Uninitialized
}

fn print_event(cli: &Cli, event: SessionEvent) {
    match event {
        SessionEvent::Evaluation(snapshot) if cli.follow => {
            if cli.json {
                println!("{}", Record::Update { snapshot: &snapshot }.to_json());
            } else {
                println!("{}", report::format_snapshot(&snapshot));
            }
        }
        SessionEvent::Ready { engine_label } => {
            tracing::info!(engine = %engine_label, "Engine ready");
        }
        SessionEvent::Status(status @ SessionStatus::BringupFailed(_))
        | SessionEvent::Status(status @ SessionStatus::EngineExited) => {
            eprintln!("{}", status);
        }
        SessionEvent::Status(status) => tracing::debug!(%status, "Session status"),
        SessionEvent::UciMessage(entry) => {
            tracing::trace!(direction = ?entry.direction, "{}", entry.message);
        }
        SessionEvent::Evaluation(_) => {}
    }
}
