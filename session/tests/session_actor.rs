mod common;

use std::sync::Arc;

use common::*;
use engine::Score;
use session::{AnalyzeOptions, EngineConfig, Lifecycle, SessionError, SessionEvent, SessionStatus};
use tokio_stream::StreamExt;

#[tokio::test]
async fn test_analyze_on_idle_session_starts_engine() {
    let (handle, mut engines) = spawn_fake();
    let mut events = handle.subscribe().await.unwrap();

    let ticket = handle
        .analyze("posA", AnalyzeOptions::movetime(5000))
        .await
        .unwrap();

    let mut engine = next_engine(&mut engines).await;
    engine.handshake().await;
    engine
        .expect_all(&["position fen posA", "go movetime 5000"])
        .await;
    engine.expect_silence().await;

    let ready = wait_for(&mut events, |e| matches!(e, SessionEvent::Ready { .. })).await;
    assert!(matches!(ready, SessionEvent::Ready { ref engine_label } if engine_label == "FakeFish 1.0"));

    engine.say("info depth 10 multipv 1 score cp 35 pv m1").await;
    engine.say("bestmove m1").await;

    let result = ticket.wait().await.unwrap().expect("expected a snapshot");
    assert_eq!(result.depth, 10);
    assert_eq!(result.score, Score::Centipawns(35));
    assert_eq!(result.lines.len(), 1);
    assert_eq!(result.lines[0].rank, 1);
    assert_eq!(result.lines[0].moves, vec!["m1"]);

    let info = handle.info().await.unwrap();
    assert_eq!(info.lifecycle, Lifecycle::Ready);
    assert_eq!(info.engine_label, "FakeFish 1.0");
    assert!(!info.computing);
}

#[tokio::test]
async fn test_new_request_preempts_running_one() {
    let (handle, mut engines) = spawn_fake();
    let mut events = handle.subscribe().await.unwrap();
    handle.start().await.unwrap();
    let mut engine = next_engine(&mut engines).await;
    engine.handshake().await;

    let first = handle
        .analyze("posA", AnalyzeOptions::movetime(5000))
        .await
        .unwrap();
    engine
        .expect_all(&["position fen posA", "go movetime 5000"])
        .await;
    engine.say("info depth 8 score cp 12 pv a1").await;
    wait_for(&mut events, |e| matches!(e, SessionEvent::Evaluation(_))).await;

    let superseded = handle.analyze("posB", AnalyzeOptions::depth(12)).await.unwrap();
    engine.expect("stop").await;

    let latest = handle.analyze("posC", AnalyzeOptions::depth(14)).await.unwrap();
    handle.stop().await.unwrap();
    let latest_after_stop = handle.analyze("posD", AnalyzeOptions::depth(16)).await.unwrap();
    engine.expect_silence().await;

    // late output after the stop signal never counts
    engine.say("info depth 20 score cp 400 pv z9").await;
    engine.say("bestmove a1").await;

    engine.expect_all(&["position fen posD", "go depth 16"]).await;

    let first = first.wait().await.unwrap().expect("snapshot from before the stop");
    assert_eq!(first.depth, 8);
    assert_eq!(first.score, Score::Centipawns(12));

    assert!(matches!(superseded.wait().await, Err(SessionError::Abandoned)));
    assert!(matches!(latest.wait().await, Err(SessionError::Abandoned)));

    engine.say("info depth 16 score mate 3 pv d1 d2").await;
    engine.say("bestmove d1").await;
    let last = latest_after_stop.wait().await.unwrap().unwrap();
    assert_eq!(last.score, Score::Mate(3));
}

#[tokio::test]
async fn test_stop_sends_single_cancel() {
    let (handle, mut engines) = spawn_fake();
    let ticket = handle.analyze("posA", AnalyzeOptions::depth(30)).await.unwrap();
    let mut engine = next_engine(&mut engines).await;
    engine.handshake().await;
    engine.expect_all(&["position fen posA", "go depth 30"]).await;

    handle.stop().await.unwrap();
    handle.stop().await.unwrap();
    engine.expect("stop").await;
    engine.expect_silence().await;

    engine.say("bestmove (none)").await;
    assert_eq!(ticket.wait().await.unwrap(), None);
}

#[tokio::test]
async fn test_multipv_override_reconfigures_engine() {
    let (handle, mut engines) = spawn_fake();
    handle.start().await.unwrap();
    let mut engine = next_engine(&mut engines).await;
    engine.handshake().await;

    let ticket = handle
        .analyze("posA", AnalyzeOptions::depth(10).with_multipv(3))
        .await
        .unwrap();
    engine
        .expect_all(&[
            "setoption name MultiPV value 3",
            "position fen posA",
            "go depth 10",
        ])
        .await;

    engine.say("info depth 10 multipv 2 score cp 20 pv b1").await;
    engine.say("info depth 10 multipv 3 score cp 10 pv c1").await;
    engine.say("info depth 10 multipv 1 score cp 30 pv a1").await;
    engine.say("bestmove a1").await;

    let result = ticket.wait().await.unwrap().unwrap();
    let ranks: Vec<u32> = result.lines.iter().map(|l| l.rank).collect();
    assert_eq!(ranks, vec![1, 2, 3]);
    assert_eq!(handle.info().await.unwrap().active_multipv, 3);

    let _again = handle
        .analyze("posB", AnalyzeOptions::depth(10).with_multipv(3))
        .await
        .unwrap();
    engine.expect_all(&["position fen posB", "go depth 10"]).await;
}

#[tokio::test]
async fn test_configured_options_sent_at_handshake() {
    let (handle, mut engines) = spawn_fake();
    handle
        .configure(EngineConfig {
            multipv: Some(2),
            options: vec![("UCI_Variant".to_string(), "shogi".to_string())],
            ..Default::default()
        })
        .await
        .unwrap();
    handle.start().await.unwrap();

    let mut engine = next_engine(&mut engines).await;
    engine.expect("uci").await;
    engine.say("uciok").await;
    engine
        .expect_all(&[
            "setoption name Threads value 1",
            "setoption name Hash value 16",
            "setoption name MultiPV value 2",
            "setoption name UCI_Variant value shogi",
            "ucinewgame",
            "isready",
        ])
        .await;
}

#[tokio::test]
async fn test_bringup_failure_reports_status() {
    let (handle, _engines) = spawn_fake_with(true, Arc::new(Plenty));
    let mut events = handle.subscribe().await.unwrap();

    let ticket = handle.analyze("posA", AnalyzeOptions::default()).await.unwrap();
    let event = wait_for(&mut events, |e| {
        matches!(e, SessionEvent::Status(SessionStatus::BringupFailed(_)))
    })
    .await;
    if let SessionEvent::Status(status) = event {
        assert!(status.to_string().contains("fake-engine"));
    }

    assert!(matches!(ticket.wait().await, Err(SessionError::Abandoned)));
    assert_eq!(handle.info().await.unwrap().lifecycle, Lifecycle::Uninitialized);
}

#[tokio::test]
async fn test_memory_exhaustion_fails_bringup() {
    let (handle, mut engines) = spawn_fake_with(false, Arc::new(Starved));
    let mut events = handle.subscribe().await.unwrap();

    handle.start().await.unwrap();
    wait_for(&mut events, |e| {
        matches!(e, SessionEvent::Status(SessionStatus::BringupFailed(_)))
    })
    .await;
    assert!(engines.try_recv().is_err());
    assert_eq!(handle.info().await.unwrap().lifecycle, Lifecycle::Uninitialized);
}

#[tokio::test]
async fn test_analyze_after_shutdown_restarts_engine() {
    let (handle, mut engines) = spawn_fake();
    handle.start().await.unwrap();
    let mut first = next_engine(&mut engines).await;
    first.handshake().await;

    let ticket = handle.analyze("posA", AnalyzeOptions::movetime(5000)).await.unwrap();
    first.expect_all(&["position fen posA", "go movetime 5000"]).await;

    handle.shutdown().await.unwrap();
    first.expect("quit").await;
    assert!(matches!(ticket.wait().await, Err(SessionError::Abandoned)));
    let info = handle.info().await.unwrap();
    assert_eq!(info.lifecycle, Lifecycle::Uninitialized);
    assert!(info.engine_label.is_empty());

    // shutdown is idempotent
    handle.shutdown().await.unwrap();

    let _ticket = handle.analyze("posB", AnalyzeOptions::movetime(100)).await.unwrap();
    let mut second = next_engine(&mut engines).await;
    second.handshake().await;
    second.expect_all(&["position fen posB", "go movetime 100"]).await;
}

#[tokio::test]
async fn test_engine_exit_returns_to_uninitialized() {
    let (handle, mut engines) = spawn_fake();
    let mut events = handle.subscribe().await.unwrap();
    let ticket = handle.analyze("posA", AnalyzeOptions::movetime(5000)).await.unwrap();
    let mut engine = next_engine(&mut engines).await;
    engine.handshake().await;
    engine.expect_all(&["position fen posA", "go movetime 5000"]).await;

    engine.close_output();
    wait_for(&mut events, |e| {
        matches!(e, SessionEvent::Status(SessionStatus::EngineExited))
    })
    .await;

    assert!(matches!(ticket.wait().await, Err(SessionError::Abandoned)));
    assert_eq!(handle.info().await.unwrap().lifecycle, Lifecycle::Uninitialized);
}

#[tokio::test]
async fn test_event_stream_delivers_evaluations_and_status() {
    let (handle, mut engines) = spawn_fake();
    let stream = handle.events().await.unwrap();
    tokio::pin!(stream);

    let _ticket = handle.analyze("posA", AnalyzeOptions::depth(12)).await.unwrap();
    let mut engine = next_engine(&mut engines).await;
    engine.handshake().await;
    engine.expect_all(&["position fen posA", "go depth 12"]).await;

    engine.say("info depth 4 score cp 1 pv x").await;
    engine.say("info depth 7 multipv 1 score cp -15 pv y1 y2").await;

    let mut statuses = Vec::new();
    let mut logged_uci = false;
    let snapshot = tokio::time::timeout(std::time::Duration::from_secs(2), async {
        while let Some(event) = stream.next().await {
            match event {
                SessionEvent::Evaluation(snapshot) => return snapshot,
                SessionEvent::Status(status) => statuses.push(status),
                SessionEvent::UciMessage(_) => logged_uci = true,
                SessionEvent::Ready { .. } => {}
            }
        }
        panic!("event stream ended");
    })
    .await
    .expect("timed out waiting for evaluation");

    assert_eq!(snapshot.depth, 7);
    assert_eq!(snapshot.best_move(), Some("y1"));
    assert_eq!(
        statuses,
        vec![SessionStatus::Loading, SessionStatus::Computing]
    );
    assert!(logged_uci);
}

#[tokio::test]
async fn test_dropping_handles_quits_engine() {
    let (handle, mut engines) = spawn_fake();
    handle.start().await.unwrap();
    let mut engine = next_engine(&mut engines).await;
    engine.handshake().await;

    drop(handle);
    engine.expect("quit").await;
}
