//! Restarting an engine over a snapshot store resumes the same queue.

use std::sync::Arc;

use turnstile::{
    ManualClock, ParticipantId, ParticipantStatus, QueueEngine, SnapshotStore,
};
use turnstile_testkit::{test_config, T0};

fn id(s: &str) -> ParticipantId {
    ParticipantId::from(s)
}

async fn open(
    prefix: &std::path::Path,
    clock: &ManualClock,
) -> QueueEngine<SnapshotStore> {
    let store = SnapshotStore::open(prefix, 4).await.unwrap();
    QueueEngine::open(test_config(1), store, Arc::new(clock.clone()))
        .await
        .unwrap()
}

#[tokio::test]
async fn test_restart_restores_positions_and_states() {
    let dir = tempfile::tempdir().unwrap();
    let prefix = dir.path().join("queue");
    let clock = ManualClock::new(T0);

    {
        let engine = open(&prefix, &clock).await;
        engine.join("a").await.unwrap();
        clock.advance(1);
        engine.join("b").await.unwrap();
        clock.advance(1);
        engine.join("c").await.unwrap();
        engine.confirm(&id("a")).await.unwrap();
    }

    let engine = open(&prefix, &clock).await;
    assert_eq!(
        engine.status(&id("a")).await.unwrap().status,
        ParticipantStatus::Connected
    );
    assert_eq!(engine.status(&id("b")).await.unwrap().position, 1);
    assert_eq!(engine.status(&id("c")).await.unwrap().position, 2);

    // Sequence numbers continue from the restored state.
    let highest = engine.participants().await.iter().map(|r| r.seq).max().unwrap();
    engine.join("d").await.unwrap();
    let d = engine.participants().await.pop().unwrap();
    assert_eq!(d.id.as_str(), "d");
    assert!(d.seq > highest);

    clock.advance(101);
    assert_eq!(
        engine.status(&id("b")).await.unwrap().status,
        ParticipantStatus::Draft
    );
    assert!(engine.status(&id("a")).await.is_err());
}

#[tokio::test]
async fn test_restart_after_everyone_left_is_empty() {
    let dir = tempfile::tempdir().unwrap();
    let prefix = dir.path().join("queue");
    let clock = ManualClock::new(T0);

    {
        let engine = open(&prefix, &clock).await;
        engine.join("a").await.unwrap();
        engine.delete(&id("a")).await.unwrap();
    }

    let engine = open(&prefix, &clock).await;
    assert!(engine.participants().await.is_empty());
    assert_eq!(engine.metrics(None).await.unwrap().waiting_count, 0);
}
