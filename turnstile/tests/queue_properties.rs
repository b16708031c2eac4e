//! Queue contract checks, run under both eager and periodic sweeping.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use turnstile::{
    ParticipantId, ParticipantStatus, QueueConfig, QueueError, QueueEventPayload,
    QueuePosition, QueueRuntime, SweepMode,
};
use turnstile_testkit::{periodic_config, test_config, TestQueue};

fn both_modes(max_connected: usize) -> [QueueConfig; 2] {
    [test_config(max_connected), periodic_config(max_connected)]
}

/// Sweep if the engine does not do it on its own.
async fn settle(q: &TestQueue) {
    if q.engine.config().sweep_mode == SweepMode::Periodic {
        q.engine.tick().await.unwrap();
    }
}

fn id(s: &str) -> ParticipantId {
    ParticipantId::from(s)
}

#[tokio::test]
async fn test_capacity_two_scenario() {
    for config in both_modes(2) {
        let q = TestQueue::new(config).await;

        for p in ["a", "b", "c"] {
            q.engine.join(p).await.unwrap();
        }
        q.engine.tick().await.unwrap();

        assert_eq!(q.status_of("a").await, Some(ParticipantStatus::Draft));
        assert_eq!(q.status_of("b").await, Some(ParticipantStatus::Draft));
        assert_eq!(
            q.engine.status(&id("c")).await.unwrap(),
            QueuePosition {
                position: 1,
                status: ParticipantStatus::Waiting
            }
        );

        let t = q.advance(5);
        assert_eq!(q.engine.confirm_at(&id("a"), t).await.unwrap().session_duration, 100);
        assert_eq!(q.engine.confirm_at(&id("b"), t).await.unwrap().session_duration, 100);
        assert_eq!(q.status_of("a").await, Some(ParticipantStatus::Connected));
        assert_eq!(q.status_of("b").await, Some(ParticipantStatus::Connected));

        q.advance(101);
        q.engine.tick().await.unwrap();
        assert_eq!(q.status_of("c").await, Some(ParticipantStatus::Draft));
        assert_eq!(q.status_of("a").await, None);
        q.assert_invariants().await;
    }
}

#[tokio::test]
async fn test_join_twice_matches_join_once() {
    for config in both_modes(1) {
        let q = TestQueue::new(config).await;
        q.engine.join("head").await.unwrap();
        settle(&q).await;

        let once = q.engine.join("x").await.unwrap();
        q.advance(3);
        let twice = q.engine.join("x").await.unwrap();

        assert_eq!(once, twice);
        assert_eq!(q.engine.participants().await.len(), 2);
        assert_eq!(q.events.payloads_for("x"), vec![QueueEventPayload::Joined]);
    }
}

#[tokio::test]
async fn test_fifo_positions_hold_across_sweeps() {
    for config in both_modes(1) {
        let q = TestQueue::new(config).await;
        q.engine.join("holder").await.unwrap();
        settle(&q).await;
        q.engine.confirm(&id("holder")).await.unwrap();

        let names: Vec<String> = (0..6).map(|i| format!("w{i}")).collect();
        for name in &names {
            q.advance(1);
            q.engine.join(name.as_str()).await.unwrap();
        }

        for _ in 0..3 {
            q.advance(10);
            q.engine.tick().await.unwrap();
            let mut last = 0;
            for name in &names {
                let position = q.engine.status(&id(name)).await.unwrap();
                assert_eq!(position.status, ParticipantStatus::Waiting);
                assert!(position.position > last, "{name} overtook an earlier joiner");
                last = position.position;
            }
        }

        q.engine.delete(&id("w0")).await.unwrap();
        assert_eq!(q.engine.status(&id("w1")).await.unwrap().position, 1);
    }
}

#[tokio::test]
async fn test_confirm_then_status_is_connected() {
    for config in both_modes(3) {
        let q = TestQueue::new(config).await;
        for p in ["a", "b", "c"] {
            q.engine.join(p).await.unwrap();
        }
        settle(&q).await;

        q.engine.confirm(&id("c")).await.unwrap();
        q.advance(1);
        q.engine.confirm(&id("a")).await.unwrap();

        assert_eq!(
            q.engine.status(&id("a")).await.unwrap(),
            QueuePosition {
                position: 2,
                status: ParticipantStatus::Connected
            }
        );
        assert_eq!(q.engine.status(&id("b")).await.unwrap().position, 1);
    }
}

#[tokio::test]
async fn test_untouched_draft_is_gone_after_next_sweep() {
    for config in both_modes(1) {
        let q = TestQueue::new(config).await;
        q.engine.join("a").await.unwrap();
        q.engine.join("b").await.unwrap();
        settle(&q).await;
        assert_eq!(q.status_of("a").await, Some(ParticipantStatus::Draft));

        q.advance(101);
        q.engine.tick().await.unwrap();

        assert!(matches!(
            q.engine.status(&id("a")).await,
            Err(QueueError::NotFound(_))
        ));
        assert_eq!(q.status_of("b").await, Some(ParticipantStatus::Draft));
        assert!(q
            .events
            .payloads_for("a")
            .contains(&QueueEventPayload::DraftExpired));
    }
}

#[tokio::test]
async fn test_solitary_waiter_estimate_is_zero() {
    for config in both_modes(4) {
        let q = TestQueue::new(config).await;
        q.engine.join("only").await.unwrap();

        let metrics = q.engine.metrics(Some(&id("only"))).await.unwrap();
        match q.engine.config().sweep_mode {
            SweepMode::Periodic => assert_eq!(metrics.estimated_wait, Some(0)),
            // Already promoted, so there is nothing left to wait for.
            SweepMode::Eager => assert_eq!(metrics.estimated_wait, None),
        }
        assert_eq!(metrics.capacity, 4);
    }
}

#[tokio::test]
async fn test_estimate_grows_with_queue_depth() {
    for config in both_modes(2) {
        let q = TestQueue::new(config).await;
        for p in ["s1", "s2"] {
            q.engine.join(p).await.unwrap();
        }
        settle(&q).await;
        q.engine.confirm(&id("s1")).await.unwrap();
        q.advance(20);
        q.engine.confirm(&id("s2")).await.unwrap();

        let names: Vec<String> = (0..8).map(|i| format!("w{i}")).collect();
        for name in &names {
            q.advance(1);
            q.engine.join(name.as_str()).await.unwrap();
        }

        let mut previous = 0;
        for name in &names {
            let estimate = q.engine.estimate_wait(&id(name)).await.unwrap().unwrap();
            assert!(estimate >= previous, "estimate decreased at {name}");
            previous = estimate;
        }
    }
}

#[tokio::test]
async fn test_confirm_while_waiting_is_not_in_draft() {
    for config in both_modes(1) {
        let q = TestQueue::new(config).await;
        q.engine.join("a").await.unwrap();
        q.engine.join("b").await.unwrap();
        settle(&q).await;

        let err = q.engine.confirm(&id("b")).await.unwrap_err();
        assert!(matches!(
            err,
            QueueError::NotInDraft {
                status: ParticipantStatus::Waiting,
                ..
            }
        ));
        assert!(!err.is_transient());
        assert_eq!(q.status_of("b").await, Some(ParticipantStatus::Waiting));
    }
}

#[tokio::test]
async fn test_random_workload_keeps_invariants() {
    for config in both_modes(3) {
        let q = TestQueue::new(config).await;
        let mut seed: u64 = 0x2545_f491_4f6c_dd1d;
        let mut next = move |bound: u64| {
            seed = seed
                .wrapping_mul(6_364_136_223_846_793_005)
                .wrapping_add(1_442_695_040_888_963_407);
            (seed >> 33) % bound
        };

        let mut joined: Vec<String> = Vec::new();
        let mut deleted: HashSet<String> = HashSet::new();

        for step in 0..400 {
            match next(10) {
                0..=3 => {
                    let name = format!("p{step}");
                    q.engine.join(name.as_str()).await.unwrap();
                    joined.push(name);
                }
                4 | 5 if !joined.is_empty() => {
                    let name = &joined[next(joined.len() as u64) as usize];
                    match q.engine.confirm(&id(name)).await {
                        Ok(grant) => assert_eq!(grant.status, ParticipantStatus::Connected),
                        Err(QueueError::NotFound(_) | QueueError::NotInDraft { .. }) => {}
                        Err(other) => panic!("unexpected error: {other}"),
                    }
                }
                6 if !joined.is_empty() => {
                    let name = joined[next(joined.len() as u64) as usize].clone();
                    q.engine.delete(&id(&name)).await.unwrap();
                    assert!(q.engine.status(&id(&name)).await.is_err());
                    deleted.insert(name);
                }
                7 => {
                    q.advance(next(40) as i64);
                }
                _ => {
                    q.engine.tick().await.unwrap();
                }
            }
            q.assert_invariants().await;
        }

        let known: HashSet<String> = q
            .engine
            .participants()
            .await
            .into_iter()
            .map(|r| r.id.to_string())
            .collect();
        let joined: HashSet<String> = joined.into_iter().collect();
        assert!(known.is_subset(&joined));
        assert!(known.is_disjoint(&deleted));
    }
}

#[tokio::test]
async fn test_periodic_sweeper_drives_promotion() {
    let q = TestQueue::new(periodic_config(1)).await;
    let runtime = QueueRuntime::new(Arc::clone(&q.engine));
    runtime.start().await.unwrap();

    q.engine.join("a").await.unwrap();
    q.engine.join("b").await.unwrap();

    let promoted = tokio::time::timeout(Duration::from_secs(5), async {
        while q.status_of("a").await != Some(ParticipantStatus::Draft) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(promoted.is_ok(), "sweeper never promoted the first waiter");

    // The draft lapses on the manual clock; the sweeper hands the slot on.
    q.advance(101);
    let handed_on = tokio::time::timeout(Duration::from_secs(5), async {
        while q.status_of("b").await != Some(ParticipantStatus::Draft) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(handed_on.is_ok(), "sweeper never promoted the second waiter");
    assert_eq!(q.status_of("a").await, None);

    runtime.shutdown().await.unwrap();
    q.assert_invariants().await;
}
