//! Waiting room example walking five visitors through a two-seat queue.
//!
//! Uses a manual clock so the timeline is reproducible, and prints every
//! lifecycle event from an in-process bus subscriber.
//!
//! Run with: `cargo run --example waiting_room`

use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use turnstile::*;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let clock = ManualClock::new(0);
    let bus = Arc::new(InProcEventBus::new(64));

    let mut rx = bus.subscribe();
    let printer = tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => println!(
                    "  [t={:>3}] {:<6} {:?}",
                    event.meta.at,
                    event.participant_id(),
                    event.payload
                ),
                Err(RecvError::Lagged(n)) => println!("  (missed {n} events)"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    let engine = QueueEngineBuilder::new(QueueConfig::new(30, 60, 2))
        .with_store(MemoryStore::new())
        .with_clock(Arc::new(clock.clone()))
        .with_events(bus.clone())
        .build()
        .await?;

    println!("Five visitors arrive, one second apart:");
    for name in ["ada", "bob", "cy", "dee", "eve"] {
        let position = engine.join(name).await?;
        println!("{name:<4} -> {:?} #{}", position.status, position.position);
        clock.advance(1);
    }

    println!("\nada confirms; bob does not:");
    let grant = engine.confirm(&"ada".into()).await?;
    println!("ada token {:?}, session {}s", grant.token.as_str(), grant.session_duration);

    for name in ["cy", "dee", "eve"] {
        let wait = engine.estimate_wait(&name.into()).await?;
        println!("{name:<4} estimated wait {wait:?}s");
    }

    println!("\nThirty-one seconds later bob's draft has lapsed:");
    clock.advance(31);
    let metrics = engine.metrics(Some(&"dee".into())).await?;
    println!(
        "waiting={} draft={} connected={} capacity={} dee_wait={:?}",
        metrics.waiting_count,
        metrics.draft_count,
        metrics.connected_count,
        metrics.capacity,
        metrics.estimated_wait
    );

    println!("\ncy tries to confirm twice:");
    engine.confirm(&"cy".into()).await?;
    if let Err(err) = engine.confirm(&"cy".into()).await {
        println!("second confirm rejected: {err}");
    }

    println!("\nada leaves early:");
    engine.delete(&"ada".into()).await?;
    let dee = engine.status(&"dee".into()).await?;
    println!("dee -> {:?} #{}", dee.status, dee.position);

    drop(engine);
    drop(bus);
    printer.await?;
    Ok(())
}
