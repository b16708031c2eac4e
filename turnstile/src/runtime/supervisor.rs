use std::any::type_name;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;

use crate::config::SweepMode;
use crate::engine::QueueEngine;
use crate::store::ParticipantStore;

/// How long `shutdown` waits for each background task.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Token for signaling graceful shutdown to background tasks.
#[derive(Clone, Debug)]
pub struct ShutdownToken {
    inner: Arc<ShutdownTokenInner>,
}

#[derive(Debug)]
struct ShutdownTokenInner {
    cancelled: AtomicBool,
    notify: Notify,
}

impl ShutdownToken {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ShutdownTokenInner {
                cancelled: AtomicBool::new(false),
                notify: Notify::new(),
            }),
        }
    }

    /// Signal cancellation to every clone.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Wait until cancelled.
    pub async fn cancelled(&self) {
        let notified = self.inner.notify.notified();
        if self.is_cancelled() {
            return;
        }
        notified.await;
    }
}

impl Default for ShutdownToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Owns the background work around a shared [`QueueEngine`].
///
/// With [`SweepMode::Periodic`] the engine only sweeps when told to;
/// [`start`](Self::start) spawns a sweeper that calls
/// [`QueueEngine::tick`] every `sweep_interval_ms`. The sweeper takes the
/// same engine lock as foreground calls, so it never interleaves with a
/// mutation.
pub struct QueueRuntime<S: ParticipantStore + 'static> {
    engine: Arc<QueueEngine<S>>,
    shutdown_token: ShutdownToken,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl<S: ParticipantStore + 'static> fmt::Debug for QueueRuntime<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueRuntime")
            .field("store_type", &type_name::<S>())
            .field("sweep_mode", &self.engine.config().sweep_mode)
            .field("shutdown_cancelled", &self.shutdown_token.is_cancelled())
            .finish()
    }
}

impl<S: ParticipantStore + 'static> QueueRuntime<S> {
    pub fn new(engine: Arc<QueueEngine<S>>) -> Self {
        Self {
            engine,
            shutdown_token: ShutdownToken::new(),
            handles: Mutex::new(Vec::new()),
        }
    }

    pub fn engine(&self) -> Arc<QueueEngine<S>> {
        Arc::clone(&self.engine)
    }

    pub fn shutdown_token(&self) -> ShutdownToken {
        self.shutdown_token.clone()
    }

    /// Spawn whatever the engine's sweep mode needs. Eager engines sweep
    /// inline and get no background task.
    pub async fn start(&self) -> anyhow::Result<()> {
        let config = self.engine.config();
        if config.sweep_mode == SweepMode::Periodic {
            self.spawn_sweeper(config.sweep_interval()).await;
        }
        Ok(())
    }

    /// Spawn a task that sweeps every `interval` until shutdown.
    ///
    /// Sweep errors are logged and the loop keeps going; a store outage
    /// only delays promotions and expiries until it recovers.
    pub async fn spawn_sweeper(&self, interval: Duration) {
        let engine = self.engine();
        let shutdown = self.shutdown_token.clone();

        tracing::info!(interval_ms = interval.as_millis() as u64, "starting queue sweeper");
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        tracing::info!("queue sweeper shutting down");
                        break;
                    }
                    _ = tokio::time::sleep(interval) => {
                        if let Err(err) = engine.tick().await {
                            tracing::warn!(transient = err.is_transient(), "queue sweep failed: {err}");
                        }
                    }
                }
            }
        });

        self.handles.lock().await.push(handle);
    }

    /// Cancel background tasks and wait for them to finish.
    pub async fn shutdown(&self) -> anyhow::Result<()> {
        tracing::info!("shutting down queue runtime");
        self.shutdown_token.cancel();

        let handles = {
            let mut guard = self.handles.lock().await;
            std::mem::take(&mut *guard)
        };

        for handle in handles {
            match tokio::time::timeout(SHUTDOWN_TIMEOUT, handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::warn!("queue task failed: {:?}", e),
                Err(_) => tracing::warn!("queue task timed out during shutdown"),
            }
        }

        tracing::info!("queue runtime shutdown complete");
        Ok(())
    }
}
