use crate::{BookmarkEvent, ChangeKind, EngineError, Result};
use async_trait::async_trait;
use log::{debug, error, info, warn};
use serde::Serialize;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant, SystemTime};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time;

/// Something the coalescer can refresh once a burst of changes settles.
#[async_trait]
pub trait RefreshTarget: Send + Sync + 'static {
    /// `false` once the consumer has been torn down; pending refreshes become no-ops.
    fn is_live(&self) -> bool;

    async fn refresh(&self) -> Result<()>;
}

#[derive(Debug, Clone, Copy)]
pub struct CoalescerConfig {
    /// Quiet period that must elapse after the last notification.
    pub window: Duration,
}

impl Default for CoalescerConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_millis(300),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CoalescerHealth {
    pub last_success: Option<SystemTime>,
    pub last_error: Option<String>,
    pub consecutive_failures: u32,
    pub last_duration_ms: Option<u64>,
    /// Notifications folded into the currently armed window.
    pub pending_events: usize,
    pub refreshing: bool,
    pub refreshes: u64,
    /// Windows that fired after the target was torn down.
    pub skipped: u64,
    pub lagged: u64,
}

enum CoalescerCommand {
    Notify(ChangeKind),
    Shutdown,
}

/// Trailing-edge debouncer between store notifications and a [`RefreshTarget`].
///
/// Every notification (re)starts one timer; when it elapses without a newer
/// notification the target is refreshed exactly once. The timer slot is
/// cleared before the refresh runs, so a failed refresh never blocks the next
/// burst. The target is held weakly: dropping it turns pending work into a no-op.
#[derive(Clone)]
pub struct ChangeCoalescer {
    inner: Arc<CoalescerInner>,
}

struct CoalescerInner {
    command_tx: mpsc::Sender<CoalescerCommand>,
    health_tx: watch::Sender<CoalescerHealth>,
}

impl ChangeCoalescer {
    /// Spawn the coalescing loop. Must be called inside a tokio runtime.
    pub fn start<T: RefreshTarget>(
        target: Weak<T>,
        events: Option<broadcast::Receiver<BookmarkEvent>>,
        config: CoalescerConfig,
    ) -> Self {
        let (command_tx, command_rx) = mpsc::channel(64);
        let (health_tx, _) = watch::channel(CoalescerHealth::default());

        spawn_coalesce_loop(target, config, events, command_rx, health_tx.clone());

        Self {
            inner: Arc::new(CoalescerInner {
                command_tx,
                health_tx,
            }),
        }
    }

    /// Record one change notification.
    pub async fn notify(&self, kind: ChangeKind) -> Result<()> {
        self.inner
            .command_tx
            .send(CoalescerCommand::Notify(kind))
            .await
            .map_err(|_| EngineError::Closed)
    }

    /// Stop the loop; an armed window is discarded.
    pub fn shutdown(&self) {
        let _ = self.inner.command_tx.try_send(CoalescerCommand::Shutdown);
    }

    #[must_use]
    pub fn health_snapshot(&self) -> CoalescerHealth {
        self.inner.health_tx.borrow().clone()
    }
}

impl Drop for ChangeCoalescer {
    fn drop(&mut self) {
        if Arc::strong_count(&self.inner) == 1 {
            let _ = self.inner.command_tx.try_send(CoalescerCommand::Shutdown);
        }
    }
}

enum StoreSignal {
    Changed(ChangeKind),
    Lagged(u64),
    Closed,
}

async fn next_store_signal(events: &mut Option<broadcast::Receiver<BookmarkEvent>>) -> StoreSignal {
    let Some(rx) = events.as_mut() else {
        return std::future::pending().await;
    };
    match rx.recv().await {
        Ok(event) => StoreSignal::Changed(event.kind),
        Err(RecvError::Lagged(skipped)) => StoreSignal::Lagged(skipped),
        Err(RecvError::Closed) => StoreSignal::Closed,
    }
}

fn spawn_coalesce_loop<T: RefreshTarget>(
    target: Weak<T>,
    config: CoalescerConfig,
    mut events: Option<broadcast::Receiver<BookmarkEvent>>,
    mut command_rx: mpsc::Receiver<CoalescerCommand>,
    health_tx: watch::Sender<CoalescerHealth>,
) {
    tokio::spawn(async move {
        let mut state = DebounceState::new(config.window);
        let mut health = CoalescerHealth::default();

        loop {
            let next_deadline = state.next_deadline();

            tokio::select! {
                signal = next_store_signal(&mut events) => {
                    match signal {
                        StoreSignal::Changed(kind) => {
                            debug!("Bookmark {kind:?} notification");
                            state.record_event();
                        }
                        StoreSignal::Lagged(skipped) => {
                            // Missed events still mean the tree moved.
                            warn!("Change coalescer lagged behind by {skipped} notifications");
                            health.lagged += skipped;
                            state.record_event();
                        }
                        StoreSignal::Closed => {
                            debug!("Bookmark event stream closed");
                            events = None;
                        }
                    }
                    health.pending_events = state.pending();
                    health_tx.send_replace(health.clone());
                }
                cmd = command_rx.recv() => {
                    match cmd {
                        Some(CoalescerCommand::Notify(kind)) => {
                            debug!("Bookmark {kind:?} notification");
                            state.record_event();
                        }
                        Some(CoalescerCommand::Shutdown) | None => {
                            debug!("Change coalescer shutting down");
                            break;
                        }
                    }
                    health.pending_events = state.pending();
                    health_tx.send_replace(health.clone());
                }
                () = async {
                    if let Some(deadline) = next_deadline {
                        time::sleep_until(deadline).await;
                    }
                }, if state.should_run() && next_deadline.is_some() => {
                    let burst = state.take();
                    health.pending_events = 0;

                    let Some(target) = target.upgrade() else {
                        debug!("Refresh target dropped; stopping change coalescer");
                        break;
                    };
                    if !target.is_live() {
                        debug!("Refresh target torn down; discarding {burst} notifications");
                        health.skipped += 1;
                        health_tx.send_replace(health.clone());
                        continue;
                    }

                    health.refreshing = true;
                    health_tx.send_replace(health.clone());

                    let started = Instant::now();
                    let outcome = target.refresh().await;
                    drop(target);
                    #[allow(clippy::cast_possible_truncation)]
                    let duration = started.elapsed().as_millis() as u64;

                    health.refreshing = false;
                    health.last_duration_ms = Some(duration);
                    match outcome {
                        Ok(()) => {
                            info!("Coalesced {burst} notifications into one refresh ({duration}ms)");
                            health.last_success = Some(SystemTime::now());
                            health.last_error = None;
                            health.consecutive_failures = 0;
                            health.refreshes += 1;
                        }
                        Err(err) => {
                            error!("Coalesced refresh failed: {err}");
                            health.last_error = Some(err.to_string());
                            health.consecutive_failures += 1;
                        }
                    }
                    health_tx.send_replace(health.clone());
                }
            }
        }
    });
}

struct DebounceState {
    window: Duration,
    pending: usize,
    deadline: Option<time::Instant>,
}

impl DebounceState {
    const fn new(window: Duration) -> Self {
        Self {
            window,
            pending: 0,
            deadline: None,
        }
    }

    /// Arm the window, replacing any earlier deadline.
    fn record_event(&mut self) {
        self.pending += 1;
        self.deadline = Some(time::Instant::now() + self.window);
    }

    const fn pending(&self) -> usize {
        self.pending
    }

    const fn should_run(&self) -> bool {
        self.deadline.is_some()
    }

    const fn next_deadline(&self) -> Option<time::Instant> {
        self.deadline
    }

    /// Clear the slot and return how many notifications it absorbed.
    fn take(&mut self) -> usize {
        self.deadline = None;
        std::mem::take(&mut self.pending)
    }
}
