//! Cancellable timer registry.
//!
//! Every delayed effect of a conversation session goes through a
//! [`TimerRegistry`].  The registry records each outstanding timer as a
//! [`PendingTimer`] (handle + deadline) and removes it when it fires or
//! when the session is torn down, whichever happens first.
//!
//! # Timer lifecycle
//!
//! ```text
//! schedule / sleep  -->  Pending  -->  Fired      (effect runs)
//!                                 \->  Cancelled  (cancel_all)
//! ```
//!
//! Two flavours share the same bookkeeping:
//!
//! - [`TimerRegistry::schedule`] spawns a detached effect that runs once its
//!   deadline passes.  Used for independent fixed-offset effects.
//! - [`TimerRegistry::sleep`] is an awaitable wait point for a sequential
//!   task.  It resolves to [`KernelError::TimerCancelled`] on teardown.
//!
//! Teardown is all-or-nothing: [`TimerRegistry::cancel_all`] trips a shared
//! [`CancellationToken`], and an effect whose deadline already passed but
//! which has not started yet will not run.  Effects that already started
//! are not interrupted.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{KernelError, Result};

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Unique, time-ordered timer identifier (UUID v7).
pub type TimerId = Uuid;

/// Opaque handle to a registered timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle {
    id: TimerId,
    deadline: Instant,
}

impl TimerHandle {
    /// The timer's identifier.
    pub fn id(&self) -> TimerId {
        self.id
    }

    /// The instant at which the timer fires.
    pub fn deadline(&self) -> Instant {
        self.deadline
    }
}

/// Snapshot of an outstanding timer.
#[derive(Debug, Clone)]
pub struct PendingTimer {
    pub handle: TimerHandle,
    /// Human-readable label, e.g. `"time-off/system/2"`.
    pub label: String,
}

// ---------------------------------------------------------------------------
// TimerRegistry
// ---------------------------------------------------------------------------

/// Bookkeeping for every outstanding delayed effect of one session.
///
/// The registry is cheaply cloneable (`Arc`-backed); clones share the same
/// pending set and the same teardown token.
#[derive(Clone)]
pub struct TimerRegistry {
    inner: Arc<RegistryInner>,
}

struct RegistryInner {
    /// Outstanding timers keyed by id.
    pending: DashMap<TimerId, PendingTimer>,

    /// Tripped exactly once by `cancel_all`.
    cancel: CancellationToken,

    /// Set by the first `cancel_all` call.
    torn_down: AtomicBool,

    /// Runtime captured at construction; all effects are spawned here.
    runtime: Handle,
}

impl TimerRegistry {
    /// Create a registry bound to the current tokio runtime.
    ///
    /// Returns [`KernelError::NoRuntime`] when called outside a runtime.
    pub fn new() -> Result<Self> {
        let runtime = Handle::try_current().map_err(|_| KernelError::NoRuntime)?;
        Ok(Self {
            inner: Arc::new(RegistryInner {
                pending: DashMap::new(),
                cancel: CancellationToken::new(),
                torn_down: AtomicBool::new(false),
                runtime,
            }),
        })
    }

    /// Schedule `effect` to run once `delay` has elapsed.
    ///
    /// The effect is dropped without running if the registry is torn down
    /// before it starts.
    pub fn schedule<F>(
        &self,
        label: impl Into<String>,
        delay: Duration,
        effect: F,
    ) -> Result<TimerHandle>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = self.inner.register(label.into(), delay)?;
        let inner = Arc::clone(&self.inner);
        self.inner.runtime.spawn(async move {
            if inner.wait(handle).await {
                effect.await;
            }
        });
        Ok(handle)
    }

    /// Wait for `delay` as a registered timer.
    ///
    /// Resolves to [`KernelError::TimerCancelled`] if the registry is torn
    /// down first.
    pub async fn sleep(&self, label: impl Into<String>, delay: Duration) -> Result<()> {
        let label = label.into();
        let handle = self.inner.register(label.clone(), delay)?;
        if self.inner.wait(handle).await {
            Ok(())
        } else {
            Err(KernelError::TimerCancelled { label })
        }
    }

    /// Spawn a task that is aborted at its next await point when the
    /// registry is torn down.
    pub fn spawn<F>(&self, task: F) -> Result<JoinHandle<()>>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.is_torn_down() {
            return Err(KernelError::RegistryTornDown);
        }
        let cancel = self.inner.cancel.clone();
        Ok(self.inner.runtime.spawn(async move {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {}
                _ = task => {}
            }
        }))
    }

    /// Cancel every outstanding timer.
    ///
    /// Only the first call has an effect; it returns the number of timers
    /// that were still pending.  Later calls return `0`.
    pub fn cancel_all(&self) -> usize {
        if self.inner.torn_down.swap(true, Ordering::AcqRel) {
            debug!("cancel_all called on a torn-down registry");
            return 0;
        }

        self.inner.cancel.cancel();
        let cancelled = self.inner.pending.len();
        self.inner.pending.clear();

        info!(cancelled, "timer registry torn down");
        cancelled
    }

    /// Whether [`TimerRegistry::cancel_all`] has run.
    pub fn is_torn_down(&self) -> bool {
        self.inner.torn_down.load(Ordering::Acquire)
    }

    /// Number of timers that have neither fired nor been cancelled.
    pub fn pending_count(&self) -> usize {
        self.inner.pending.len()
    }

    /// Snapshot of the outstanding timers, earliest deadline first.
    pub fn pending(&self) -> Vec<PendingTimer> {
        let mut timers: Vec<PendingTimer> = self
            .inner
            .pending
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        timers.sort_by_key(|t| t.handle.deadline);
        timers
    }
}

/// Deadlines past this horizon are clamped to it.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

fn deadline_after(delay: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(delay.min(FAR_FUTURE)).unwrap_or(now)
}

impl RegistryInner {
    fn register(&self, label: String, delay: Duration) -> Result<TimerHandle> {
        if self.torn_down.load(Ordering::Acquire) {
            return Err(KernelError::RegistryTornDown);
        }

        let handle = TimerHandle {
            id: Uuid::now_v7(),
            deadline: deadline_after(delay),
        };
        debug!(timer_id = %handle.id, label = %label, ?delay, "timer registered");
        self.pending.insert(handle.id, PendingTimer { handle, label });
        Ok(handle)
    }

    /// Wait until the timer's deadline or teardown.  Returns `true` when
    /// the timer fired and its effect may run.
    async fn wait(&self, handle: TimerHandle) -> bool {
        let guard = Deregister {
            pending: &self.pending,
            id: handle.id,
        };

        let fired = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep_until(handle.deadline) => {
                // Whoever removes the entry wins against a concurrent teardown.
                self.pending.remove(&handle.id).is_some() && !self.cancel.is_cancelled()
            }
        };

        drop(guard);
        fired
    }
}

/// Removes a pending entry when its wait is dropped mid-flight.
struct Deregister<'a> {
    pending: &'a DashMap<TimerId, PendingTimer>,
    id: TimerId,
}

impl Drop for Deregister<'_> {
    fn drop(&mut self) {
        self.pending.remove(&self.id);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
