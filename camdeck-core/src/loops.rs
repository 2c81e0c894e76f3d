//! Loop cadence and cancellation.
//!
//! Four logical loops share one thread: the render loop (display refresh),
//! the segmentation and face-mesh timers, and face tracking (gated on video
//! time). Hosts own the scheduling primitive; this module owns the decision
//! of whether a tick should run and whether a loop is still alive.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// The cooperative loops driven by a host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LoopKind {
    /// Per-frame compositing.
    Render,
    /// Segmentation mask producer.
    Segmentation,
    /// Face-mesh landmark producer.
    FaceMesh,
    /// Face detection and framing controller.
    FaceTracking,
}

impl LoopKind {
    /// Every loop kind.
    pub const ALL: [LoopKind; 4] = [
        LoopKind::Render,
        LoopKind::Segmentation,
        LoopKind::FaceMesh,
        LoopKind::FaceTracking,
    ];

    /// Short name for logs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            LoopKind::Render => "render",
            LoopKind::Segmentation => "segmentation",
            LoopKind::FaceMesh => "face-mesh",
            LoopKind::FaceTracking => "face-tracking",
        }
    }
}

impl fmt::Display for LoopKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Interval gate on a caller-supplied clock (milliseconds).
///
/// The clock is video time for face tracking and wall time for the timers.
#[derive(Debug, Clone, PartialEq)]
pub struct Cadence {
    interval_ms: f64,
    last_ms: Option<f64>,
}

impl Cadence {
    /// Create a gate that opens at most once per `interval_ms`.
    #[must_use]
    pub fn new(interval_ms: f64) -> Self {
        Self {
            interval_ms,
            last_ms: None,
        }
    }

    /// Configured interval.
    #[must_use]
    pub fn interval_ms(&self) -> f64 {
        self.interval_ms
    }

    /// Clock value of the last accepted tick.
    #[must_use]
    pub fn last_ms(&self) -> Option<f64> {
        self.last_ms
    }

    /// Whether a tick at `now_ms` should run. Accepting a tick records it.
    ///
    /// A clock that jumps backwards (looped or seeked video) restarts the gate.
    pub fn ready(&mut self, now_ms: f64) -> bool {
        if !now_ms.is_finite() {
            return false;
        }
        let due = match self.last_ms {
            None => true,
            Some(last) if now_ms < last => true,
            Some(last) => now_ms - last >= self.interval_ms,
        };
        if due {
            self.last_ms = Some(now_ms);
        }
        due
    }

    /// Forget the last tick so the next call is accepted.
    pub fn reset(&mut self) {
        self.last_ms = None;
    }
}

/// Cancellation token for one running loop.
///
/// Hosts check [`LoopHandle::is_cancelled`] before rescheduling; once
/// cancelled a loop must never tick again.
#[derive(Debug, Clone)]
pub struct LoopHandle {
    kind: LoopKind,
    cancelled: Arc<AtomicBool>,
}

impl LoopHandle {
    fn new(kind: LoopKind) -> Self {
        Self {
            kind,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Which loop this handle controls.
    #[must_use]
    pub fn kind(&self) -> LoopKind {
        self.kind
    }

    /// Whether the loop has been stopped.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Stop the loop.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }
}

type Teardown = Box<dyn FnOnce()>;

struct LoopEntry {
    handle: LoopHandle,
    teardown: Option<Teardown>,
}

impl LoopEntry {
    fn stop(mut self) {
        self.handle.cancel();
        if let Some(teardown) = self.teardown.take() {
            teardown();
        }
    }
}

/// The set of loops a host is running.
///
/// At most one loop of each kind is ever live. [`LoopSet::start`] replaces a
/// running instance (running its teardown); [`LoopSet::ensure_with_teardown`]
/// leaves a running instance alone.
#[derive(Default)]
pub struct LoopSet {
    entries: HashMap<LoopKind, LoopEntry>,
}

impl fmt::Debug for LoopSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoopSet")
            .field("running", &self.running())
            .finish()
    }
}

impl LoopSet {
    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a loop with no resources to release.
    pub fn start(&mut self, kind: LoopKind) -> LoopHandle {
        self.insert(kind, None)
    }

    /// Register a loop whose `teardown` runs when it stops (closes its
    /// service handle, drops its callback).
    pub fn start_with_teardown<F>(&mut self, kind: LoopKind, teardown: F) -> LoopHandle
    where
        F: FnOnce() + 'static,
    {
        self.insert(kind, Some(Box::new(teardown)))
    }

    /// Start `kind` unless it is already live. A live loop keeps its own
    /// teardown and `teardown` is dropped without running. Returns whether
    /// a new loop was started.
    pub fn ensure_with_teardown<F>(&mut self, kind: LoopKind, teardown: F) -> bool
    where
        F: FnOnce() + 'static,
    {
        if self.is_running(kind) {
            tracing::debug!("{kind} loop already running");
            return false;
        }
        self.insert(kind, Some(Box::new(teardown)));
        true
    }

    fn insert(&mut self, kind: LoopKind, teardown: Option<Teardown>) -> LoopHandle {
        self.stop(kind);
        let handle = LoopHandle::new(kind);
        tracing::info!("Starting {kind} loop");
        self.entries.insert(
            kind,
            LoopEntry {
                handle: handle.clone(),
                teardown,
            },
        );
        handle
    }

    /// Stop one loop. Returns `false` if it was not running.
    pub fn stop(&mut self, kind: LoopKind) -> bool {
        match self.entries.remove(&kind) {
            Some(entry) => {
                tracing::info!("Stopping {kind} loop");
                entry.stop();
                true
            }
            None => false,
        }
    }

    /// Stop every loop and release its resources.
    pub fn stop_all(&mut self) {
        for kind in LoopKind::ALL {
            self.stop(kind);
        }
    }

    /// Whether a loop of this kind is live.
    #[must_use]
    pub fn is_running(&self, kind: LoopKind) -> bool {
        self.entries
            .get(&kind)
            .is_some_and(|e| !e.handle.is_cancelled())
    }

    /// Live loops in a stable order.
    #[must_use]
    pub fn running(&self) -> Vec<LoopKind> {
        LoopKind::ALL
            .into_iter()
            .filter(|k| self.is_running(*k))
            .collect()
    }
}

impl Drop for LoopSet {
    fn drop(&mut self) {
        self.stop_all();
    }
}
