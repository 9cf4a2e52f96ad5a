//! Single-flight coalescing of reconciliation requests.
//!
//! Any number of change signals between two ticks collapse into one pass.
//! The scheduler does not run the pass itself: it asks a [`TickSource`] for
//! the next tick, and the host later delivers that tick as
//! [`HostEvent::Tick`](crate::dom::HostEvent::Tick).
//!
//! The pending flag is cleared by [`Scheduler::begin_pass`] *before* the pass
//! runs, so a request issued from inside the pass schedules a fresh pass.

use tracing::trace;

/// Why a reconciliation was requested. Used for logging only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reason {
    /// Engine start.
    Start,
    /// Structural change inside the container.
    Structure,
    /// Coarse entry count of the thread region changed.
    ThreadGrowth,
    /// Lifecycle re-attached after detachment or replacement.
    Reattached,
    /// Route changed.
    Navigation,
    /// Settings changed.
    Settings,
    /// A reveal or collapse action ran.
    UserAction,
}

/// Host facility that delivers a tick at the next idle point.
pub trait TickSource {
    /// Arrange for one tick to be delivered. Called at most once per pending pass.
    fn request_tick(&mut self);
}

/// Tick source that only counts requests; the driver delivers ticks itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManualTicks {
    requested: usize,
}

impl ManualTicks {
    /// Ticks requested and not yet taken.
    pub fn outstanding(&self) -> usize {
        self.requested
    }

    /// Consume one outstanding tick, if any.
    pub fn take(&mut self) -> bool {
        if self.requested == 0 {
            return false;
        }
        self.requested -= 1;
        true
    }
}

impl TickSource for ManualTicks {
    fn request_tick(&mut self) {
        self.requested += 1;
    }
}

/// Coalescing scheduler.
#[derive(Debug)]
pub struct Scheduler<T> {
    ticks: T,
    pending: bool,
    requests: u64,
    passes: u64,
}

impl<T: TickSource> Scheduler<T> {
    /// Scheduler with nothing pending.
    pub fn new(ticks: T) -> Self {
        Self {
            ticks,
            pending: false,
            requests: 0,
            passes: 0,
        }
    }

    /// Request a pass. Returns `true` if this request scheduled a tick,
    /// `false` if it was coalesced into one already pending.
    pub fn request(&mut self, reason: Reason) -> bool {
        self.requests += 1;
        if self.pending {
            trace!(?reason, "reconcile request coalesced");
            return false;
        }
        self.pending = true;
        self.ticks.request_tick();
        trace!(?reason, "reconcile scheduled");
        true
    }

    /// Called when a tick arrives. Clears the pending flag and returns whether
    /// a pass should run.
    pub fn begin_pass(&mut self) -> bool {
        if !self.pending {
            return false;
        }
        self.pending = false;
        self.passes += 1;
        true
    }

    /// Whether a pass is scheduled and has not started.
    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Total requests received.
    pub fn requests(&self) -> u64 {
        self.requests
    }

    /// Passes started.
    pub fn passes(&self) -> u64 {
        self.passes
    }

    /// The tick source.
    pub fn ticks(&self) -> &T {
        &self.ticks
    }

    /// The tick source, mutably.
    pub fn ticks_mut(&mut self) -> &mut T {
        &mut self.ticks
    }
}
