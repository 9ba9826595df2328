//! Process-wide accounting of live WebGL contexts.
//!
//! Browsers cap the number of simultaneously live contexts (16 in most
//! engines) and silently evict the oldest one when the cap is exceeded. We
//! cannot prevent that, only notice it: every render surface takes a
//! [`ContextLease`] for as long as its context lives, and the tracker warns
//! when the count climbs above the ceiling.

use std::cell::Cell;
use std::rc::Rc;

use log::{debug, warn};

pub const DEFAULT_CONTEXT_CEILING: usize = 16;

#[derive(Debug)]
pub struct ContextTracker {
    live: Cell<usize>,
    ceiling: Cell<usize>,
}

thread_local! {
    static SHARED: Rc<ContextTracker> = ContextTracker::new(DEFAULT_CONTEXT_CEILING);
}

impl ContextTracker {
    pub fn new(ceiling: usize) -> Rc<Self> {
        Rc::new(Self {
            live: Cell::new(0),
            ceiling: Cell::new(ceiling),
        })
    }

    /// The tracker shared by every surface on this page.
    pub fn shared() -> Rc<Self> {
        SHARED.with(Rc::clone)
    }

    /// Records a newly created context. The count drops again when the
    /// returned lease is released or dropped.
    pub fn acquire(self: &Rc<Self>) -> ContextLease {
        let live = self.live.get() + 1;
        self.live.set(live);

        let ceiling = self.ceiling.get();
        let over_limit = live > ceiling;
        if over_limit {
            warn!(
                "too many live WebGL contexts ({live} > {ceiling}); the browser will evict the oldest"
            );
        } else {
            debug!("WebGL context acquired ({live} live)");
        }

        ContextLease {
            tracker: Some(Rc::clone(self)),
            over_limit,
        }
    }

    pub fn live(&self) -> usize {
        self.live.get()
    }

    pub fn ceiling(&self) -> usize {
        self.ceiling.get()
    }

    pub fn set_ceiling(&self, ceiling: usize) {
        self.ceiling.set(ceiling);
    }

    /// Forgets every outstanding lease. Leases still alive afterwards will
    /// not drive the count below zero when they drop.
    pub fn reset(&self) {
        self.live.set(0);
    }

    fn release(&self) {
        let live = self.live.get().saturating_sub(1);
        self.live.set(live);
        debug!("WebGL context released ({live} live)");
    }
}

/// Proof that one context is being counted. Releasing consumes the lease,
/// so a context can never be subtracted twice.
#[derive(Debug)]
pub struct ContextLease {
    tracker: Option<Rc<ContextTracker>>,
    over_limit: bool,
}

impl ContextLease {
    /// Whether acquiring this lease pushed the count above the ceiling.
    pub fn over_limit(&self) -> bool {
        self.over_limit
    }

    pub fn release(mut self) {
        if let Some(tracker) = self.tracker.take() {
            tracker.release();
        }
    }
}

impl Drop for ContextLease {
    fn drop(&mut self) {
        if let Some(tracker) = self.tracker.take() {
            tracker.release();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seventeenth_context_crosses_the_ceiling() {
        let tracker = ContextTracker::new(DEFAULT_CONTEXT_CEILING);
        let mut leases = Vec::new();
        for _ in 0..16 {
            let lease = tracker.acquire();
            assert!(!lease.over_limit());
            leases.push(lease);
        }
        let seventeenth = tracker.acquire();
        assert!(seventeenth.over_limit());
        assert_eq!(tracker.live(), 17);
    }

    #[test]
    fn release_and_drop_each_count_once() {
        let tracker = ContextTracker::new(4);
        let a = tracker.acquire();
        let b = tracker.acquire();
        assert_eq!(tracker.live(), 2);

        a.release();
        assert_eq!(tracker.live(), 1);

        drop(b);
        assert_eq!(tracker.live(), 0);
    }

    #[test]
    fn reset_isolates_cases_and_never_underflows() {
        let tracker = ContextTracker::new(4);
        let stale = tracker.acquire();
        tracker.reset();
        assert_eq!(tracker.live(), 0);
        drop(stale);
        assert_eq!(tracker.live(), 0);
    }

    #[test]
    fn releasing_frees_room_under_the_ceiling() {
        let tracker = ContextTracker::new(1);
        let first = tracker.acquire();
        drop(first);
        assert!(!tracker.acquire().over_limit());
    }
}
