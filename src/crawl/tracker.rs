use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// Crawl stage a scheduled fetch belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Catalog page fetch and walk.
    Listing,
    /// Detail page fetch, enclosure probe and aggregation.
    Detail,
}

/// Per-stage count of scheduled work that has not finished yet.
///
/// Every scheduled task holds a [`Ticket`]; the count drops when the ticket
/// does. A task must take its children's tickets before releasing its own,
/// so the counts only reach zero together once no producer can schedule
/// anything else.
#[derive(Debug, Default)]
pub struct InFlight {
    listing: AtomicUsize,
    detail: AtomicUsize,
    idle: Notify,
}

impl InFlight {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Registers one unit of outstanding work for `stage`.
    pub fn ticket(self: &Arc<Self>, stage: Stage) -> Ticket {
        self.counter(stage).fetch_add(1, Ordering::SeqCst);
        Ticket {
            tracker: Arc::clone(self),
            stage,
        }
    }

    pub fn pending(&self, stage: Stage) -> usize {
        self.counter(stage).load(Ordering::SeqCst)
    }

    pub fn is_idle(&self) -> bool {
        self.pending(Stage::Listing) == 0 && self.pending(Stage::Detail) == 0
    }

    /// Resolves once both stages have no outstanding tickets.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            // Register before checking so a release in between is not missed
            notified.as_mut().enable();
            if self.is_idle() {
                return;
            }
            notified.await;
        }
    }

    fn counter(&self, stage: Stage) -> &AtomicUsize {
        match stage {
            Stage::Listing => &self.listing,
            Stage::Detail => &self.detail,
        }
    }
}

/// Outstanding-work marker; releases its count on drop.
#[derive(Debug)]
pub struct Ticket {
    tracker: Arc<InFlight>,
    stage: Stage,
}

impl Drop for Ticket {
    fn drop(&mut self) {
        let previous = self.tracker.counter(self.stage).fetch_sub(1, Ordering::SeqCst);
        if previous == 1 && self.tracker.is_idle() {
            self.tracker.idle.notify_waiters();
        }
    }
}
