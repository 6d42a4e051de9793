use rand::Rng;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Per-host request limiter shared by every crawl stage.
///
/// At most `parallelism` requests run against one host at a time. When a
/// request finishes its slot stays occupied for `delay` plus a uniform
/// random jitter in `0..=random_delay` before the next request may take it.
/// This only paces requests; it never retries anything.
#[derive(Debug)]
pub struct Politeness {
    parallelism: usize,
    delay: Duration,
    random_delay: Duration,
    hosts: Mutex<HashMap<String, Arc<Semaphore>>>,
}

impl Politeness {
    pub fn new(parallelism: usize, delay: Duration, random_delay: Duration) -> Self {
        Self {
            parallelism: parallelism.max(1),
            delay,
            random_delay,
            hosts: Mutex::new(HashMap::new()),
        }
    }

    /// Waits for a free slot on `host`.
    pub async fn acquire(&self, host: &str) -> PolitePermit {
        let semaphore = self.semaphore(host);
        // Semaphores are never closed, so acquisition only fails if that changes
        let permit = semaphore.acquire_owned().await.ok();
        PolitePermit {
            permit,
            hold: self.hold_time(),
        }
    }

    fn semaphore(&self, host: &str) -> Arc<Semaphore> {
        let mut hosts = self.hosts.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            hosts
                .entry(host.to_string())
                .or_insert_with(|| Arc::new(Semaphore::new(self.parallelism))),
        )
    }

    fn hold_time(&self) -> Duration {
        let max_jitter = u64::try_from(self.random_delay.as_millis()).unwrap_or(u64::MAX);
        let jitter = if max_jitter == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..=max_jitter)
        };
        self.delay.saturating_add(Duration::from_millis(jitter))
    }
}

/// A request slot on one host. Dropping it starts the cool-down; the slot
/// becomes available again once the cool-down has elapsed.
#[derive(Debug)]
pub struct PolitePermit {
    permit: Option<OwnedSemaphorePermit>,
    hold: Duration,
}

impl Drop for PolitePermit {
    fn drop(&mut self) {
        let Some(permit) = self.permit.take() else {
            return;
        };
        if self.hold.is_zero() {
            return;
        }
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let hold = self.hold;
            handle.spawn(async move {
                tokio::time::sleep(hold).await;
                drop(permit);
            });
        }
    }
}
