//! Keystroke debouncing with last-write-wins sequencing.
//!
//! In-flight work is never cancelled. Each request takes a ticket and its
//! result is dropped if a newer ticket was issued in the meantime.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket(u64);

/// Single-slot sequence counter.
#[derive(Debug, Default)]
pub struct LatestRequest {
    seq: AtomicU64,
}

impl LatestRequest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new request, superseding every earlier ticket.
    pub fn begin(&self) -> Ticket {
        Ticket(self.seq.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub fn is_current(&self, ticket: Ticket) -> bool {
        self.seq.load(Ordering::SeqCst) == ticket.0
    }
}

#[derive(Debug)]
pub struct Debouncer {
    delay: Duration,
    latest: LatestRequest,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            latest: LatestRequest::new(),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Wait out the delay, then run `work` unless a newer call arrived.
    /// `None` means this call was superseded and its result discarded.
    pub async fn run<F, Fut, T>(&self, work: F) -> Option<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let ticket = self.latest.begin();
        tokio::time::sleep(self.delay).await;
        if !self.latest.is_current(ticket) {
            trace!(ticket = ticket.0, "Superseded before start");
            return None;
        }

        let output = work().await;
        if !self.latest.is_current(ticket) {
            trace!(ticket = ticket.0, "Superseded while running");
            return None;
        }
        Some(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_latest_request() {
        let latest = LatestRequest::new();
        let first = latest.begin();
        assert!(latest.is_current(first));
        let second = latest.begin();
        assert!(!latest.is_current(first));
        assert!(latest.is_current(second));
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_runs_only_last() {
        let debouncer = Debouncer::new(Duration::from_millis(100));
        let runs = AtomicUsize::new(0);
        let work = |n: u32| {
            let runs = &runs;
            move || async move {
                runs.fetch_add(1, Ordering::SeqCst);
                n
            }
        };

        let (a, b, c) = tokio::join!(
            debouncer.run(work(1)),
            debouncer.run(work(2)),
            debouncer.run(work(3)),
        );
        assert_eq!((a, b, c), (None, None, Some(3)));
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_superseded_while_running() {
        let debouncer = Debouncer::new(Duration::from_millis(100));
        let slow = debouncer.run(|| async {
            tokio::time::sleep(Duration::from_millis(500)).await;
            "stale"
        });
        let fresh = async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            debouncer.run(|| async { "fresh" }).await
        };

        let (slow, fresh) = tokio::join!(slow, fresh);
        assert_eq!(slow, None);
        assert_eq!(fresh, Some("fresh"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_spaced_calls_both_run() {
        let debouncer = Debouncer::new(Duration::from_millis(100));
        assert_eq!(debouncer.run(|| async { 1 }).await, Some(1));
        assert_eq!(debouncer.run(|| async { 2 }).await, Some(2));
    }
}
