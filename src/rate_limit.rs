//! Outbound rate limiting.
//!
//! The server disconnects clients that send more than a fixed number of
//! messages inside a sliding window. Outbound traffic therefore goes
//! through a FIFO queue that is drained only as window capacity frees up;
//! nothing is ever dropped or reordered.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use serde_json::Value;
use tokio::time::Instant;

/// One queued protocol message, ready to hand to the transport.
#[derive(Debug)]
pub(crate) struct OutboundMessage {
    pub(crate) event: String,
    pub(crate) payload: Value,
}

#[derive(Default)]
struct Inner {
    queue: VecDeque<OutboundMessage>,
    sent: VecDeque<Instant>,
}

/// Sliding-window limiter with a FIFO overflow queue.
pub(crate) struct RateLimiter {
    max_messages: usize,
    window: Duration,
    inner: Mutex<Inner>,
}

impl RateLimiter {
    pub(crate) fn new(max_messages: usize, window: Duration) -> Self {
        Self {
            max_messages,
            window,
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Append a message to the send queue.
    pub(crate) fn enqueue(&self, event: impl Into<String>, payload: Value) {
        self.lock().queue.push_back(OutboundMessage {
            event: event.into(),
            payload,
        });
    }

    /// Pop every message that fits in the window as of `now`, stamping each
    /// one as sent. Returned messages must actually be sent.
    pub(crate) fn drain(&self, now: Instant) -> Vec<OutboundMessage> {
        let mut inner = self.lock();
        let cutoff = now.checked_sub(self.window);
        if let Some(cutoff) = cutoff {
            while inner.sent.front().is_some_and(|&stamp| stamp <= cutoff) {
                inner.sent.pop_front();
            }
        }
        let mut ready = Vec::new();
        while inner.sent.len() < self.max_messages {
            match inner.queue.pop_front() {
                Some(message) => {
                    inner.sent.push_back(now);
                    ready.push(message);
                }
                None => break,
            }
        }
        ready
    }

    /// Drop queued messages and window history.
    pub(crate) fn clear(&self) {
        let mut inner = self.lock();
        inner.queue.clear();
        inner.sent.clear();
    }

    /// Number of messages still waiting for window capacity.
    pub(crate) fn pending_count(&self) -> usize {
        self.lock().queue.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, clippy::indexing_slicing)]
mod tests {
    use serde_json::json;

    use super::*;

    fn limiter() -> RateLimiter {
        RateLimiter::new(3, Duration::from_millis(1200))
    }

    #[tokio::test(start_paused = true)]
    async fn drains_up_to_the_window_capacity() {
        let limiter = limiter();
        for i in 0..5 {
            limiter.enqueue("ChatRoomChat", json!({ "Content": i.to_string() }));
        }

        let now = Instant::now();
        let sent = limiter.drain(now);
        assert_eq!(sent.len(), 3);
        assert_eq!(limiter.pending_count(), 2);

        // Window still full; nothing more goes out.
        assert!(limiter.drain(now).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn preserves_fifo_order_across_windows() {
        let limiter = limiter();
        for i in 0..5 {
            limiter.enqueue("ChatRoomChat", json!(i));
        }

        let start = Instant::now();
        let first: Vec<_> = limiter.drain(start).iter().map(|m| m.payload.clone()).collect();
        assert_eq!(first, vec![json!(0), json!(1), json!(2)]);

        tokio::time::advance(Duration::from_millis(1201)).await;
        let second: Vec<_> = limiter
            .drain(Instant::now())
            .iter()
            .map(|m| m.payload.clone())
            .collect();
        assert_eq!(second, vec![json!(3), json!(4)]);
        assert_eq!(limiter.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn window_frees_capacity_gradually() {
        let limiter = limiter();
        limiter.enqueue("A", json!(null));
        limiter.enqueue("B", json!(null));
        assert_eq!(limiter.drain(Instant::now()).len(), 2);

        tokio::time::advance(Duration::from_millis(600)).await;
        limiter.enqueue("C", json!(null));
        limiter.enqueue("D", json!(null));
        // One slot left inside the window.
        assert_eq!(limiter.drain(Instant::now()).len(), 1);

        tokio::time::advance(Duration::from_millis(700)).await;
        // First two stamps have aged out.
        assert_eq!(limiter.drain(Instant::now()).len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn clear_drops_queue_and_history() {
        let limiter = limiter();
        for _ in 0..5 {
            limiter.enqueue("A", json!(null));
        }
        limiter.drain(Instant::now());
        limiter.clear();

        assert_eq!(limiter.pending_count(), 0);
        limiter.enqueue("B", json!(null));
        // History cleared, so capacity is back to the full window.
        assert_eq!(limiter.drain(Instant::now()).len(), 1);
    }
}
