//! Debounced account synchronization.
//!
//! Account field writes are chatty (position, pose, settings) so they are
//! batched: a flush happens once writes go quiet for the debounce interval,
//! and no later than the max-wait interval after the first queued write.
//! Later writes to the same field overwrite earlier ones within a batch.

use std::sync::Mutex;
use std::time::Duration;

use serde_json::{Map, Value};
use tokio::time::Instant;

/// An explicit patch of account fields.
///
/// Fields not mentioned in the patch stay untouched on the server. Setting
/// a field to JSON `null` (via [`set_null`](Self::set_null)) is a distinct
/// operation that clears it, which is why this is its own type rather than
/// a map of options.
#[derive(Debug, Clone, Default)]
pub struct AccountPatch {
    fields: Map<String, Value>,
}

impl AccountPatch {
    /// An empty patch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `field` to `value`.
    #[must_use]
    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    /// Clear `field` on the server by writing an explicit JSON `null`.
    #[must_use]
    pub fn set_null(mut self, field: impl Into<String>) -> Self {
        self.fields.insert(field.into(), Value::Null);
        self
    }

    /// Whether the patch mentions no fields at all.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub(crate) fn into_fields(self) -> Map<String, Value> {
        self.fields
    }
}

struct Inner {
    batch: Map<String, Value>,
    batch_start: Option<Instant>,
    deadline: Option<Instant>,
}

/// Batches account patches and tracks when the batch is due to flush.
pub(crate) struct AccountUpdater {
    debounce: Duration,
    max_wait: Duration,
    inner: Mutex<Inner>,
}

impl AccountUpdater {
    pub(crate) fn new(debounce: Duration, max_wait: Duration) -> Self {
        Self {
            debounce,
            max_wait,
            inner: Mutex::new(Inner {
                batch: Map::new(),
                batch_start: None,
                deadline: None,
            }),
        }
    }

    /// Merge `fields` into the batch. Returns `true` when the caller should
    /// flush immediately (forced flush).
    ///
    /// Otherwise the flush deadline moves to `now + debounce`, clamped so
    /// it never lands later than `batch_start + max_wait`.
    pub(crate) fn queue(&self, fields: Map<String, Value>, force: bool, now: Instant) -> bool {
        let mut inner = self.lock();
        inner.batch.extend(fields);
        if force {
            return true;
        }
        let start = *inner.batch_start.get_or_insert(now);
        let elapsed = now.saturating_duration_since(start);
        let delay = if elapsed >= self.max_wait {
            Duration::ZERO
        } else {
            self.debounce.min(self.max_wait - elapsed)
        };
        inner.deadline = Some(now + delay);
        false
    }

    /// Take the whole batch unconditionally. `None` when nothing is queued.
    pub(crate) fn take_batch(&self) -> Option<Map<String, Value>> {
        let mut inner = self.lock();
        inner.deadline = None;
        inner.batch_start = None;
        if inner.batch.is_empty() {
            return None;
        }
        Some(std::mem::take(&mut inner.batch))
    }

    /// Take the batch only if its deadline has passed.
    pub(crate) fn take_due(&self, now: Instant) -> Option<Map<String, Value>> {
        if self.lock().deadline.is_some_and(|deadline| deadline <= now) {
            self.take_batch()
        } else {
            None
        }
    }

    /// Drop the batch without sending it.
    pub(crate) fn clear(&self) {
        let mut inner = self.lock();
        inner.batch.clear();
        inner.batch_start = None;
        inner.deadline = None;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use serde_json::json;

    use super::*;

    fn updater() -> AccountUpdater {
        AccountUpdater::new(Duration::from_secs(2), Duration::from_secs(8))
    }

    fn fields(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), v.clone()))
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn later_writes_overwrite_earlier_ones() {
        let updater = updater();
        let now = Instant::now();
        updater.queue(fields(&[("LabelColor", json!("#FF0000"))]), false, now);
        updater.queue(fields(&[("LabelColor", json!("#00FF00"))]), false, now);

        let batch = updater.take_batch().unwrap();
        assert_eq!(batch.get("LabelColor"), Some(&json!("#00FF00")));
        assert_eq!(batch.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn quiet_batch_is_due_after_the_debounce() {
        let updater = updater();
        updater.queue(fields(&[("Title", json!("None"))]), false, Instant::now());

        tokio::time::advance(Duration::from_millis(1999)).await;
        assert!(updater.take_due(Instant::now()).is_none());

        tokio::time::advance(Duration::from_millis(1)).await;
        let batch = updater.take_due(Instant::now()).unwrap();
        assert_eq!(batch.len(), 1);
        assert!(updater.take_due(Instant::now()).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn steady_writes_flush_at_the_max_wait() {
        let updater = updater();
        let start = Instant::now();
        updater.queue(fields(&[("F0", json!(0))]), false, start);

        // A write every second keeps resetting the debounce, but the
        // deadline may never move past start + 8s.
        for i in 1..=7u64 {
            tokio::time::advance(Duration::from_secs(1)).await;
            assert!(updater.take_due(Instant::now()).is_none());
            updater.queue(fields(&[("F0", json!(i))]), false, Instant::now());
        }

        tokio::time::advance(Duration::from_secs(1)).await;
        let batch = updater.take_due(Instant::now()).unwrap();
        assert_eq!(batch.get("F0"), Some(&json!(7)));
    }

    #[tokio::test(start_paused = true)]
    async fn forced_queue_asks_for_immediate_flush() {
        let updater = updater();
        assert!(!updater.queue(fields(&[("A", json!(1))]), false, Instant::now()));
        assert!(updater.queue(fields(&[("B", json!(2))]), true, Instant::now()));

        let batch = updater.take_batch().unwrap();
        assert_eq!(batch.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn explicit_null_survives_the_merge() {
        let updater = updater();
        updater.queue(
            AccountPatch::new().set_null("Nickname").into_fields(),
            false,
            Instant::now(),
        );

        let batch = updater.take_batch().unwrap();
        assert_eq!(batch.get("Nickname"), Some(&Value::Null));
    }

    #[tokio::test(start_paused = true)]
    async fn clear_discards_the_batch() {
        let updater = updater();
        updater.queue(fields(&[("A", json!(1))]), false, Instant::now());
        updater.clear();

        assert!(updater.take_batch().is_none());
        assert!(updater.take_due(Instant::now()).is_none());
    }
}
