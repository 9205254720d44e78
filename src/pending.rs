//! Correlation of request futures with later server responses.
//!
//! The protocol has no message ids; a request is matched to its response by
//! a string key derived from the response event name (for example
//! `"LoginResponse"` or `"AccountQueryResult_Online"`). At most one request
//! per key is outstanding: issuing a second one cancels the first.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time::Instant;

use crate::error::{ParlorError, Result};
use crate::protocol::{
    AccountQueryResult, ChatRoomSearchResult, CreateAccountResult, LoginResult,
    PasswordResetResult, RoomCreateResult, RoomJoinResult,
};

/// Typed payload a pending request resolves with.
#[derive(Debug)]
pub(crate) enum ResponseValue {
    Login(LoginResult),
    Creation(CreateAccountResult),
    PasswordReset(PasswordResetResult),
    RoomJoin(RoomJoinResult),
    RoomCreate(RoomCreateResult),
    RoomUpdate(String),
    Search(Vec<ChatRoomSearchResult>),
    AllowItem(bool),
    AccountQuery(AccountQueryResult),
    LeaveAck,
}

struct Entry {
    tx: oneshot::Sender<Result<ResponseValue>>,
    deadline: Instant,
}

/// Table of in-flight requests, keyed by correlation key.
pub(crate) struct PendingRequests {
    timeout: Duration,
    entries: Mutex<HashMap<String, Entry>>,
}

/// Receiving half handed to the caller awaiting a response.
pub(crate) type Waiter = oneshot::Receiver<Result<ResponseValue>>;

impl PendingRequests {
    pub(crate) fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Register a request under `key` and return the future half.
    ///
    /// If a request is already outstanding under the same key it resolves
    /// with [`ParlorError::RequestCancelled`] immediately.
    pub(crate) fn create(&self, key: &str) -> Waiter {
        let (tx, rx) = oneshot::channel();
        let entry = Entry {
            tx,
            deadline: Instant::now() + self.timeout,
        };
        let previous = self.lock().insert(key.to_owned(), entry);
        if let Some(previous) = previous {
            let _ = previous.tx.send(Err(ParlorError::RequestCancelled));
        }
        rx
    }

    /// Resolve the request under `key` with a response value. Returns
    /// whether a request was waiting.
    pub(crate) fn complete(&self, key: &str, value: ResponseValue) -> bool {
        match self.lock().remove(key) {
            Some(entry) => entry.tx.send(Ok(value)).is_ok(),
            None => false,
        }
    }

    /// Fail every outstanding request with [`ParlorError::RequestCancelled`].
    pub(crate) fn cancel_all(&self) {
        let drained: Vec<Entry> = self.lock().drain().map(|(_, entry)| entry).collect();
        for entry in drained {
            let _ = entry.tx.send(Err(ParlorError::RequestCancelled));
        }
    }

    /// Fail every request whose deadline has passed with
    /// [`ParlorError::RequestTimeout`].
    pub(crate) fn expire_due(&self, now: Instant) {
        let expired: Vec<(String, Entry)> = {
            let mut entries = self.lock();
            let keys: Vec<String> = entries
                .iter()
                .filter(|(_, entry)| entry.deadline <= now)
                .map(|(key, _)| key.clone())
                .collect();
            keys.into_iter()
                .filter_map(|key| entries.remove(&key).map(|entry| (key, entry)))
                .collect()
        };
        for (key, entry) in expired {
            let _ = entry.tx.send(Err(ParlorError::RequestTimeout { key }));
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Entry>> {
        match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn complete_resolves_the_waiter() {
        let pending = PendingRequests::new(Duration::from_secs(30));
        let waiter = pending.create("ChatRoomUpdateResponse");

        assert!(pending.complete(
            "ChatRoomUpdateResponse",
            ResponseValue::RoomUpdate("Updated".to_owned()),
        ));

        match waiter.await.unwrap().unwrap() {
            ResponseValue::RoomUpdate(response) => assert_eq!(response, "Updated"),
            other => panic!("unexpected value: {other:?}"),
        }
    }

    #[tokio::test]
    async fn complete_without_waiter_reports_false() {
        let pending = PendingRequests::new(Duration::from_secs(30));
        assert!(!pending.complete("LoginResponse", ResponseValue::LeaveAck));
    }

    #[tokio::test]
    async fn second_request_cancels_the_first() {
        let pending = PendingRequests::new(Duration::from_secs(30));
        let first = pending.create("ChatRoomSearchResult");
        let second = pending.create("ChatRoomSearchResult");

        assert!(matches!(
            first.await.unwrap(),
            Err(ParlorError::RequestCancelled)
        ));

        assert!(pending.complete("ChatRoomSearchResult", ResponseValue::Search(Vec::new())));
        assert!(second.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn cancel_all_fails_everything() {
        let pending = PendingRequests::new(Duration::from_secs(30));
        let a = pending.create("LoginResponse");
        let b = pending.create("ChatRoomSearchResponse");

        pending.cancel_all();

        assert!(matches!(a.await.unwrap(), Err(ParlorError::RequestCancelled)));
        assert!(matches!(b.await.unwrap(), Err(ParlorError::RequestCancelled)));
    }

    #[tokio::test(start_paused = true)]
    async fn expire_due_times_out_only_overdue_requests() {
        let pending = PendingRequests::new(Duration::from_secs(30));
        let old = pending.create("LoginResponse");

        tokio::time::advance(Duration::from_secs(15)).await;
        let fresh = pending.create("CreationResponse");

        tokio::time::advance(Duration::from_secs(16)).await;
        pending.expire_due(Instant::now());

        match old.await.unwrap() {
            Err(ParlorError::RequestTimeout { key }) => assert_eq!(key, "LoginResponse"),
            other => panic!("unexpected result: {other:?}"),
        }

        // The fresh request is still pending.
        assert!(pending.complete("CreationResponse", ResponseValue::Creation(CreateAccountResult::Success)));
        assert!(fresh.await.unwrap().is_ok());
    }
}
