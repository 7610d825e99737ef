//! Test doubles for the transport, storage, and notification seams.
//!
//! Compiled for this crate's unit tests and, behind the `testing` feature,
//! for downstream integration tests.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use crate::checkout::{Notification, Notifier, Severity};
use crate::storage::{KeyValueStore, StorageError};
use crate::transport::{OutboundRequest, RawResponse, Transport, TransportError};

/// Transport that replays queued outcomes and records what was sent.
///
/// Responses queued for a path are served before the shared queue, which
/// keeps concurrent requests deterministic. When nothing matches every
/// request fails with a connect error, so an unexpected request shows up as
/// a transport failure rather than a hang.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Result<RawResponse, TransportError>>>,
    routed: Mutex<Vec<(String, RawResponse)>>,
    sent: Mutex<Vec<OutboundRequest>>,
}

impl ScriptedTransport {
    /// Create a transport with an empty script.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response with `status` and `body`.
    pub fn push_json(&self, status: u16, body: impl Into<String>) {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(Ok(RawResponse::new(status, body)));
    }

    /// Queue a response served only to the next request whose URL ends
    /// with `path`.
    pub fn push_json_to(&self, path: impl Into<String>, status: u16, body: impl Into<String>) {
        self.routed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((path.into(), RawResponse::new(status, body)));
    }

    /// Queue a failure with no response.
    pub fn push_failure(&self, error: TransportError) {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(Err(error));
    }

    /// Every request sent so far, oldest first.
    #[must_use]
    pub fn requests(&self) -> Vec<OutboundRequest> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The most recent request.
    #[must_use]
    pub fn last_request(&self) -> Option<OutboundRequest> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
    }

    /// Requests whose URL ends with `path`.
    #[must_use]
    pub fn requests_to(&self, path: &str) -> Vec<OutboundRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.url.ends_with(path))
            .collect()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: OutboundRequest) -> Result<RawResponse, TransportError> {
        let routed = {
            let mut routed = self.routed.lock().unwrap_or_else(PoisonError::into_inner);
            routed
                .iter()
                .position(|(path, _)| request.url.ends_with(path.as_str()))
                .map(|index| routed.remove(index).1)
        };
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request);
        if let Some(response) = routed {
            return Ok(response);
        }
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Connect("no scripted response".to_string())))
    }
}

/// Notifier that keeps every notification.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    seen: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    /// Create an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every notification so far.
    #[must_use]
    pub fn all(&self) -> Vec<Notification> {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of notifications with `severity`.
    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|n| n.severity == severity)
            .count()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: Notification) {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(notification);
    }
}

/// Store whose every operation fails, for exercising storage-failure paths.
#[derive(Debug, Default)]
pub struct FailingStore;

impl KeyValueStore for FailingStore {
    fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
        Err(StorageError::Unavailable("read refused".to_string()))
    }

    fn set(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
        Err(StorageError::Unavailable("quota exceeded".to_string()))
    }

    fn remove(&self, _key: &str) -> Result<(), StorageError> {
        Err(StorageError::Unavailable("write refused".to_string()))
    }
}
