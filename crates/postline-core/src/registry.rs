//! Process-wide registry of open live channels, keyed by username.
//!
//! A user may hold several channels at once (one per device or tab). The
//! registry owns every [`ConnectionHandle`]; removing a handle from it is
//! what ends the handle's life. All mutation goes through
//! [`ConnectionRegistry::register`] and [`ConnectionRegistry::unregister`].

use std::fmt;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::error::{CoreError, CoreResult};

/// Server-generated identity of one live channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionId(uuid::Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Send capability for one open live channel.
///
/// Pushes go into an unbounded FIFO queue drained by the channel's writer
/// task, so events reach the client in the order they were pushed. Once the
/// writer side is gone every push fails with [`CoreError::DispatchFailure`].
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    username: String,
    sender: UnboundedSender<String>,
}

impl ConnectionHandle {
    /// Creates a handle for `username` and the receiving end its writer drains.
    pub fn channel(username: impl Into<String>) -> (Self, UnboundedReceiver<String>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let handle = Self {
            id: ConnectionId::new(),
            username: username.into(),
            sender,
        };
        (handle, receiver)
    }

    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// Queues a serialized event for delivery.
    pub fn push(&self, payload: String) -> CoreResult<()> {
        self.sender
            .send(payload)
            .map_err(|_| CoreError::DispatchFailure(format!("connection {} is closed", self.id)))
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

/// Concurrent username → handles map.
///
/// Each operation holds the shard lock of a single entry for its whole
/// duration, so operations on one username are linearizable and callers
/// never see a half-updated collection.
#[derive(Default)]
pub struct ConnectionRegistry {
    entries: DashMap<String, Vec<ConnectionHandle>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `handle` under `username`, creating the entry if absent.
    pub fn register(&self, username: &str, handle: ConnectionHandle) {
        tracing::debug!(user = username, connection = %handle.id, "registering connection");
        self.entries
            .entry(username.to_string())
            .or_default()
            .push(handle);
    }

    /// Removes exactly `handle` from `username`'s entry, dropping the entry
    /// when it becomes empty. Unknown handles are ignored.
    ///
    /// Returns whether a handle was actually removed.
    pub fn unregister(&self, username: &str, handle: &ConnectionHandle) -> bool {
        let Entry::Occupied(mut entry) = self.entries.entry(username.to_string()) else {
            return false;
        };

        let before = entry.get().len();
        entry.get_mut().retain(|h| h.id != handle.id);
        let removed = entry.get().len() != before;

        if entry.get().is_empty() {
            entry.remove();
        }

        if removed {
            tracing::debug!(user = username, connection = %handle.id, "unregistered connection");
        }
        removed
    }

    /// Point-in-time copy of `username`'s handles.
    ///
    /// Any of them may close right after this returns; pushing to a closed
    /// handle fails without panicking.
    pub fn connections_for(&self, username: &str) -> Vec<ConnectionHandle> {
        self.entries
            .get(username)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }

    pub fn is_connected(&self, username: &str) -> bool {
        self.entries.contains_key(username)
    }

    /// Number of users with at least one open channel.
    pub fn user_count(&self) -> usize {
        self.entries.len()
    }

    /// Total number of open channels across all users.
    pub fn connection_count(&self) -> usize {
        self.entries.iter().map(|entry| entry.value().len()).sum()
    }
}
