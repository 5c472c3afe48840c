//! Best-effort fan-out of notification events to live channels.

use std::sync::Arc;

use crate::event::NotificationEvent;
use crate::registry::ConnectionRegistry;

/// Fans notification events out to a user's open live channels.
///
/// Delivery is best-effort: callers commit their state change first and
/// then call [`Dispatcher::notify`], which never fails. Handles whose
/// channel has closed are pruned from the registry as they are found.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<ConnectionRegistry>,
}

impl Dispatcher {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Pushes `event` to every open channel of `username`.
    ///
    /// Returns how many channels accepted the event. Zero open channels is
    /// not an error.
    pub fn notify(&self, username: &str, event: &NotificationEvent) -> usize {
        let connections = self.registry.connections_for(username);
        if connections.is_empty() {
            tracing::trace!(user = username, event = event.kind(), "no live connections");
            return 0;
        }

        let payload = match event.to_json() {
            Ok(json) => json,
            Err(e) => {
                tracing::error!(user = username, event = event.kind(), "{e}");
                return 0;
            }
        };

        let mut delivered = 0;
        for handle in &connections {
            match handle.push(payload.clone()) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    tracing::warn!(
                        user = username,
                        connection = %handle.id(),
                        "{e}; pruning connection"
                    );
                    self.registry.unregister(username, handle);
                }
            }
        }

        tracing::debug!(
            user = username,
            event = event.kind(),
            delivered,
            total = connections.len(),
            "notification dispatched"
        );
        delivered
    }
}
