//! Admission of live channels.
//!
//! A transport accepts the handshake, hands the presented token to
//! [`SessionGate::admit`] and, on success, keeps the returned [`Admission`]
//! alive for as long as the channel is open. Dropping the admission
//! unregisters the channel.

use std::sync::Arc;

use tokio::sync::mpsc::UnboundedReceiver;

use crate::auth::token::TokenService;
use crate::error::{CoreError, CoreResult};
use crate::registry::{ConnectionHandle, ConnectionRegistry};

pub struct SessionGate {
    tokens: Arc<TokenService>,
    registry: Arc<ConnectionRegistry>,
}

impl SessionGate {
    pub fn new(tokens: Arc<TokenService>, registry: Arc<ConnectionRegistry>) -> Self {
        Self { tokens, registry }
    }

    /// Verifies `token` and registers a new channel for its subject.
    ///
    /// Returns the admission together with the queue of serialized events
    /// the transport must forward to the client. A missing or invalid token
    /// fails with [`CoreError::AuthInvalid`] and registers nothing.
    pub fn admit(&self, token: Option<&str>) -> CoreResult<(Admission, UnboundedReceiver<String>)> {
        let token = match token {
            Some(t) if !t.is_empty() => t,
            _ => {
                tracing::warn!("live channel rejected: missing token");
                return Err(CoreError::AuthInvalid);
            }
        };

        let subject = self.tokens.verify(token).inspect_err(|_| {
            tracing::warn!("live channel rejected: invalid token");
        })?;

        let (handle, events) = ConnectionHandle::channel(subject.clone());
        self.registry.register(&subject, handle.clone());
        tracing::info!(user = %subject, connection = %handle.id(), "live channel admitted");

        let admission = Admission {
            registry: Arc::clone(&self.registry),
            subject,
            handle,
        };
        Ok((admission, events))
    }
}

/// An admitted live channel. Unregisters itself exactly once when dropped.
pub struct Admission {
    registry: Arc<ConnectionRegistry>,
    subject: String,
    handle: ConnectionHandle,
}

impl Admission {
    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn handle(&self) -> &ConnectionHandle {
        &self.handle
    }
}

impl Drop for Admission {
    fn drop(&mut self) {
        self.registry.unregister(&self.subject, &self.handle);
        tracing::info!(user = %self.subject, connection = %self.handle.id(), "live channel closed");
    }
}
