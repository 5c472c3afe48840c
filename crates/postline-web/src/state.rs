use std::sync::Arc;

use postline_core::{ConnectionRegistry, Dispatcher, SessionGate, Store, TokenService};

use crate::config::ServerConfig;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub store: Arc<dyn Store>,
    pub tokens: Arc<TokenService>,
    pub dispatcher: Dispatcher,
    pub gate: Arc<SessionGate>,
}

impl AppState {
    /// Wires the token service, the single connection registry and the
    /// components sharing it.
    pub fn new(config: ServerConfig, store: Arc<dyn Store>) -> Self {
        let tokens = Arc::new(TokenService::new(
            config.auth.jwt_secret.as_bytes(),
            config.auth.token_ttl(),
        ));
        let registry = Arc::new(ConnectionRegistry::new());

        Self {
            dispatcher: Dispatcher::new(Arc::clone(&registry)),
            gate: Arc::new(SessionGate::new(Arc::clone(&tokens), registry)),
            config: Arc::new(config),
            store,
            tokens,
        }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        self.dispatcher.registry()
    }
}
