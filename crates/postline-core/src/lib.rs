//! Postline core library: transport-agnostic messaging backend logic.
//!
//! `postline-core` holds everything the live-notification path needs
//! without knowing about HTTP or WebSockets, so the web crate only wires
//! transports onto it.
//!
//! # Modules
//!
//! - [`auth`]: signed session tokens ([`TokenService`]) and Argon2 password hashing.
//! - [`registry`]: per-user set of open live channels ([`ConnectionRegistry`]).
//! - [`dispatch`]: best-effort fan-out of events to a user's channels ([`Dispatcher`]).
//! - [`gate`]: token check and registration of new live channels ([`SessionGate`]).
//! - [`event`]: the closed set of notification events and their JSON shape.
//! - [`store`]: persistence collaborator trait and an in-memory implementation.
//! - [`error`]: unified error type ([`CoreError`]) and result alias ([`CoreResult`]).

pub mod auth;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod gate;
pub mod registry;
pub mod store;

pub use auth::password::{hash_password, verify_password};
pub use auth::token::{IssuedToken, TokenService};
pub use dispatch::Dispatcher;
pub use error::{CoreError, CoreResult};
pub use event::{MessageNotice, NotificationEvent};
pub use gate::{Admission, SessionGate};
pub use registry::{ConnectionHandle, ConnectionId, ConnectionRegistry};
pub use store::{InMemoryStore, Message, Store, User};
