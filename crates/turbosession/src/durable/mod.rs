//! Durable session backend
//!
//! Each session is one hash in a shared store, addressed by a fixed namespace prefix plus
//! the session id, with the session lifetime pushed to the store as a key TTL. Multiple
//! service instances pointed at the same store see the same sessions.
//!
//! - [`SessionStore`] - the hash + TTL operations the backend needs
//! - [`RedisStore`] - `SessionStore` over a Redis multiplexed connection
//! - [`DurableSession`] - a session record backed by the store
//! - [`DurableProvider`] - the provider binding issuer, carrier and store

mod provider;
mod session;
mod store;

pub use provider::DurableProvider;
pub use session::DurableSession;
pub use store::{RedisStore, SessionStore};

/// Default namespace for session keys
pub const DEFAULT_KEY_PREFIX: &str = "turbosession:session:";
