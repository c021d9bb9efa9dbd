//! Local-memory session backend
//!
//! Records live in a process-local map and carry their own expiry instant, since there is
//! no store-native TTL. Liveness is checked before every read or write; dead records are
//! removed either on lookup or by the provider's periodic sweep.
//!
//! Locking: the map has its own lock and each record has another. Lookups clone the
//! record handle out of the map and release the map lock before touching the record.

mod provider;
mod session;
mod store;
mod sweeper;

pub use provider::MemoryProvider;
pub use session::MemorySession;
pub use store::MemoryStore;
pub use sweeper::DEFAULT_SWEEP_INTERVAL;
