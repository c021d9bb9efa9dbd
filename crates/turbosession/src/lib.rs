//! # TurboSession - Dual-Token Session Management
//!
//! Authenticated HTTP sessions built from a short-lived **access token**, a long-lived
//! **refresh token** and a server-side **session record** holding mutable state.
//!
//! ## Design Principles
//!
//! - **Offline verification, store-backed revocation**: tokens verify without I/O, but a
//!   session only resolves while its record exists, so destroying the record logs out
//! - **Two backends, one interface**: a shared Redis store and a process-local store
//!   behind the same [`SessionProvider`] and [`Session`] traits, chosen at startup
//! - **Pluggable transport**: the access token rides a header or a cookie; the refresh
//!   token always rides its own fixed header
//! - **Explicit injection**: providers are values passed to the code that needs them
//!
//! ## Architecture
//!
//! - [`jwt`] - claim set, token kinds and the HMAC [`TokenIssuer`]
//! - [`session`] - [`Session`] and [`SessionProvider`] traits
//! - [`durable`] - Redis-backed records ([`DurableProvider`])
//! - [`memory`] - in-process records with a periodic sweep ([`MemoryProvider`])
//! - [`carrier`] - [`HeaderCarrier`], [`CookieCarrier`] and the [`RefreshChannel`]
//! - [`context`] - per-request [`RequestContext`]
//! - [`config`] - [`SessionConfig`], loadable from file and environment
//! - [`builder`] - [`build_provider`] from a [`SessionConfig`]
//! - [`error`] - [`SessionError`] and its [`ErrorCategory`]
//!
//! ## Quick Start
//!
//! ```rust
//! use std::collections::HashMap;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use serde_json::json;
//! use turbosession::{
//!     HeaderCarrier, MemoryProvider, RequestContext, Session, SessionProvider, TokenIssuer,
//! };
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> turbosession::Result<()> {
//! let issuer = TokenIssuer::new(
//!     "change-me",
//!     Duration::from_secs(15 * 60),
//!     Duration::from_secs(7 * 24 * 3600),
//! )?;
//! let provider = MemoryProvider::new(issuer, Arc::new(HeaderCarrier::default()))?;
//!
//! let mut login = RequestContext::default();
//! let mut data = HashMap::new();
//! data.insert("login_ip".to_string(), json!("127.0.0.1"));
//! let session = provider
//!     .create_session(&mut login, "u1", HashMap::new(), data)
//!     .await?;
//!
//! assert_eq!(session.claims().subject, "u1");
//! assert_eq!(session.get("login_ip").await?, json!("127.0.0.1"));
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod carrier;
pub mod config;
pub mod context;
pub mod durable;
pub mod error;
pub mod jwt;
pub mod memory;
pub mod session;

#[doc(inline)]
pub use builder::build_provider;

#[doc(inline)]
pub use carrier::{CookieCarrier, HeaderCarrier, RefreshChannel, SameSite, TokenCarrier};

#[doc(inline)]
pub use config::{BackendConfig, CarrierConfig, ConfigError, SessionConfig};

#[doc(inline)]
pub use context::RequestContext;

#[doc(inline)]
pub use durable::{DurableProvider, DurableSession, RedisStore, SessionStore};

#[doc(inline)]
pub use error::{ErrorCategory, Result, SessionError, TokenError};

#[doc(inline)]
pub use jwt::{Claims, TokenIssuer, TokenKind, TokenPair};

#[doc(inline)]
pub use memory::{MemoryProvider, MemorySession, MemoryStore};

#[doc(inline)]
pub use session::{Session, SessionExt, SessionHandle, SessionProvider};
