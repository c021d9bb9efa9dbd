//! Startup-time provider construction
//!
//! The backend and carrier are chosen once from [`SessionConfig`]; the rest of the
//! application holds the returned provider and passes it where it is needed.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::config::{BackendConfig, SessionConfig};
use crate::durable::{DurableProvider, RedisStore};
use crate::error::Result;
use crate::memory::MemoryProvider;
use crate::session::SessionProvider;

/// Build the provider described by `config`
///
/// Connects to Redis when the durable backend is selected. A memory provider must be
/// built inside a tokio runtime, since it starts its sweeper immediately.
///
/// # Errors
///
/// Returns [`crate::SessionError::Config`] if the configuration is invalid and
/// [`crate::SessionError::Backend`] if the Redis server cannot be reached.
pub async fn build_provider(config: &SessionConfig) -> Result<Arc<dyn SessionProvider>> {
    config.validate()?;

    let issuer = config.token_issuer()?;
    let carrier = config.carrier.build()?;
    let refresh = config.refresh_channel()?;
    let carrier_name = carrier.name();

    let provider: Arc<dyn SessionProvider> = match &config.backend {
        BackendConfig::Memory {
            sweep_interval_secs,
        } => Arc::new(MemoryProvider::with_channels(
            issuer,
            carrier,
            refresh,
            Duration::from_secs(*sweep_interval_secs),
        )?),
        BackendConfig::Redis { url, key_prefix } => {
            let store = Arc::new(RedisStore::connect(url).await?);
            Arc::new(
                DurableProvider::with_channels(issuer, carrier, refresh, store)?
                    .with_key_prefix(key_prefix.clone()),
            )
        }
    };

    info!(
        backend = backend_name(&config.backend),
        carrier = carrier_name,
        "Session provider ready"
    );
    Ok(provider)
}

fn backend_name(backend: &BackendConfig) -> &'static str {
    match backend {
        BackendConfig::Memory { .. } => "memory",
        BackendConfig::Redis { .. } => "redis",
    }
}
