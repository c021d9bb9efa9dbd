//! Session subsystem configuration
//!
//! Everything needed to build a provider at startup: the signing secret, both token
//! lifetimes, the backend and the access-token carrier. Loadable from a TOML/YAML/JSON
//! file with `TURBOSESSION_`-prefixed environment overrides, or built in code.
//!
//! ```toml
//! signing_secret = "change-me"
//! access_ttl_secs = 900
//!
//! [backend]
//! type = "redis"
//! url = "redis://127.0.0.1:6379/"
//!
//! [carrier]
//! type = "cookie"
//! name = "sid"
//! secure = true
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use http::HeaderName;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::carrier::{
    CookieCarrier, DEFAULT_REFRESH_HEADER, HeaderCarrier, RefreshChannel, SameSite, TokenCarrier,
    cookie::DEFAULT_COOKIE_NAME,
};
use crate::durable::DEFAULT_KEY_PREFIX;
use crate::error::SessionError;
use crate::jwt::TokenIssuer;
use crate::jwt::issuer::DEFAULT_ISSUER;

/// Environment variable prefix used by [`SessionConfig::from_file`]
pub const ENV_PREFIX: &str = "TURBOSESSION";

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file not found
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    /// Unsupported file format
    #[error("Unsupported configuration file format. Use .toml, .yaml, .yml, or .json")]
    UnsupportedFormat,

    /// Parse or deserialization error
    #[error("Failed to parse configuration: {0}")]
    ParseError(#[from] config::ConfigError),

    /// Values parsed but are inconsistent
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl From<ConfigError> for SessionError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Invalid(reason) => SessionError::Config(reason),
            other => SessionError::Config(other.to_string()),
        }
    }
}

/// Session backend selection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BackendConfig {
    /// Process-local store
    Memory {
        /// Seconds between sweep passes
        #[serde(default = "default_sweep_interval_secs")]
        sweep_interval_secs: u64,
    },
    /// Shared Redis store
    Redis {
        /// Connection URL, e.g. `redis://127.0.0.1:6379/`
        url: String,
        /// Namespace prepended to session ids
        #[serde(default = "default_key_prefix")]
        key_prefix: String,
    },
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig::Memory {
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

/// Access-token carrier selection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CarrierConfig {
    /// Named request/response header
    Header {
        /// Header name
        #[serde(default = "default_header_name")]
        name: String,
    },
    /// Cookie
    Cookie {
        /// Cookie name
        #[serde(default = "default_cookie_name")]
        name: String,
        /// `Domain` attribute
        #[serde(default)]
        domain: Option<String>,
        /// `Path` attribute
        #[serde(default = "default_cookie_path")]
        path: String,
        /// `Max-Age` attribute in seconds
        #[serde(default = "default_cookie_max_age_secs")]
        max_age_secs: u64,
        /// `Secure` attribute
        #[serde(default)]
        secure: bool,
        /// `HttpOnly` attribute
        #[serde(default = "default_true")]
        http_only: bool,
        /// `SameSite` attribute
        #[serde(default)]
        same_site: Option<SameSite>,
    },
}

impl Default for CarrierConfig {
    fn default() -> Self {
        CarrierConfig::Header {
            name: default_header_name(),
        }
    }
}

impl CarrierConfig {
    /// Cookie carrier with default attributes
    pub fn cookie() -> Self {
        CarrierConfig::Cookie {
            name: default_cookie_name(),
            domain: None,
            path: default_cookie_path(),
            max_age_secs: default_cookie_max_age_secs(),
            secure: false,
            http_only: true,
            same_site: None,
        }
    }

    /// Build the configured carrier
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Config`] for an invalid header or cookie name.
    pub fn build(&self) -> Result<Arc<dyn TokenCarrier>, SessionError> {
        let carrier: Arc<dyn TokenCarrier> = match self {
            CarrierConfig::Header { name } => Arc::new(HeaderCarrier::new(name)?),
            CarrierConfig::Cookie {
                name,
                domain,
                path,
                max_age_secs,
                secure,
                http_only,
                same_site,
            } => {
                let mut carrier = CookieCarrier::new(name)?
                    .with_path(path.clone())
                    .with_max_age(Duration::from_secs(*max_age_secs))
                    .with_secure(*secure)
                    .with_http_only(*http_only);
                if let Some(domain) = domain {
                    carrier = carrier.with_domain(domain.clone());
                }
                if let Some(same_site) = same_site {
                    carrier = carrier.with_same_site(*same_site);
                }
                Arc::new(carrier)
            }
        };
        Ok(carrier)
    }
}

/// Session subsystem configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Shared HMAC signing secret
    #[serde(deserialize_with = "deserialize_secret")]
    pub signing_secret: SecretString,
    /// Issuer stamped into and required from every token
    #[serde(default = "default_issuer")]
    pub issuer: String,
    /// Access token lifetime in seconds (recommended 15 min to 2 h)
    #[serde(default = "default_access_ttl_secs")]
    pub access_ttl_secs: u64,
    /// Refresh token and session lifetime in seconds (recommended 7 to 30 days)
    #[serde(default = "default_refresh_ttl_secs")]
    pub refresh_ttl_secs: u64,
    /// Clock-skew tolerance in seconds
    #[serde(default)]
    pub leeway_secs: u64,
    /// Header carrying the refresh token
    #[serde(default = "default_refresh_header")]
    pub refresh_header: String,
    /// Backend selection
    #[serde(default)]
    pub backend: BackendConfig,
    /// Access-token carrier selection
    #[serde(default)]
    pub carrier: CarrierConfig,
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<SecretString, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    Ok(SecretString::new(s))
}

fn default_issuer() -> String {
    DEFAULT_ISSUER.to_string()
}

fn default_access_ttl_secs() -> u64 {
    2 * 60 * 60
}

fn default_refresh_ttl_secs() -> u64 {
    7 * 24 * 60 * 60
}

fn default_refresh_header() -> String {
    DEFAULT_REFRESH_HEADER.to_string()
}

fn default_sweep_interval_secs() -> u64 {
    300
}

fn default_key_prefix() -> String {
    DEFAULT_KEY_PREFIX.to_string()
}

fn default_header_name() -> String {
    "Authorization".to_string()
}

fn default_cookie_name() -> String {
    DEFAULT_COOKIE_NAME.to_string()
}

fn default_cookie_path() -> String {
    "/".to_string()
}

fn default_cookie_max_age_secs() -> u64 {
    24 * 60 * 60
}

fn default_true() -> bool {
    true
}

impl SessionConfig {
    /// Configuration with defaults and the given secret
    pub fn new(signing_secret: impl Into<String>) -> Self {
        Self {
            signing_secret: SecretString::new(signing_secret.into()),
            issuer: default_issuer(),
            access_ttl_secs: default_access_ttl_secs(),
            refresh_ttl_secs: default_refresh_ttl_secs(),
            leeway_secs: 0,
            refresh_header: default_refresh_header(),
            backend: BackendConfig::default(),
            carrier: CarrierConfig::default(),
        }
    }

    /// Load configuration from a file, with `TURBOSESSION_` environment overrides
    ///
    /// The format follows the extension (`.toml`, `.yaml`/`.yml`, `.json`). Nested keys
    /// use `__`, e.g. `TURBOSESSION_BACKEND__URL`. The result is validated.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file is missing, has an unsupported extension,
    /// cannot be parsed, or fails [`SessionConfig::validate`].
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_file_with_prefix(path, ENV_PREFIX)
    }

    /// Load configuration from a file with a custom environment prefix
    ///
    /// # Errors
    ///
    /// Same as [`SessionConfig::from_file`].
    pub fn from_file_with_prefix(
        path: impl AsRef<Path>,
        env_prefix: &str,
    ) -> Result<Self, ConfigError> {
        use config::{Config, Environment, File, FileFormat};

        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let format = match path.extension().and_then(|s| s.to_str()) {
            Some("toml") => FileFormat::Toml,
            Some("yaml" | "yml") => FileFormat::Yaml,
            Some("json") => FileFormat::Json,
            _ => return Err(ConfigError::UnsupportedFormat),
        };

        let config = Config::builder()
            .add_source(File::new(
                path.to_str().ok_or(ConfigError::UnsupportedFormat)?,
                format,
            ))
            .add_source(
                Environment::with_prefix(env_prefix)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let session_config: Self = config.try_deserialize()?;
        session_config.validate()?;
        Ok(session_config)
    }

    /// Set the issuer
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = issuer.into();
        self
    }

    /// Set the access token lifetime
    pub fn with_access_ttl(mut self, ttl: Duration) -> Self {
        self.access_ttl_secs = ttl.as_secs();
        self
    }

    /// Set the refresh token and session lifetime
    pub fn with_refresh_ttl(mut self, ttl: Duration) -> Self {
        self.refresh_ttl_secs = ttl.as_secs();
        self
    }

    /// Set the clock-skew tolerance
    pub fn with_leeway(mut self, leeway: Duration) -> Self {
        self.leeway_secs = leeway.as_secs();
        self
    }

    /// Set the refresh header
    pub fn with_refresh_header(mut self, name: impl Into<String>) -> Self {
        self.refresh_header = name.into();
        self
    }

    /// Select the backend
    pub fn with_backend(mut self, backend: BackendConfig) -> Self {
        self.backend = backend;
        self
    }

    /// Select the carrier
    pub fn with_carrier(mut self, carrier: CarrierConfig) -> Self {
        self.carrier = carrier;
        self
    }

    /// Access token lifetime
    pub fn access_ttl(&self) -> Duration {
        Duration::from_secs(self.access_ttl_secs)
    }

    /// Refresh token and session lifetime
    pub fn refresh_ttl(&self) -> Duration {
        Duration::from_secs(self.refresh_ttl_secs)
    }

    /// Check the values are usable together
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason: &str| Err(ConfigError::Invalid(reason.to_string()));

        if self.signing_secret.expose_secret().is_empty() {
            return invalid("signing_secret must not be empty");
        }
        if self.issuer.is_empty() {
            return invalid("issuer must not be empty");
        }
        if self.access_ttl_secs == 0 || self.refresh_ttl_secs == 0 {
            return invalid("token TTLs must be greater than zero");
        }
        if self.access_ttl_secs >= self.refresh_ttl_secs {
            return invalid("access_ttl_secs must be shorter than refresh_ttl_secs");
        }

        let refresh_header = HeaderName::from_bytes(self.refresh_header.as_bytes())
            .map_err(|_| ConfigError::Invalid("refresh_header is not a valid header name".into()))?;

        match &self.backend {
            BackendConfig::Memory {
                sweep_interval_secs: 0,
            } => return invalid("sweep_interval_secs must be greater than zero"),
            BackendConfig::Redis { url, .. } if url.is_empty() => {
                return invalid("redis url must not be empty");
            }
            _ => {}
        }

        match &self.carrier {
            CarrierConfig::Header { name } => {
                let header = HeaderName::from_bytes(name.as_bytes()).map_err(|_| {
                    ConfigError::Invalid("carrier header name is not a valid header name".into())
                })?;
                if header == refresh_header {
                    return invalid("carrier header must differ from refresh_header");
                }
            }
            CarrierConfig::Cookie { .. } => {
                self.carrier
                    .build()
                    .map_err(|e| ConfigError::Invalid(e.to_string()))?;
            }
        }

        Ok(())
    }

    /// Build the token issuer described by this configuration
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Config`] for an empty secret or zero TTL.
    pub fn token_issuer(&self) -> Result<TokenIssuer, SessionError> {
        Ok(
            TokenIssuer::from_secret(&self.signing_secret, self.access_ttl(), self.refresh_ttl())?
                .with_issuer(self.issuer.clone())
                .with_leeway(Duration::from_secs(self.leeway_secs)),
        )
    }

    /// Build the refresh channel
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Config`] for an invalid header name.
    pub fn refresh_channel(&self) -> Result<RefreshChannel, SessionError> {
        RefreshChannel::new(&self.refresh_header)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    fn write_config(extension: &str, contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(&format!(".{extension}"))
            .tempfile()
            .unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults() {
        let config = SessionConfig::new("secret");
        assert_eq!(config.issuer, "turbosession");
        assert_eq!(config.access_ttl(), Duration::from_secs(7200));
        assert_eq!(config.refresh_ttl(), Duration::from_secs(604_800));
        assert_eq!(config.refresh_header, "X-Refresh-Token");
        assert_eq!(
            config.backend,
            BackendConfig::Memory {
                sweep_interval_secs: 300
            }
        );
        assert_eq!(
            config.carrier,
            CarrierConfig::Header {
                name: "Authorization".to_string()
            }
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_failures() {
        assert!(SessionConfig::new("").validate().is_err());
        assert!(
            SessionConfig::new("s")
                .with_access_ttl(Duration::from_secs(600))
                .with_refresh_ttl(Duration::from_secs(600))
                .validate()
                .is_err()
        );
        assert!(
            SessionConfig::new("s")
                .with_access_ttl(Duration::ZERO)
                .validate()
                .is_err()
        );
        assert!(
            SessionConfig::new("s")
                .with_carrier(CarrierConfig::Header {
                    name: "x-refresh-token".to_string()
                })
                .validate()
                .is_err()
        );
        assert!(
            SessionConfig::new("s")
                .with_backend(BackendConfig::Memory {
                    sweep_interval_secs: 0
                })
                .validate()
                .is_err()
        );
        assert!(
            SessionConfig::new("s")
                .with_refresh_header("bad header")
                .validate()
                .is_err()
        );
    }

    #[test]
    fn test_invalid_converts_to_session_error() {
        let err: SessionError = SessionConfig::new("").validate().unwrap_err().into();
        assert!(matches!(err, SessionError::Config(ref r) if r.contains("signing_secret")));
        assert_eq!(err.to_http_status(), 500);
    }

    #[test]
    fn test_from_toml_file() {
        let file = write_config(
            "toml",
            r#"
signing_secret = "file-secret"
access_ttl_secs = 900
leeway_secs = 5

[backend]
type = "redis"
url = "redis://127.0.0.1:6379/"

[carrier]
type = "cookie"
name = "sid"
secure = true
same_site = "Lax"
"#,
        );

        let config = SessionConfig::from_file_with_prefix(file.path(), "TURBOSESSION_TEST_TOML")
            .unwrap();
        assert_eq!(config.signing_secret.expose_secret(), "file-secret");
        assert_eq!(config.access_ttl(), Duration::from_secs(900));
        assert_eq!(config.refresh_ttl(), Duration::from_secs(604_800));
        assert_eq!(config.leeway_secs, 5);
        assert_eq!(
            config.backend,
            BackendConfig::Redis {
                url: "redis://127.0.0.1:6379/".to_string(),
                key_prefix: "turbosession:session:".to_string(),
            }
        );
        assert_eq!(
            config.carrier,
            CarrierConfig::Cookie {
                name: "sid".to_string(),
                domain: None,
                path: "/".to_string(),
                max_age_secs: 86_400,
                secure: true,
                http_only: true,
                same_site: Some(SameSite::Lax),
            }
        );
    }

    #[test]
    fn test_from_json_file() {
        let file = write_config(
            "json",
            r#"{"signing_secret": "j", "carrier": {"type": "header", "name": "X-Access-Token"}}"#,
        );
        let config = SessionConfig::from_file_with_prefix(file.path(), "TURBOSESSION_TEST_JSON")
            .unwrap();
        assert_eq!(
            config.carrier,
            CarrierConfig::Header {
                name: "X-Access-Token".to_string()
            }
        );
    }

    #[test]
    fn test_file_errors() {
        assert!(matches!(
            SessionConfig::from_file("/nonexistent/turbosession.toml"),
            Err(ConfigError::FileNotFound(_))
        ));

        let ini = write_config("ini", "signing_secret = x");
        assert!(matches!(
            SessionConfig::from_file(ini.path()),
            Err(ConfigError::UnsupportedFormat)
        ));

        let invalid = write_config("yaml", "signing_secret: \"\"\n");
        assert!(matches!(
            SessionConfig::from_file_with_prefix(invalid.path(), "TURBOSESSION_TEST_YAML"),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_builds_issuer_and_carrier() {
        let config = SessionConfig::new("s")
            .with_issuer("svc")
            .with_carrier(CarrierConfig::cookie());
        let issuer = config.token_issuer().unwrap();
        assert_eq!(issuer.issuer(), "svc");
        assert_eq!(config.carrier.build().unwrap().name(), "cookie");
        assert_eq!(
            config.refresh_channel().unwrap().header().as_str(),
            "x-refresh-token"
        );
    }
}
