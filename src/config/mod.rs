//! Runtime configuration.
//!
//! Resolution order (later wins):
//! 1. Built-in defaults
//! 2. TOML file: `--config`, else `DAYLIST_CONFIG`, else `./daylist.toml` if present
//! 3. Environment variables (`SESSION_SECRET`, `GOOGLE_CLIENT_ID`, ...)
//!
//! [`Config::load`] validates the result and fails fast on missing secrets.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default config file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "daylist.toml";

/// Fixed session lifetime: 12 days.
pub const DEFAULT_SESSION_TTL_SECS: u64 = 12 * 24 * 3600;

/// Shortest accepted session signing secret.
pub const MIN_SESSION_SECRET_LEN: usize = 16;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid value for {var}: {value:?}")]
    InvalidEnv { var: &'static str, value: String },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub gateway: GatewayConfig,
    pub storage: StorageConfig,
    pub session: SessionConfig,
    pub auth: AuthConfig,
    pub google: GoogleConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 3000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite database file holding users, items and sessions.
    pub database_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("daylist.db"),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// HMAC key for session cookie signatures.
    pub secret: String,
    pub ttl_secs: u64,
    pub cookie_name: String,
    /// Set the `Secure` cookie attribute (enable behind HTTPS).
    pub secure_cookie: bool,
    /// How often expired session rows are purged.
    pub purge_interval_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            ttl_secs: DEFAULT_SESSION_TTL_SECS,
            cookie_name: "daylist_session".into(),
            secure_cookie: false,
            purge_interval_secs: 3600,
        }
    }
}

impl std::fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionConfig")
            .field("secret", &"<redacted>")
            .field("ttl_secs", &self.ttl_secs)
            .field("cookie_name", &self.cookie_name)
            .field("secure_cookie", &self.secure_cookie)
            .field("purge_interval_secs", &self.purge_interval_secs)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub bcrypt_cost: u32,
    /// Let a federated login reuse an existing local account with the same email.
    pub federated_links_local_accounts: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            bcrypt_cost: crate::auth::hasher::DEFAULT_COST,
            federated_links_local_accounts: true,
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GoogleConfig {
    pub client_id: String,
    pub client_secret: String,
    /// Pre-registered callback; must route to `/auth/google/app`.
    pub callback_url: String,
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            callback_url: "http://localhost:3000/auth/google/app".into(),
        }
    }
}

impl std::fmt::Debug for GoogleConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("callback_url", &self.callback_url)
            .finish()
    }
}

impl Config {
    /// Load, apply environment overrides and validate.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let explicit = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os("DAYLIST_CONFIG").map(PathBuf::from));

        let mut config = match explicit {
            Some(path) => Self::from_file(&path)?,
            None => {
                let fallback = Path::new(DEFAULT_CONFIG_FILE);
                if fallback.exists() {
                    Self::from_file(fallback)?
                } else {
                    Self::default()
                }
            }
        };

        config.apply_overrides(|var| std::env::var(var).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = toml::from_str(&raw)?;
        tracing::debug!(path = %path.display(), "Loaded config file");
        Ok(config)
    }

    /// Apply environment overrides through `lookup` (injectable for tests).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        if let Some(host) = non_empty("DAYLIST_HOST") {
            self.gateway.host = host;
        }
        if let Some(port) = non_empty("DAYLIST_PORT") {
            self.gateway.port = port.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                var: "DAYLIST_PORT",
                value: port,
            })?;
        }
        if let Some(path) = non_empty("DAYLIST_DATABASE_PATH") {
            self.storage.database_path = PathBuf::from(path);
        }
        if let Some(secret) = non_empty("SESSION_SECRET") {
            self.session.secret = secret;
        }
        if let Some(id) = non_empty("GOOGLE_CLIENT_ID") {
            self.google.client_id = id;
        }
        if let Some(secret) = non_empty("GOOGLE_CLIENT_SECRET") {
            self.google.client_secret = secret;
        }
        if let Some(url) = non_empty("GOOGLE_CALLBACK_URL") {
            self.google.callback_url = url;
        }
        Ok(())
    }

    /// Reject configurations the service cannot safely start with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.session.secret.len() < MIN_SESSION_SECRET_LEN {
            return Err(ConfigError::Invalid(format!(
                "session secret must be at least {MIN_SESSION_SECRET_LEN} bytes (set SESSION_SECRET)"
            )));
        }
        if self.session.ttl_secs == 0 {
            return Err(ConfigError::Invalid("session.ttl_secs must be positive".into()));
        }
        if self.session.cookie_name.trim().is_empty() {
            return Err(ConfigError::Invalid("session.cookie_name cannot be empty".into()));
        }
        if !(4..=31).contains(&self.auth.bcrypt_cost) {
            return Err(ConfigError::Invalid(format!(
                "auth.bcrypt_cost must be between 4 and 31, got {}",
                self.auth.bcrypt_cost
            )));
        }
        if self.google.client_id.trim().is_empty() || self.google.client_secret.trim().is_empty()
        {
            return Err(ConfigError::Invalid(
                "Google client id and secret are required (set GOOGLE_CLIENT_ID / GOOGLE_CLIENT_SECRET)"
                    .into(),
            ));
        }
        match reqwest::Url::parse(&self.google.callback_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            _ => {
                return Err(ConfigError::Invalid(format!(
                    "google.callback_url is not an http(s) URL: {}",
                    self.google.callback_url
                )))
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn valid_config() -> Config {
        let mut config = Config::default();
        config.session.secret = "0123456789abcdef0123456789abcdef".into();
        config.google.client_id = "client".into();
        config.google.client_secret = "secret".into();
        config
    }

    #[test]
    fn built_in_defaults() {
        let config = Config::default();
        assert_eq!(config.gateway.port, 3000);
        assert_eq!(config.session.ttl_secs, 1_036_800);
        assert_eq!(config.auth.bcrypt_cost, 10);
        assert!(config.auth.federated_links_local_accounts);
    }

    #[test]
    fn defaults_without_secrets_fail_validation() {
        let err = Config::default().validate().unwrap_err();
        assert!(err.to_string().contains("SESSION_SECRET"));
    }

    #[test]
    fn missing_google_credentials_fail_validation() {
        let mut config = valid_config();
        config.google.client_secret.clear();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("GOOGLE_CLIENT_SECRET"));
    }

    #[test]
    fn bad_callback_and_cost_fail_validation() {
        let mut config = valid_config();
        config.google.callback_url = "not a url".into();
        assert!(config.validate().is_err());

        let mut config = valid_config();
        config.auth.bcrypt_cost = 3;
        assert!(config.validate().is_err());

        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn parses_partial_toml() {
        let config: Config = toml::from_str(
            r#"
            [gateway]
            port = 8080

            [session]
            secret = "from-file-secret-value"
            secure_cookie = true

            [auth]
            federated_links_local_accounts = false
            "#,
        )
        .unwrap();

        assert_eq!(config.gateway.port, 8080);
        assert_eq!(config.gateway.host, "127.0.0.1");
        assert!(config.session.secure_cookie);
        assert_eq!(config.session.ttl_secs, DEFAULT_SESSION_TTL_SECS);
        assert!(!config.auth.federated_links_local_accounts);
    }

    #[test]
    fn environment_overrides_file_values() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("SESSION_SECRET", "env-secret-env-secret"),
            ("GOOGLE_CLIENT_ID", "env-client"),
            ("GOOGLE_CLIENT_SECRET", "env-client-secret"),
            ("DAYLIST_PORT", "4000"),
            ("DAYLIST_HOST", "  "),
        ]);
        let mut config = Config::default();
        config
            .apply_overrides(|var| env.get(var).map(|v| (*v).to_string()))
            .unwrap();

        assert_eq!(config.session.secret, "env-secret-env-secret");
        assert_eq!(config.google.client_id, "env-client");
        assert_eq!(config.gateway.port, 4000);
        // Blank values are ignored
        assert_eq!(config.gateway.host, "127.0.0.1");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn invalid_port_override_is_reported() {
        let mut config = Config::default();
        let err = config
            .apply_overrides(|var| (var == "DAYLIST_PORT").then(|| "eighty".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { var: "DAYLIST_PORT", .. }));
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let rendered = format!("{:?}", valid_config());
        assert!(!rendered.contains("0123456789abcdef"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn from_file_reads_toml() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("daylist.toml");
        std::fs::write(&path, "[storage]\ndatabase_path = \"/tmp/x.db\"\n").unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.storage.database_path, PathBuf::from("/tmp/x.db"));

        assert!(matches!(
            Config::from_file(&tmp.path().join("missing.toml")),
            Err(ConfigError::Read { .. })
        ));
    }
}
