//! Configuration loading for the Wakili client.
//!
//! The file is TOML, found via `--config` or `WAKILI_CONFIG`. Deployment
//! values written by the canister tooling (`CANISTER_ID_*`, `DFX_NETWORK`)
//! override the file when present.

use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};

pub const CONFIG_ENV: &str = "WAKILI_CONFIG";
pub const BACKEND_CANISTER_ENV: &str = "CANISTER_ID_WAKILI_BACKEND";
pub const IDENTITY_CANISTER_ENV: &str = "CANISTER_ID_INTERNET_IDENTITY";
pub const NETWORK_ENV: &str = "DFX_NETWORK";

const MAINNET_HOST: &str = "https://icp-api.io";
const LOCAL_HOST: &str = "http://127.0.0.1:4943";
const MAINNET_IDENTITY_PROVIDER: &str = "https://identity.ic0.app";

/// Target network. Decides the endpoint host and whether the network root
/// key must be fetched and trusted at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Network {
    /// Production network. Its root key is built in and never fetched.
    Ic,
    /// Local replica or test network.
    Local,
}

impl Network {
    pub fn is_production(self) -> bool {
        matches!(self, Network::Ic)
    }

    /// Trust-on-first-use of the root key is only sound off production.
    pub fn should_fetch_root_key(self) -> bool {
        !self.is_production()
    }

    pub fn default_host(self) -> &'static str {
        match self {
            Network::Ic => MAINNET_HOST,
            Network::Local => LOCAL_HOST,
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Network::Ic => f.write_str("ic"),
            Network::Local => f.write_str("local"),
        }
    }
}

impl std::str::FromStr for Network {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "ic" | "mainnet" | "production" => Ok(Network::Ic),
            "local" | "test" | "playground" => Ok(Network::Local),
            other => Err(ConfigError::InvalidValue {
                field: "network",
                reason: format!("unknown network '{}'", other),
            }),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    pub backend_canister_id: String,
    pub identity_canister_id: String,
    pub network: Network,
    /// Overrides the network's default host.
    pub host: Option<String>,
    /// Overrides the network's default identity provider URL.
    pub identity_provider_url: Option<String>,
    pub request_timeout_ms: u64,
    pub download_dir: PathBuf,
    pub delegation_path: PathBuf,
    pub wallet_path: Option<PathBuf>,
    pub log_filter: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing configuration file path (use --config or WAKILI_CONFIG)")]
    MissingConfigPath,
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid config value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

impl ClientConfig {
    /// Load from an explicit path, falling back to `WAKILI_CONFIG`, then apply
    /// environment overrides and validate.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path
            .map(Path::to_path_buf)
            .or_else(config_path_from_env)
            .ok_or(ConfigError::MissingConfigPath)?;
        let mut config = Self::from_path(&path)?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    /// Apply deployment overrides from `lookup` (the process environment in
    /// production).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(id) = lookup(BACKEND_CANISTER_ENV) {
            self.backend_canister_id = id;
        }
        if let Some(id) = lookup(IDENTITY_CANISTER_ENV) {
            self.identity_canister_id = id;
        }
        if let Some(network) = lookup(NETWORK_ENV) {
            self.network = network.parse()?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_canister_id("backend_canister_id", &self.backend_canister_id)?;
        validate_canister_id("identity_canister_id", &self.identity_canister_id)?;
        if let Some(host) = &self.host {
            validate_url("host", host)?;
        }
        if let Some(url) = &self.identity_provider_url {
            validate_url("identity_provider_url", url)?;
        }
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "request_timeout_ms",
                reason: "must be > 0".to_string(),
            });
        }
        if self.download_dir.as_os_str().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "download_dir",
                reason: "must not be empty".to_string(),
            });
        }
        if self.delegation_path.as_os_str().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "delegation_path",
                reason: "must not be empty".to_string(),
            });
        }
        if self
            .wallet_path
            .as_ref()
            .is_some_and(|p| p.as_os_str().is_empty())
        {
            return Err(ConfigError::InvalidValue {
                field: "wallet_path",
                reason: "must not be empty when set".to_string(),
            });
        }
        Ok(())
    }

    pub fn host(&self) -> String {
        self.host
            .clone()
            .unwrap_or_else(|| self.network.default_host().to_string())
            .trim_end_matches('/')
            .to_string()
    }

    pub fn identity_provider_url(&self) -> String {
        if let Some(url) = &self.identity_provider_url {
            return url.clone();
        }
        match self.network {
            Network::Ic => MAINNET_IDENTITY_PROVIDER.to_string(),
            Network::Local => format!("http://{}.localhost:4943", self.identity_canister_id),
        }
    }
}

fn validate_canister_id(field: &'static str, id: &str) -> Result<(), ConfigError> {
    if id.trim().is_empty() {
        return Err(ConfigError::InvalidValue {
            field,
            reason: "must not be empty".to_string(),
        });
    }
    if !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(ConfigError::InvalidValue {
            field,
            reason: "may only contain alphanumerics and '-'".to_string(),
        });
    }
    Ok(())
}

fn validate_url(field: &'static str, url: &str) -> Result<(), ConfigError> {
    url::Url::parse(url).map_err(|e| ConfigError::InvalidValue {
        field,
        reason: e.to_string(),
    })?;
    Ok(())
}

fn config_path_from_env() -> Option<PathBuf> {
    std::env::var(CONFIG_ENV).ok().map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
backend_canister_id = "bkyz2-fmaaa-aaaaa-qaaaq-cai"
identity_canister_id = "rdmx6-jaaaa-aaaaa-aaadq-cai"
network = "local"
request_timeout_ms = 30000
download_dir = "downloads"
delegation_path = ".wakili/delegation.json"
"#;

    #[test]
    fn parses_sample() {
        let config = ClientConfig::from_toml(SAMPLE).unwrap();
        config.validate().unwrap();
        assert_eq!(config.network, Network::Local);
        assert_eq!(config.host(), "http://127.0.0.1:4943");
        assert_eq!(
            config.identity_provider_url(),
            "http://rdmx6-jaaaa-aaaaa-aaadq-cai.localhost:4943"
        );
    }

    #[test]
    fn env_overrides_apply() {
        let mut config = ClientConfig::from_toml(SAMPLE).unwrap();
        config
            .apply_overrides(|key| match key {
                NETWORK_ENV => Some("ic".to_string()),
                BACKEND_CANISTER_ENV => Some("aaaaa-aa".to_string()),
                _ => None,
            })
            .unwrap();
        assert_eq!(config.network, Network::Ic);
        assert_eq!(config.backend_canister_id, "aaaaa-aa");
        assert_eq!(config.host(), "https://icp-api.io");
        assert_eq!(config.identity_provider_url(), "https://identity.ic0.app");
    }

    #[test]
    fn unknown_network_rejected() {
        let mut config = ClientConfig::from_toml(SAMPLE).unwrap();
        let result = config.apply_overrides(|key| {
            (key == NETWORK_ENV).then(|| "moon".to_string())
        });
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { field: "network", .. })
        ));
    }

    #[test]
    fn host_override_trims_slash() {
        let mut config = ClientConfig::from_toml(SAMPLE).unwrap();
        config.host = Some("http://localhost:8080/".to_string());
        assert_eq!(config.host(), "http://localhost:8080");
    }

    fn invalid_field(config: &ClientConfig) -> &'static str {
        match config.validate() {
            Err(ConfigError::InvalidValue { field, .. }) => field,
            other => panic!("expected InvalidValue, got {:?}", other),
        }
    }

    #[test]
    fn empty_canister_ids_rejected() {
        let mut config = ClientConfig::from_toml(SAMPLE).unwrap();
        config.backend_canister_id = "  ".to_string();
        assert_eq!(invalid_field(&config), "backend_canister_id");

        let mut config = ClientConfig::from_toml(SAMPLE).unwrap();
        config.identity_canister_id = String::new();
        assert_eq!(invalid_field(&config), "identity_canister_id");
    }

    #[test]
    fn illegal_canister_id_characters_rejected() {
        let mut config = ClientConfig::from_toml(SAMPLE).unwrap();
        config.backend_canister_id = "bkyz2 fmaaa".to_string();
        assert_eq!(invalid_field(&config), "backend_canister_id");

        let mut config = ClientConfig::from_toml(SAMPLE).unwrap();
        config.identity_canister_id = "rdmx6_jaaaa/".to_string();
        assert_eq!(invalid_field(&config), "identity_canister_id");
    }

    #[test]
    fn zero_timeout_rejected() {
        let mut config = ClientConfig::from_toml(SAMPLE).unwrap();
        config.request_timeout_ms = 0;
        assert_eq!(invalid_field(&config), "request_timeout_ms");
    }

    #[test]
    fn unparseable_host_rejected() {
        let mut config = ClientConfig::from_toml(SAMPLE).unwrap();
        config.host = Some("not a url".to_string());
        assert_eq!(invalid_field(&config), "host");

        let mut config = ClientConfig::from_toml(SAMPLE).unwrap();
        config.identity_provider_url = Some("://missing-scheme".to_string());
        assert_eq!(invalid_field(&config), "identity_provider_url");
    }

    #[test]
    fn empty_backend_override_fails_validation() {
        let mut config = ClientConfig::from_toml(SAMPLE).unwrap();
        config
            .apply_overrides(|key| (key == BACKEND_CANISTER_ENV).then(String::new))
            .unwrap();
        assert_eq!(config.backend_canister_id, "");
        assert_eq!(invalid_field(&config), "backend_canister_id");
    }

    #[test]
    fn unknown_field_rejected() {
        let contents = format!("{}\nextra = 1\n", SAMPLE);
        assert!(matches!(
            ClientConfig::from_toml(&contents),
            Err(ConfigError::Parse(_))
        ));
    }
}
