//! Configuration loading with layered overrides.
//!
//! Config is loaded in order (each layer overrides the previous):
//! 1. Default values
//! 2. Config file (TOML)
//! 3. Environment variables
//! 4. CLI arguments
//!
//! The JWT secret is never read from config files - it must come from an
//! environment variable or CLI argument.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::Error;

/// Console configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub access: Access,
    #[serde(default)]
    pub table: Table,
    #[serde(default)]
    pub storage: Storage,
    #[serde(default)]
    pub auth: Auth,
}

/// Page-access settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Access {
    /// URL of the page-access list endpoint.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Where unauthorized navigation is redirected.
    #[serde(default = "default_forbidden_path")]
    pub forbidden_path: String,
    /// Paths that render without any permission check.
    #[serde(default = "default_public_paths")]
    pub public_paths: Vec<String>,
    /// Routes whose single-segment children inherit the parent's entry.
    #[serde(default)]
    pub dynamic_parents: Vec<String>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for Access {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            forbidden_path: default_forbidden_path(),
            public_paths: default_public_paths(),
            dynamic_parents: Vec::new(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_endpoint() -> String {
    "http://127.0.0.1:8080/api/page-access".to_string()
}

fn default_forbidden_path() -> String {
    "/forbidden".to_string()
}

fn default_public_paths() -> Vec<String> {
    vec!["/login".to_string(), "/forbidden".to_string()]
}

fn default_request_timeout_secs() -> u64 {
    10
}

/// Data table defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Table {
    #[serde(default = "default_page_size")]
    pub default_page_size: usize,
    #[serde(default = "default_page_size_options")]
    pub page_size_options: Vec<usize>,
    /// Prefix for persisted column-visibility keys.
    #[serde(default = "default_storage_namespace")]
    pub storage_namespace: String,
}

impl Default for Table {
    fn default() -> Self {
        Self {
            default_page_size: default_page_size(),
            page_size_options: default_page_size_options(),
            storage_namespace: default_storage_namespace(),
        }
    }
}

fn default_page_size() -> usize {
    10
}

fn default_page_size_options() -> Vec<usize> {
    vec![10, 20, 30, 40, 50]
}

fn default_storage_namespace() -> String {
    "table-visibility".to_string()
}

/// Client-local persistence settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Storage {
    #[serde(default = "default_storage_path")]
    pub path: PathBuf,
}

impl Default for Storage {
    fn default() -> Self {
        Self {
            path: default_storage_path(),
        }
    }
}

fn default_storage_path() -> PathBuf {
    PathBuf::from(".adminkit/state.json")
}

/// Session token settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Auth {
    /// Secret used to verify session tokens.
    /// Must be provided via environment variable or CLI - never from config file.
    #[serde(default)]
    pub jwt_secret: String,

    /// Lifetime of tokens minted by [`create_token`](crate::auth::create_token).
    #[serde(default = "default_token_expiry_days")]
    pub token_expiry_days: u32,

    /// Allowed clock skew when checking token expiry.
    #[serde(default = "default_leeway_secs")]
    pub leeway_secs: u64,
}

impl Default for Auth {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            token_expiry_days: default_token_expiry_days(),
            leeway_secs: default_leeway_secs(),
        }
    }
}

fn default_token_expiry_days() -> u32 {
    1
}

fn default_leeway_secs() -> u64 {
    30
}

/// CLI-level overrides, applied after the environment.
#[derive(Debug, Clone, Default)]
pub struct Overrides<'a> {
    pub endpoint: Option<&'a str>,
    pub storage_path: Option<&'a Path>,
    pub page_size: Option<usize>,
    pub jwt_secret: Option<&'a str>,
}

/// Builder for loading configuration with customizable options.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Environment variable prefix (e.g., "MYAPP" -> MYAPP_ACCESS_ENDPOINT)
    pub env_prefix: String,
    /// Name of the JWT secret environment variable (without prefix)
    pub jwt_secret_env: String,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self {
            env_prefix: "ADMINKIT".to_string(),
            jwt_secret_env: "JWT_SECRET".to_string(),
        }
    }
}

impl ConfigLoader {
    /// Create a new config loader with the given environment prefix.
    pub fn new(env_prefix: impl Into<String>) -> Self {
        Self {
            env_prefix: env_prefix.into(),
            ..Default::default()
        }
    }

    /// Load configuration from file, environment, and CLI overrides.
    pub fn load(&self, config_path: Option<&Path>, cli: Overrides<'_>) -> crate::Result<Config> {
        let mut config: Config = if let Some(path) = config_path {
            let content = std::fs::read_to_string(path)
                .map_err(|e| Error::Config(format!("Failed to read config file: {e}")))?;
            toml::from_str(&content)
                .map_err(|e| Error::Config(format!("Failed to parse config: {e}")))?
        } else {
            Config::default()
        };

        // Clear any jwt_secret from config file - security requirement
        config.auth.jwt_secret = String::new();

        let prefix = &self.env_prefix;

        if let Ok(endpoint) = std::env::var(format!("{prefix}_ACCESS_ENDPOINT")) {
            config.access.endpoint = endpoint;
        }
        if let Ok(path) = std::env::var(format!("{prefix}_FORBIDDEN_PATH")) {
            config.access.forbidden_path = path;
        }
        if let Ok(path) = std::env::var(format!("{prefix}_STORAGE_PATH")) {
            config.storage.path = PathBuf::from(path);
        }
        if let Ok(size) = std::env::var(format!("{prefix}_PAGE_SIZE"))
            && let Ok(s) = size.parse()
        {
            config.table.default_page_size = s;
        }
        if let Ok(secret) = std::env::var(format!("{}_{}", prefix, self.jwt_secret_env)) {
            config.auth.jwt_secret = secret;
        }

        if let Some(endpoint) = cli.endpoint {
            config.access.endpoint = endpoint.to_string();
        }
        if let Some(path) = cli.storage_path {
            config.storage.path = path.to_path_buf();
        }
        if let Some(size) = cli.page_size {
            config.table.default_page_size = size;
        }
        if let Some(secret) = cli.jwt_secret {
            config.auth.jwt_secret = secret.to_string();
        }

        if config.auth.jwt_secret.is_empty() {
            return Err(Error::Config(format!(
                "{}_{} must be set via environment variable or --jwt-secret flag",
                prefix, self.jwt_secret_env
            )));
        }

        config.normalize()?;
        Ok(config)
    }
}

impl Config {
    /// Enforce cross-field invariants after all layers are applied.
    fn normalize(&mut self) -> crate::Result<()> {
        let table = &mut self.table;
        if table.default_page_size == 0 {
            return Err(Error::Config("default_page_size must be positive".into()));
        }
        table.page_size_options.retain(|&s| s > 0);
        if !table.page_size_options.contains(&table.default_page_size) {
            table.page_size_options.push(table.default_page_size);
        }
        table.page_size_options.sort_unstable();
        table.page_size_options.dedup();

        // The redirect target must never redirect again
        let access = &mut self.access;
        if !access.public_paths.contains(&access.forbidden_path) {
            access.public_paths.push(access.forbidden_path.clone());
        }
        Ok(())
    }
}
