//! Configuration management.
//!
//! Settings are split per backend. Each section has serde defaults, may be
//! provided by a TOML file, and is then overlaid with environment variables
//! using the section's own prefix:
//!
//! ```toml
//! [server]
//! host = "127.0.0.1"
//! port = 5000
//!
//! [arxiv]
//! default_max_results = 5
//! default_max_text_length = 20000
//! item_timeout_secs = 120
//!
//! [calculator]
//! enabled_operations = ["add", "subtract", "multiply", "divide"]
//! verbose_errors = false
//! ```
//!
//! | Section      | Env prefix    | Example                          |
//! |--------------|---------------|----------------------------------|
//! | `server`     | `MCP_SERVER_` | `MCP_SERVER_PORT=8006`           |
//! | `arxiv`      | `ARXIV_`      | `ARXIV_DEFAULT_MAX_RESULTS=10`   |
//! | `calculator` | `CALCULATOR_` | `CALCULATOR_VERBOSE_ERRORS=true` |
//!
//! Values outside their documented bounds are rejected with
//! [`ConfigError::Invalid`] before any service is built.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::services::calculator::Operation;

/// Errors raised while loading or validating configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A setting is present but outside its allowed range
    #[error("invalid setting '{field}': {reason}")]
    Invalid { field: String, reason: String },

    /// A required setting is absent
    #[error("missing required setting '{0}'")]
    Missing(String),

    /// The underlying loader failed (bad file, unparsable value)
    #[error("failed to load configuration: {0}")]
    Load(#[from] ::config::ConfigError),
}

impl ConfigError {
    fn invalid(field: &str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Transport binding
    #[serde(default)]
    pub server: ServerConfig,

    /// arXiv adapter settings
    #[serde(default)]
    pub arxiv: ArxivConfig,

    /// Calculator adapter settings
    #[serde(default)]
    pub calculator: CalculatorConfig,
}

impl Settings {
    /// Check every section's bounds
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.arxiv.validate()?;
        self.calculator.validate()?;
        Ok(())
    }
}

/// HTTP transport binding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::Missing("server.host".to_string()));
        }
        if self.port == 0 {
            return Err(ConfigError::invalid("server.port", "must be non-zero"));
        }
        Ok(())
    }

    /// `host:port` for the HTTP listener
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5000
}

/// arXiv search service configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArxivConfig {
    /// Papers returned per search when the caller does not say (1-50)
    #[serde(default = "default_max_results")]
    pub default_max_results: usize,

    /// Characters of full text kept per paper (at least 100; unset = no limit)
    #[serde(default)]
    pub default_max_text_length: Option<usize>,

    /// Papers downloaded and parsed at once (unset = all candidates at once)
    #[serde(default)]
    pub max_concurrency: Option<usize>,

    /// Deadline for downloading and parsing a single paper
    #[serde(default = "default_item_timeout_secs")]
    pub item_timeout_secs: u64,

    /// Attempts for the search API call
    #[serde(default = "default_search_retries")]
    pub search_retries: u32,

    /// arXiv query endpoint
    #[serde(default = "default_api_url")]
    pub api_url: String,
}

impl Default for ArxivConfig {
    fn default() -> Self {
        Self {
            default_max_results: default_max_results(),
            default_max_text_length: None,
            max_concurrency: None,
            item_timeout_secs: default_item_timeout_secs(),
            search_retries: default_search_retries(),
            api_url: default_api_url(),
        }
    }
}

/// Bounds shared by the config and the `arxiv_search` tool arguments
pub const MAX_RESULTS_RANGE: std::ops::RangeInclusive<usize> = 1..=50;
/// Smallest accepted text truncation limit
pub const MIN_TEXT_LENGTH: usize = 100;

impl ArxivConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !MAX_RESULTS_RANGE.contains(&self.default_max_results) {
            return Err(ConfigError::invalid(
                "arxiv.default_max_results",
                format!(
                    "must be between {} and {} (got {})",
                    MAX_RESULTS_RANGE.start(),
                    MAX_RESULTS_RANGE.end(),
                    self.default_max_results
                ),
            ));
        }
        if let Some(len) = self.default_max_text_length {
            if len < MIN_TEXT_LENGTH {
                return Err(ConfigError::invalid(
                    "arxiv.default_max_text_length",
                    format!("must be at least {} (got {})", MIN_TEXT_LENGTH, len),
                ));
            }
        }
        if self.max_concurrency == Some(0) {
            return Err(ConfigError::invalid(
                "arxiv.max_concurrency",
                "must be at least 1",
            ));
        }
        if self.item_timeout_secs == 0 {
            return Err(ConfigError::invalid(
                "arxiv.item_timeout_secs",
                "must be at least 1",
            ));
        }
        if self.search_retries == 0 {
            return Err(ConfigError::invalid(
                "arxiv.search_retries",
                "must be at least 1",
            ));
        }
        if self.api_url.trim().is_empty() {
            return Err(ConfigError::Missing("arxiv.api_url".to_string()));
        }
        Ok(())
    }

    pub fn item_timeout(&self) -> Duration {
        Duration::from_secs(self.item_timeout_secs)
    }
}

fn default_max_results() -> usize {
    5
}

fn default_item_timeout_secs() -> u64 {
    120
}

fn default_search_retries() -> u32 {
    3
}

fn default_api_url() -> String {
    "http://export.arxiv.org/api/query".to_string()
}

/// Calculator service configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculatorConfig {
    /// Operations the `calculate` tool accepts
    #[serde(default = "default_operations")]
    pub enabled_operations: Vec<Operation>,

    /// Include operands in error messages
    #[serde(default)]
    pub verbose_errors: bool,
}

impl Default for CalculatorConfig {
    fn default() -> Self {
        Self {
            enabled_operations: default_operations(),
            verbose_errors: false,
        }
    }
}

impl CalculatorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.enabled_operations.is_empty() {
            return Err(ConfigError::invalid(
                "calculator.enabled_operations",
                "at least one operation must be enabled",
            ));
        }
        Ok(())
    }
}

fn default_operations() -> Vec<Operation> {
    Operation::ALL.to_vec()
}

/// Overlay environment variables with `prefix` onto `base`.
///
/// `env` replaces the process environment when given (used by tests).
fn layered<T>(
    base: &T,
    prefix: &str,
    env: Option<HashMap<String, String>>,
) -> Result<T, ConfigError>
where
    T: Serialize + DeserializeOwned,
{
    let environment = ::config::Environment::with_prefix(prefix)
        .prefix_separator("_")
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("enabled_operations")
        .source(env);

    let settings = ::config::Config::builder()
        .add_source(::config::Config::try_from(base)?)
        .add_source(environment)
        .build()?;

    Ok(settings.try_deserialize()?)
}

/// Load settings: defaults, then the optional file, then environment overrides.
pub fn load_settings(path: Option<&Path>) -> Result<Settings, ConfigError> {
    load_settings_with_env(path, None)
}

/// Same as [`load_settings`] but reads overrides from `env` instead of the
/// process environment when it is given.
pub fn load_settings_with_env(
    path: Option<&Path>,
    env: Option<HashMap<String, String>>,
) -> Result<Settings, ConfigError> {
    let base: Settings = match path {
        Some(path) => ::config::Config::builder()
            .add_source(::config::File::from(path))
            .build()?
            .try_deserialize()?,
        None => Settings::default(),
    };

    let settings = Settings {
        server: layered(&base.server, "MCP_SERVER", env.clone())?,
        arxiv: layered(&base.arxiv, "ARXIV", env.clone())?,
        calculator: layered(&base.calculator, "CALCULATOR", env)?,
    };

    settings.validate()?;
    Ok(settings)
}

/// Look for a config file in the usual places
pub fn find_config_file() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("MCP_ADAPTERS_CONFIG") {
        let path = PathBuf::from(path);
        if path.is_file() {
            return Some(path);
        }
    }

    ["mcp-adapters.toml", ".mcp-adapters.toml"]
        .iter()
        .map(PathBuf::from)
        .find(|p| p.is_file())
}
