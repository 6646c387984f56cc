//! Configuration loading and constants.
//!
//! Loads application configuration from an optional TOML file and defines
//! constants for the instance metadata protocol, response placeholders,
//! logging, and default paths. `AppConfig` is the root configuration struct.

use const_format::formatcp;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::Path;

// =============================================================================
// Instance Metadata Service (IMDSv2)
// =============================================================================

/// Link-local address of the instance metadata service
pub const IMDS_DEFAULT_BASE_URL: &str = "http://169.254.169.254/latest";

/// Token endpoint, relative to the base URL
pub const IMDS_TOKEN_PATH: &str = "/api/token";

/// Attribute endpoints live under this prefix, relative to the base URL
pub const IMDS_METADATA_PATH: &str = "/meta-data/";

/// Request header carrying the requested token lifetime
pub const IMDS_TOKEN_TTL_HEADER: &str = "x-aws-ec2-metadata-token-ttl-seconds";

/// Request header carrying the session token on attribute lookups
pub const IMDS_TOKEN_HEADER: &str = "x-aws-ec2-metadata-token";

/// Default token lifetime in seconds (6 hours, the service maximum)
pub const IMDS_DEFAULT_TOKEN_TTL_SECS: u64 = 21600;

/// Upper bound accepted by the metadata service for token lifetimes
pub const IMDS_MAX_TOKEN_TTL_SECS: u64 = 21600;

/// Per-call timeout for token and attribute requests
pub const IMDS_DEFAULT_TIMEOUT_MS: u64 = 500;

// =============================================================================
// Response Placeholders
// =============================================================================

/// Public IP placeholder when the metadata service has no answer
pub const PLACEHOLDER_PUBLIC_IP: &str = "indisponivel";

/// Placeholder for instance id, unresolvable private IP, and unknown host
pub const PLACEHOLDER_UNKNOWN: &str = "desconhecido";

/// Availability zone placeholder (feminine form, "zona")
pub const PLACEHOLDER_AVAILABILITY_ZONE: &str = "desconhecida";

/// Scheme reported when neither a forwarded header nor the URI carries one
pub const DEFAULT_SCHEME: &str = "http";

/// Version reported in the diagnostic payload
pub const PROBE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default human-readable message in the diagnostic payload
pub const DEFAULT_PROBE_MESSAGE: &str = "Teste de Load Balancing da AWS — axum em execução.";

// =============================================================================
// Time Rendering
// =============================================================================

/// Fixed offset of the secondary timestamp, in hours west of UTC (no DST)
pub const BRT_OFFSET_HOURS: i32 = 3;

/// Format of the secondary timestamp
pub const BRT_TIME_FORMAT: &str = formatcp!("%d/%m/%Y %I:%M:%S %p UTC-{}", BRT_OFFSET_HOURS);

/// Format of the UTC timestamp, before the trailing "Z"
pub const UTC_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

// =============================================================================
// HTTP
// =============================================================================

/// Cache-Control for every probe response; load balancers must never see stale data
pub const CACHE_CONTROL_PROBE: &str = "no-store";

/// Response header echoing the generated request id
pub const REQUEST_ID_HEADER: &str = "x-request-id";

// =============================================================================
// Default Paths and Strings
// =============================================================================

/// Default configuration file path
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Default log filter when RUST_LOG is not set
pub const DEFAULT_LOG_FILTER: &str = "lb_probe=info,tower_http=info";

/// Default log format (text or json)
pub const DEFAULT_LOG_FORMAT: &str = "text";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// HTTP server configuration
    #[serde(default)]
    pub http: HttpServerConfig,
    /// Instance metadata client settings
    #[serde(default)]
    pub metadata: MetadataConfig,
    #[serde(default)]
    pub probe: ProbeConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HttpServerConfig {
    #[serde(default = "HttpServerConfig::default_host")]
    pub host: String,
    #[serde(default = "HttpServerConfig::default_port")]
    pub port: u16,
    /// Seconds to wait for in-flight requests on shutdown
    #[serde(default = "HttpServerConfig::default_shutdown_grace")]
    pub shutdown_grace_seconds: u64,
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            host: Self::default_host(),
            port: Self::default_port(),
            shutdown_grace_seconds: Self::default_shutdown_grace(),
        }
    }
}

impl HttpServerConfig {
    fn default_host() -> String {
        "0.0.0.0".to_string()
    }

    fn default_port() -> u16 {
        8000
    }

    fn default_shutdown_grace() -> u64 {
        30
    }

    /// Parse host and port into a bindable socket address
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| {
                ConfigError::Validation(format!(
                    "Invalid http.host or http.port '{}:{}': {}",
                    self.host, self.port, e
                ))
            })
    }
}

/// Instance metadata client settings
#[derive(Debug, Clone, Deserialize)]
pub struct MetadataConfig {
    /// When false, no metadata calls are made and every attribute is absent
    #[serde(default = "MetadataConfig::default_enabled")]
    pub enabled: bool,
    #[serde(default = "MetadataConfig::default_base_url")]
    pub base_url: String,
    /// Timeout applied to each token and attribute call
    #[serde(default = "MetadataConfig::default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "MetadataConfig::default_token_ttl")]
    pub token_ttl_seconds: u64,
    /// Fetch the four attributes concurrently instead of one after another
    #[serde(default = "MetadataConfig::default_parallel")]
    pub parallel: bool,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            enabled: Self::default_enabled(),
            base_url: Self::default_base_url(),
            timeout_ms: Self::default_timeout_ms(),
            token_ttl_seconds: Self::default_token_ttl(),
            parallel: Self::default_parallel(),
        }
    }
}

impl MetadataConfig {
    fn default_enabled() -> bool {
        true
    }

    fn default_base_url() -> String {
        IMDS_DEFAULT_BASE_URL.to_string()
    }

    fn default_timeout_ms() -> u64 {
        IMDS_DEFAULT_TIMEOUT_MS
    }

    fn default_token_ttl() -> u64 {
        IMDS_DEFAULT_TOKEN_TTL_SECS
    }

    fn default_parallel() -> bool {
        true
    }

    fn validate(&mut self) -> Result<(), ConfigError> {
        if self.timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "metadata.timeout_ms must be greater than zero".to_string(),
            ));
        }
        if !(1..=IMDS_MAX_TOKEN_TTL_SECS).contains(&self.token_ttl_seconds) {
            return Err(ConfigError::Validation(format!(
                "metadata.token_ttl_seconds must be between 1 and {}",
                IMDS_MAX_TOKEN_TTL_SECS
            )));
        }
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(ConfigError::Validation(format!(
                "metadata.base_url must be an http(s) URL, got '{}'",
                self.base_url
            )));
        }
        let trimmed_len = self.base_url.trim_end_matches('/').len();
        self.base_url.truncate(trimmed_len);
        Ok(())
    }
}

/// Diagnostic payload settings
#[derive(Debug, Clone, Deserialize)]
pub struct ProbeConfig {
    #[serde(default = "ProbeConfig::default_message")]
    pub message: String,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            message: Self::default_message(),
        }
    }
}

impl ProbeConfig {
    fn default_message() -> String {
        DEFAULT_PROBE_MESSAGE.to_string()
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log format: "text" (human-readable, default) or "json" (structured)
    #[serde(default = "LoggingConfig::default_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: DEFAULT_LOG_FORMAT.to_string(),
        }
    }
}

impl LoggingConfig {
    fn default_format() -> String {
        DEFAULT_LOG_FORMAT.to_string()
    }

    pub fn is_json(&self) -> bool {
        self.format == "json"
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    ///
    /// A missing file is not an error: the probe runs on built-in defaults so
    /// it can be dropped onto an instance without any setup.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            let mut config = AppConfig::default();
            config.validate()?;
            return Ok(config);
        }

        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let mut config: AppConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&mut self) -> Result<(), ConfigError> {
        self.metadata.validate()?;

        if self.logging.format != "text" && self.logging.format != "json" {
            return Err(ConfigError::Validation(format!(
                "logging.format must be \"text\" or \"json\", got '{}'",
                self.logging.format
            )));
        }

        self.http.socket_addr()?;
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Configuration error: {0}")]
    Validation(String),
}
