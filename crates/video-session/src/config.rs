use common::secret::SecretString;
use std::collections::HashMap;
use std::env;
use std::time::Duration;
use thiserror::Error;

/// Default video service endpoint.
pub const DEFAULT_BASE_URL: &str = "https://video.stream-io-api.com";

/// Default request timeout for the video client.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(10_000);

/// Default client log level forwarded to the video client.
pub const DEFAULT_CLIENT_LOG_LEVEL: &str = "debug";

/// Default number of retries after the first failed connect.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default fixed delay between connect attempts.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(2_000);

/// Public/private key pair for the video service.
///
/// Both halves are optional at load time. Their absence is reported as a
/// `VideoError::Configuration` when a token is issued or a client is built,
/// not when the process starts.
#[derive(Debug, Clone, Default)]
pub struct VideoCredentials {
    pub api_key: Option<String>,
    pub api_secret: Option<SecretString>,
}

/// Options handed to each video client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientOptions {
    pub log_level: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            log_level: DEFAULT_CLIENT_LOG_LEVEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Bounded, fixed-delay retry policy for session establishment.
///
/// `max_retries` of 0 means a single attempt with no retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub retry_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub credentials: VideoCredentials,
    pub client: ClientOptions,
    pub retry: RetryPolicy,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {reason}")]
    InvalidValue { name: String, reason: String },
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing)
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let api_key = non_empty(vars, "VIDEO_API_KEY");
        let api_secret = non_empty(vars, "VIDEO_API_SECRET").map(SecretString::from);

        let base_url = vars
            .get("VIDEO_BASE_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let timeout = parse_millis(vars, "VIDEO_TIMEOUT_MS")?.unwrap_or(DEFAULT_TIMEOUT);

        let log_level = vars
            .get("VIDEO_CLIENT_LOG_LEVEL")
            .cloned()
            .unwrap_or_else(|| DEFAULT_CLIENT_LOG_LEVEL.to_string());

        let max_retries = match vars.get("VIDEO_CONNECT_MAX_RETRIES") {
            Some(raw) => raw.parse::<u32>().map_err(|e| ConfigError::InvalidValue {
                name: "VIDEO_CONNECT_MAX_RETRIES".to_string(),
                reason: e.to_string(),
            })?,
            None => DEFAULT_MAX_RETRIES,
        };

        let retry_delay =
            parse_millis(vars, "VIDEO_CONNECT_RETRY_DELAY_MS")?.unwrap_or(DEFAULT_RETRY_DELAY);

        Ok(Config {
            credentials: VideoCredentials {
                api_key,
                api_secret,
            },
            client: ClientOptions {
                log_level,
                base_url,
                timeout,
            },
            retry: RetryPolicy {
                max_retries,
                retry_delay,
            },
        })
    }
}

fn non_empty(vars: &HashMap<String, String>, name: &str) -> Option<String> {
    vars.get(name).filter(|v| !v.is_empty()).cloned()
}

fn parse_millis(
    vars: &HashMap<String, String>,
    name: &str,
) -> Result<Option<Duration>, ConfigError> {
    vars.get(name)
        .map(|raw| {
            raw.parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|e| ConfigError::InvalidValue {
                    name: name.to_string(),
                    reason: e.to_string(),
                })
        })
        .transpose()
}
