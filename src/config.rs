use clap::{Args, Parser, ValueEnum};

#[derive(Clone, Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Config {
    #[command(flatten)]
    pub server: ServerConfig,

    #[command(flatten)]
    pub expo: ExpoConfig,

    #[command(flatten)]
    pub telemetry: TelemetryConfig,
}

#[derive(Clone, Debug, Args)]
pub struct ServerConfig {
    /// Host to listen on
    #[arg(long, env = "PUSH_RELAY_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port for the push API
    #[arg(long, env = "PUSH_RELAY_PORT", default_value_t = 3000)]
    pub port: u16,

    /// Port for the management (health) API
    #[arg(long, env = "PUSH_RELAY_MGMT_PORT", default_value_t = 9090)]
    pub mgmt_port: u16,

    /// Upper bound on the time a single API request may take, in seconds.
    /// Chunks are sent one after another, each bounded by `--expo-timeout-secs` plus any
    /// rate-limit retries, so large batches need a correspondingly larger value. A request
    /// that hits this limit answers 408 and loses the tickets already collected.
    #[arg(long, env = "PUSH_RELAY_REQUEST_TIMEOUT_SECS", default_value_t = 120)]
    pub request_timeout_secs: u64,

    /// How long to wait for in-flight requests during shutdown
    #[arg(long, env = "PUSH_RELAY_SHUTDOWN_TIMEOUT_SECS", default_value_t = 5)]
    pub shutdown_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            mgmt_port: 9090,
            request_timeout_secs: 120,
            shutdown_timeout_secs: 5,
        }
    }
}

#[derive(Clone, Debug, Args)]
pub struct ExpoConfig {
    /// Base URL of the Expo push service
    #[arg(long = "expo-base-url", env = "PUSH_RELAY_EXPO_BASE_URL", default_value = "https://exp.host")]
    pub base_url: String,

    /// Optional access token for projects with enhanced push security enabled
    #[arg(long = "expo-access-token", env = "PUSH_RELAY_EXPO_ACCESS_TOKEN")]
    pub access_token: Option<String>,

    /// Timeout for a single call to the push service, in seconds
    #[arg(long = "expo-timeout-secs", env = "PUSH_RELAY_EXPO_TIMEOUT_SECS", default_value_t = 30)]
    pub timeout_secs: u64,

    /// Number of retries when the push service answers 429 Too Many Requests
    #[arg(long = "expo-rate-limit-retries", env = "PUSH_RELAY_EXPO_RATE_LIMIT_RETRIES", default_value_t = 2)]
    pub rate_limit_retries: usize,

    /// Initial backoff between rate-limit retries, in milliseconds
    #[arg(long = "expo-retry-min-delay-ms", env = "PUSH_RELAY_EXPO_RETRY_MIN_DELAY_MS", default_value_t = 1000)]
    pub retry_min_delay_ms: u64,

    /// Request bodies larger than this many bytes are gzip-compressed
    #[arg(long = "expo-gzip-threshold-bytes", env = "PUSH_RELAY_EXPO_GZIP_THRESHOLD_BYTES", default_value_t = 1024)]
    pub gzip_threshold_bytes: usize,
}

impl Default for ExpoConfig {
    fn default() -> Self {
        Self {
            base_url: "https://exp.host".to_string(),
            access_token: None,
            timeout_secs: 30,
            rate_limit_retries: 2,
            retry_min_delay_ms: 1000,
            gzip_threshold_bytes: 1024,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Clone, Debug, Default, Args)]
pub struct TelemetryConfig {
    /// OTLP/HTTP collector base URL, e.g. `http://localhost:4318`. Export is disabled when unset.
    #[arg(long, env = "PUSH_RELAY_OTLP_ENDPOINT")]
    pub otlp_endpoint: Option<String>,

    /// Log output format
    #[arg(long, env = "PUSH_RELAY_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

impl Config {
    #[must_use]
    pub fn load() -> Self {
        Self::parse()
    }
}
