//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the balancer.
//! All types derive Serde traits for deserialization from JSON or TOML files.
//! Router and backend keys also accept the legacy PascalCase JSON layout
//! (`BackendRouterConfigs`, `SelectionMethod`, `maxconnections`, ...).
//! The legacy top-level listener keys (`host`, `port`, `tlslistener`,
//! `certcrtpath`, `certkeypath`) are read through [`LegacyListener`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::load_balancer::SelectionMethod;
use crate::resilience::RetryPolicyKind;

/// Root configuration for the balancer.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct BalancerConfig {
    /// Listener configuration (bind address, TLS).
    pub listener: ListenerConfig,

    /// Routers: path/header claims plus the backends serving them.
    #[serde(alias = "BackendRouterConfigs")]
    pub routers: Vec<RouterConfig>,

    /// Active health check settings.
    pub health_check: HealthCheckConfig,

    /// Periodic pool statistics logging.
    pub stats: StatsConfig,

    /// Retry configuration.
    pub retries: RetryConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Per-request dispatch settings.
    pub dispatch: DispatchConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Optional TLS configuration.
    pub tls: Option<TlsConfig>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            tls: None,
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    #[serde(alias = "certcrtpath")]
    pub cert_path: String,

    /// Path to private key file (PEM).
    #[serde(alias = "certkeypath")]
    pub key_path: String,
}

/// One router: what it claims and which backends serve it.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RouterConfig {
    /// Identifier for logs. Defaults to `router-<index>`.
    #[serde(default)]
    pub name: Option<String>,

    /// Backend selection policy.
    #[serde(default, alias = "SelectionMethod")]
    pub selection_method: SelectionMethod,

    /// Path prefixes claimed by this router (case-insensitive).
    #[serde(default, alias = "AcceptedPaths")]
    pub accepted_paths: Vec<String>,

    /// Header name → value pairs claimed by this router.
    #[serde(default, alias = "AcceptedHeaders")]
    pub accepted_headers: BTreeMap<String, String>,

    /// Backend servers.
    #[serde(default, alias = "BackendConfigs")]
    pub backends: Vec<BackendConfig>,
}

/// Backend server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendConfig {
    /// Host name, IP or `http://` URL.
    pub host: String,

    /// Port; 0 means "take it from the host URL".
    #[serde(default)]
    pub port: u16,

    /// Admission ceiling. Zero, negative or omitted disables the backend.
    #[serde(default, alias = "maxconnections")]
    pub max_connections: i64,
}

/// Listener keys of the legacy flat JSON layout.
///
/// `{"host": "", "port": 443, "tlslistener": true, "certcrtpath": ..., "certkeypath": ...}`
/// sits next to `BackendRouterConfigs` at the top level. An empty host
/// listens on every interface.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LegacyListener {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub tlslistener: bool,
    pub certcrtpath: Option<String>,
    pub certkeypath: Option<String>,
}

impl LegacyListener {
    /// Fold the legacy keys into `listener`. Absent keys leave it untouched.
    pub fn apply(self, listener: &mut ListenerConfig) {
        if self.host.is_some() || self.port.is_some() {
            let current = listener.bind_address.parse::<std::net::SocketAddr>().ok();
            let host = match self.host.as_deref().map(str::trim) {
                Some("") => "0.0.0.0".to_string(),
                Some(host) => host.to_string(),
                None => current.map_or_else(|| "0.0.0.0".to_string(), |addr| addr.ip().to_string()),
            };
            let port = self.port.or(current.map(|addr| addr.port())).unwrap_or(8080);
            listener.bind_address = if host.contains(':') {
                format!("[{}]:{}", host, port)
            } else {
                format!("{}:{}", host, port)
            };
        }

        if self.tlslistener {
            listener.tls = Some(TlsConfig {
                cert_path: self.certcrtpath.unwrap_or_default(),
                key_path: self.certkeypath.unwrap_or_default(),
            });
        }
    }
}

/// Health check configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    /// Enable active health checks.
    pub enabled: bool,

    /// Health check interval in seconds.
    pub interval_secs: u64,

    /// Connect probe timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 10,
            timeout_secs: 3,
        }
    }
}

/// Stats loop configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StatsConfig {
    pub enabled: bool,
    pub interval_secs: u64,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 5,
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Which retry policy the dispatcher consults.
    pub policy: RetryPolicyKind,

    /// Retries after the first forwarding attempt before giving up.
    pub max_attempts: u32,

    /// Delay between attempts in milliseconds (base delay when exponential).
    pub backoff_ms: u64,

    /// Double the delay on each retry instead of keeping it fixed.
    pub exponential: bool,

    /// Cap for exponential backoff in milliseconds.
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            policy: RetryPolicyKind::default(),
            max_attempts: 10,
            backoff_ms: 50,
            exponential: false,
            max_backoff_ms: 2000,
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Upstream connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,

    /// Timeout for a single forwarding attempt in seconds.
    pub upstream_secs: u64,

    /// Idle upstream connection timeout in seconds.
    pub idle_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            request_secs: 30,
            upstream_secs: 10,
            idle_secs: 90,
        }
    }
}

/// Dispatch settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Largest request body buffered for (re)forwarding.
    pub max_body_bytes: usize,

    /// Try header claims when no path prefix matches.
    pub header_fallback: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: 2 * 1024 * 1024,
            header_fallback: false,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Compact,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log line format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::default(),
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
