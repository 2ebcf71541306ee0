//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (intervals and timeouts > 0, addresses parse)
//! - Check every router claims something and every backend host parses
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: BalancerConfig → Result<(), Vec<ValidationError>>
//! - Route conflicts are not checked here; the route table rejects the
//!   offending router at registration without failing the whole config

use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::BalancerConfig;
use crate::net::upstream::Upstream;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Check a parsed configuration for semantic errors.
pub fn validate_config(config: &BalancerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("{:?} is not a socket address", config.listener.bind_address),
        ));
    }
    if let Some(tls) = &config.listener.tls {
        if tls.cert_path.trim().is_empty() {
            errors.push(ValidationError::new("listener.tls.cert_path", "must not be empty"));
        }
        if tls.key_path.trim().is_empty() {
            errors.push(ValidationError::new("listener.tls.key_path", "must not be empty"));
        }
    }

    if config.health_check.enabled {
        if config.health_check.interval_secs == 0 {
            errors.push(ValidationError::new("health_check.interval_secs", "must be greater than zero"));
        }
        if config.health_check.timeout_secs == 0 {
            errors.push(ValidationError::new("health_check.timeout_secs", "must be greater than zero"));
        }
    }
    if config.stats.enabled && config.stats.interval_secs == 0 {
        errors.push(ValidationError::new("stats.interval_secs", "must be greater than zero"));
    }

    let timeouts = [
        ("timeouts.connect_secs", config.timeouts.connect_secs),
        ("timeouts.request_secs", config.timeouts.request_secs),
        ("timeouts.upstream_secs", config.timeouts.upstream_secs),
    ];
    for (field, value) in timeouts {
        if value == 0 {
            errors.push(ValidationError::new(field, "must be greater than zero"));
        }
    }

    if config.dispatch.max_body_bytes == 0 {
        errors.push(ValidationError::new("dispatch.max_body_bytes", "must be greater than zero"));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("{:?} is not a socket address", config.observability.metrics_address),
        ));
    }

    for (i, router) in config.routers.iter().enumerate() {
        let prefix = format!("routers[{}]", i);
        if router.accepted_paths.is_empty() && router.accepted_headers.is_empty() {
            errors.push(ValidationError::new(
                prefix.clone(),
                "declares neither accepted_paths nor accepted_headers",
            ));
        }
        for (j, backend) in router.backends.iter().enumerate() {
            if let Err(e) = Upstream::parse(&backend.host, backend.port) {
                errors.push(ValidationError::new(
                    format!("{}.backends[{}].host", prefix, j),
                    e.to_string(),
                ));
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
