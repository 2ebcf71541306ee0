//! Upstream authority parsing.
//!
//! A backend is configured as a host (bare name, IP or URL) plus an optional
//! port. Everything downstream of configuration works with the normalized
//! [`Upstream`]: a scheme and a `host:port` authority.

use std::fmt;

use axum::http::uri::{Authority, Scheme};
use thiserror::Error;
use url::Url;

/// Error raised for a backend definition that cannot be turned into an authority.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("backend host is empty")]
    EmptyHost,
    #[error("invalid backend url {input:?}: {source}")]
    InvalidUrl {
        input: String,
        #[source]
        source: url::ParseError,
    },
    #[error("backend url {0:?} has no host")]
    MissingHost(String),
    #[error("unsupported upstream scheme {0:?} (only http is forwarded)")]
    UnsupportedScheme(String),
    #[error("backend {0:?} has no port and its scheme has no default")]
    MissingPort(String),
    #[error("invalid authority {authority:?}: {reason}")]
    InvalidAuthority { authority: String, reason: String },
}

/// Normalized upstream target of a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upstream {
    scheme: Scheme,
    authority: Authority,
}

impl Upstream {
    /// Build an upstream from a configured host and port.
    ///
    /// `host` may be `10.0.0.1`, `api.internal` or `http://api.internal:8080`.
    /// A non-zero `port` overrides whatever port the host carries.
    pub fn parse(host: &str, port: u16) -> Result<Self, UpstreamError> {
        let host = host.trim();
        if host.is_empty() {
            return Err(UpstreamError::EmptyHost);
        }

        let raw = if host.contains("://") {
            host.to_string()
        } else {
            format!("http://{}", host)
        };
        let url = Url::parse(&raw).map_err(|source| UpstreamError::InvalidUrl {
            input: host.to_string(),
            source,
        })?;

        if url.scheme() != "http" {
            return Err(UpstreamError::UnsupportedScheme(url.scheme().to_string()));
        }

        let host_str = url
            .host_str()
            .ok_or_else(|| UpstreamError::MissingHost(host.to_string()))?;
        let port = if port != 0 {
            port
        } else {
            url.port_or_known_default()
                .ok_or_else(|| UpstreamError::MissingPort(host.to_string()))?
        };

        let authority_str = format!("{}:{}", host_str, port);
        let authority: Authority =
            authority_str
                .parse()
                .map_err(|e: axum::http::uri::InvalidUri| UpstreamError::InvalidAuthority {
                    authority: authority_str.clone(),
                    reason: e.to_string(),
                })?;

        Ok(Self {
            scheme: Scheme::HTTP,
            authority,
        })
    }

    pub fn scheme(&self) -> &Scheme {
        &self.scheme
    }

    /// `host:port` of the upstream. Used for dialing, `Host` rewriting and as
    /// the backend's identity in logs and metrics.
    pub fn authority(&self) -> &Authority {
        &self.authority
    }
}

impl fmt::Display for Upstream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.scheme, self.authority)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_host_uses_configured_port() {
        let up = Upstream::parse("10.0.0.1", 8080).unwrap();
        assert_eq!(up.authority().as_str(), "10.0.0.1:8080");
        assert_eq!(up.to_string(), "http://10.0.0.1:8080");
    }

    #[test]
    fn url_host_keeps_its_port_unless_overridden() {
        let up = Upstream::parse("http://api.internal:9000", 0).unwrap();
        assert_eq!(up.authority().as_str(), "api.internal:9000");

        let up = Upstream::parse("http://api.internal:9000", 7000).unwrap();
        assert_eq!(up.authority().as_str(), "api.internal:7000");

        let up = Upstream::parse("http://api.internal", 0).unwrap();
        assert_eq!(up.authority().as_str(), "api.internal:80");
    }

    #[test]
    fn rejects_bad_definitions() {
        assert!(matches!(Upstream::parse("  ", 80), Err(UpstreamError::EmptyHost)));
        assert!(matches!(
            Upstream::parse("https://secure.internal", 443),
            Err(UpstreamError::UnsupportedScheme(_))
        ));
        assert!(Upstream::parse("http://", 80).is_err());
    }
}
