//! Gateway configuration.
//!
//! Everything is settable from the command line or environment; defaults are
//! chosen for a local single-node deployment. The caller identity header
//! name is configuration, not a hardcoded constant, and upstream TLS
//! verification can only be weakened by an explicit opt-in flag.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use axum::http::HeaderName;
use axum::http::header::InvalidHeaderName;
use clap::{Parser, ValueEnum};

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Plain,
    Json,
}

/// Runtime configuration for the gateway process.
#[derive(Debug, Parser)]
#[command(
    name = "meshgate",
    version,
    about = "Authorizing reverse proxy and service registry for internal service meshes"
)]
pub struct GatewayConfig {
    /// Socket address the gateway listens on.
    #[arg(long, env = "MESHGATE_LISTEN", default_value = "127.0.0.1:7300")]
    pub listen: SocketAddr,

    /// Path of the JSON file backing the service registry.
    #[arg(long, env = "MESHGATE_STORE", default_value = "meshgate-services.json")]
    pub store: PathBuf,

    /// Header carrying the caller's service identity on proxied requests.
    #[arg(
        long,
        env = "MESHGATE_IDENTITY_HEADER",
        default_value = "x-meshgate-caller"
    )]
    pub identity_header: String,

    /// Timeout for a single upstream call, e.g. "30s" or "2m".
    #[arg(
        long,
        env = "MESHGATE_UPSTREAM_TIMEOUT",
        default_value = "30s",
        value_parser = humantime::parse_duration
    )]
    pub upstream_timeout: Duration,

    /// Skip upstream TLS certificate verification. Dangerous; only for
    /// meshes running on self-signed internal certificates.
    #[arg(long, env = "MESHGATE_INSECURE_UPSTREAM_TLS")]
    pub insecure_upstream_tls: bool,

    /// Log output format.
    #[arg(long, env = "MESHGATE_LOG_FORMAT", value_enum, default_value = "plain")]
    pub log_format: LogFormat,
}

impl GatewayConfig {
    /// Validated identity header name (lowercased per HTTP semantics).
    pub fn identity_header_name(&self) -> Result<HeaderName, InvalidHeaderName> {
        HeaderName::from_bytes(self.identity_header.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GatewayConfig::try_parse_from(["meshgate"]).unwrap();
        assert_eq!(config.listen, "127.0.0.1:7300".parse().unwrap());
        assert_eq!(config.identity_header, "x-meshgate-caller");
        assert_eq!(config.upstream_timeout, Duration::from_secs(30));
        assert!(!config.insecure_upstream_tls);
        assert_eq!(config.log_format, LogFormat::Plain);
    }

    #[test]
    fn test_flags_override_defaults() {
        let config = GatewayConfig::try_parse_from([
            "meshgate",
            "--listen",
            "0.0.0.0:9000",
            "--identity-header",
            "X-Internal-Caller",
            "--upstream-timeout",
            "45s",
            "--insecure-upstream-tls",
            "--log-format",
            "json",
        ])
        .unwrap();

        assert_eq!(config.listen, "0.0.0.0:9000".parse().unwrap());
        assert_eq!(config.upstream_timeout, Duration::from_secs(45));
        assert!(config.insecure_upstream_tls);
        assert_eq!(config.log_format, LogFormat::Json);
        // header names normalize to lowercase
        assert_eq!(
            config.identity_header_name().unwrap().as_str(),
            "x-internal-caller"
        );
    }

    #[test]
    fn test_invalid_identity_header_is_rejected() {
        let config = GatewayConfig::try_parse_from([
            "meshgate",
            "--identity-header",
            "not a header name",
        ])
        .unwrap();
        assert!(config.identity_header_name().is_err());
    }

    #[test]
    fn test_bad_timeout_is_rejected() {
        assert!(
            GatewayConfig::try_parse_from(["meshgate", "--upstream-timeout", "soon"]).is_err()
        );
    }
}
