// Shared transport configuration for building reqwest::Client instances.
//
// The signed-request client and the RPKI client share TLS and timeout
// settings through this module.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::Error;

/// TLS verification mode for HTTP transports.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsMode {
    /// Plain HTTP. No TLS is negotiated.
    #[default]
    Disabled,
    /// Use the system certificate store.
    System,
    /// Trust exactly the PEM certificate at this path (device-pinned cert).
    Pinned(PathBuf),
    /// Accept any certificate.
    DangerAcceptInvalid,
}

impl TlsMode {
    /// URL scheme implied by this mode.
    pub fn scheme(&self) -> &'static str {
        match self {
            Self::Disabled => "http",
            Self::System | Self::Pinned(_) | Self::DangerAcceptInvalid => "https",
        }
    }
}

/// Shared transport configuration for building HTTP clients.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub tls: TlsMode,
    pub timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            tls: TlsMode::System,
            timeout: Duration::from_secs(30),
        }
    }
}

impl TransportConfig {
    pub fn new(tls: TlsMode, timeout: Duration) -> Self {
        Self { tls, timeout }
    }

    /// Build a `reqwest::Client` from this config.
    pub fn build_client(&self) -> Result<reqwest::Client, Error> {
        let mut builder = reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(concat!("peerscope/", env!("CARGO_PKG_VERSION")));

        match &self.tls {
            TlsMode::Disabled | TlsMode::System => {}
            TlsMode::Pinned(path) => {
                let cert_pem = std::fs::read(path)
                    .map_err(|e| Error::Tls(format!("failed to read device cert: {e}")))?;
                let cert = reqwest::Certificate::from_pem(&cert_pem)
                    .map_err(|e| Error::Tls(format!("invalid device cert: {e}")))?;
                builder = builder
                    .tls_built_in_root_certs(false)
                    .add_root_certificate(cert);
            }
            TlsMode::DangerAcceptInvalid => {
                builder = builder.danger_accept_invalid_certs(true);
            }
        }

        builder
            .build()
            .map_err(|e| Error::Tls(format!("failed to build HTTP client: {e}")))
    }
}
