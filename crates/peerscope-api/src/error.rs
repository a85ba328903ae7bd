use thiserror::Error;

/// Top-level error type for the `peerscope-api` crate.
///
/// Covers every failure mode across the device transports:
/// SSH sessions, proxy tunnels, signed HTTP requests, and the RPKI client.
/// `peerscope-core` maps these into the connection error family.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// The device (or proxy) rejected the supplied credential.
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    // ── Connection ──────────────────────────────────────────────────
    /// The session or request did not complete within its budget.
    #[error("Connection timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// TCP connect, handshake, or channel failure.
    #[error("Connection error: {message}")]
    Connection { message: String },

    /// The proxy tunnel could not be established.
    #[error("Tunnel through proxy '{proxy}' failed: {message}")]
    Tunnel { proxy: String, message: String },

    /// Every command returned empty output.
    #[error("Device returned an empty response")]
    EmptyResponse,

    // ── SSH ─────────────────────────────────────────────────────────
    /// Protocol-level SSH error.
    #[error("SSH error: {0}")]
    Ssh(#[from] russh::Error),

    /// Private key could not be loaded or decoded.
    #[error("SSH key error: {0}")]
    Key(#[from] russh_keys::Error),

    // ── HTTP ────────────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS handshake or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    /// Unexpected HTTP status from a device or collaborator.
    #[error("Unexpected HTTP status {status}: {body}")]
    Status { status: u16, body: String },

    // ── Signed requests ─────────────────────────────────────────────
    /// Token signing or verification failed.
    #[error("Token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },

    /// Local socket or file error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Returns `true` if the credential was rejected.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Authentication { .. })
            || matches!(self, Self::Status { status: 401 | 403, .. })
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Timeout { .. } | Self::Connection { .. } | Self::Tunnel { .. } => true,
            _ => false,
        }
    }

    /// Returns `true` if the failure happened while building the proxy tunnel.
    pub fn is_tunnel(&self) -> bool {
        matches!(self, Self::Tunnel { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_401_counts_as_auth() {
        let err = Error::Status {
            status: 401,
            body: String::new(),
        };
        assert!(err.is_auth());
        assert!(!err.is_transient());
    }

    #[test]
    fn tunnel_errors_name_the_proxy() {
        let err = Error::Tunnel {
            proxy: "jump01".into(),
            message: "connection refused".into(),
        };
        assert!(err.is_tunnel());
        assert!(err.to_string().contains("jump01"));
    }
}
