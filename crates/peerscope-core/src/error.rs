// ── Core error types ──
//
// User-facing errors from peerscope-core. Transport failures arrive as
// `peerscope_api::Error` and are translated into the connection family with
// the device display name attached. Credentials never appear in messages.

use thiserror::Error;

/// How loudly a caller should present an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
    Danger,
}

/// Why a target failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum ValidationFailure {
    /// Contained in a rule's network but outside its `ge`/`le` bounds.
    OutOfRange,
    /// Matched a deny rule.
    Denied,
    /// No rule matched at all.
    NoMatch,
    /// Several targets given to a single-target directive.
    MultipleTargets,
    /// Target could not be parsed for the directive's field type.
    Format,
    /// An input plugin vetoed the target.
    Plugin,
}

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Input validation ─────────────────────────────────────────────
    #[error("{message}")]
    InputValidation {
        kind: ValidationFailure,
        target: String,
        message: String,
    },

    // ── Connection family ────────────────────────────────────────────
    #[error("Authentication to {device} failed: {message}")]
    AuthenticationFailed { device: String, message: String },

    #[error("Connection to {device} timed out after {timeout_secs}s")]
    ConnectionTimeout { device: String, timeout_secs: u64 },

    #[error("Cannot connect to {device}: {reason}")]
    ConnectionFailed { device: String, reason: String },

    #[error("Cannot reach {device} through proxy {proxy}: {reason}")]
    TunnelFailed {
        device: String,
        proxy: String,
        reason: String,
    },

    #[error("{device} returned an empty response")]
    EmptyResponse { device: String },

    // ── Parsing ──────────────────────────────────────────────────────
    #[error("Failed to parse {parser} output: {message}")]
    Parsing { parser: String, message: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    // ── Pipeline ─────────────────────────────────────────────────────
    #[error("Plugin {plugin} failed: {message}")]
    Plugin { plugin: String, message: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub fn validation(
        kind: ValidationFailure,
        target: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InputValidation {
            kind,
            target: target.into(),
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn parsing(parser: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Parsing {
            parser: parser.into(),
            message: message.to_string(),
        }
    }

    pub fn plugin(plugin: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Plugin {
            plugin: plugin.into(),
            message: message.to_string(),
        }
    }

    /// Presentation severity.
    pub fn severity(&self) -> Severity {
        match self {
            Self::InputValidation { .. } | Self::Plugin { .. } => Severity::Error,
            Self::EmptyResponse { .. } => Severity::Warning,
            Self::AuthenticationFailed { .. }
            | Self::ConnectionTimeout { .. }
            | Self::ConnectionFailed { .. }
            | Self::TunnelFailed { .. }
            | Self::Parsing { .. }
            | Self::Configuration { .. }
            | Self::Internal(_) => Severity::Danger,
        }
    }

    /// Fatal errors never travel with a partial result.
    pub fn is_fatal(&self) -> bool {
        self.severity() >= Severity::Error
    }

    pub fn validation_kind(&self) -> Option<ValidationFailure> {
        match self {
            Self::InputValidation { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Translate a transport failure, naming the device (and proxy, if any).
    pub fn from_transport(err: peerscope_api::Error, device: &str, proxy: Option<&str>) -> Self {
        use peerscope_api::Error as Api;

        let device = device.to_owned();
        match err {
            e if e.is_auth() => Self::AuthenticationFailed {
                device,
                message: e.to_string(),
            },
            Api::Tunnel { proxy, message } => Self::TunnelFailed {
                device,
                proxy,
                reason: message,
            },
            Api::Timeout { timeout_secs } => Self::ConnectionTimeout {
                device,
                timeout_secs,
            },
            Api::EmptyResponse => Self::EmptyResponse { device },
            Api::Transport(ref e) if e.is_timeout() => Self::ConnectionTimeout {
                device,
                timeout_secs: 0,
            },
            Api::Deserialization { message, body: _ } => Self::Parsing {
                parser: "signed response".into(),
                message,
            },
            other => match proxy {
                Some(proxy) => Self::TunnelFailed {
                    device,
                    proxy: proxy.to_owned(),
                    reason: other.to_string(),
                },
                None => Self::ConnectionFailed {
                    device,
                    reason: other.to_string(),
                },
            },
        }
    }
}
