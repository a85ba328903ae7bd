//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` variants into user-facing errors with
//! actionable help text and stable exit codes.

use miette::Diagnostic;
use thiserror::Error;

use peerscope_config::ConfigError;
use peerscope_core::{CoreError, ValidationFailure};

pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Query input ──────────────────────────────────────────────────
    #[error("{message}")]
    #[diagnostic(code(peerscope::rejected), help("{hint}"))]
    Rejected {
        message: String,
        hint: String,
    },

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(peerscope::validation))]
    Validation { field: String, reason: String },

    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(peerscope::not_found),
        help("Run: peerscope {list_command} to see what is available")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    // ── Device I/O ───────────────────────────────────────────────────
    #[error("Authentication to {device} failed")]
    #[diagnostic(
        code(peerscope::auth_failed),
        help(
            "{message}\n\
             Check the device's credential, or store a new password with:\n\
             peerscope credentials set <credential>"
        )
    )]
    AuthFailed { device: String, message: String },

    #[error("No secret configured for '{name}'")]
    #[diagnostic(
        code(peerscope::no_credentials),
        help(
            "Set password_env / signing_secret_env in the config, or run:\n\
             peerscope credentials set {name}"
        )
    )]
    NoCredentials { name: String },

    #[error("Could not connect to {device}")]
    #[diagnostic(code(peerscope::connection_failed), help("{reason}"))]
    ConnectionFailed { device: String, reason: String },

    #[error("Could not reach {device} through proxy {proxy}")]
    #[diagnostic(
        code(peerscope::tunnel_failed),
        help("{reason}\nCheck the proxy's address and credential.")
    )]
    TunnelFailed {
        device: String,
        proxy: String,
        reason: String,
    },

    #[error("{device} did not answer within {seconds}s")]
    #[diagnostic(
        code(peerscope::timeout),
        help("Raise params.request_timeout or try a narrower query.")
    )]
    Timeout { device: String, seconds: u64 },

    #[error("{device} returned an empty response")]
    #[diagnostic(
        code(peerscope::empty_response),
        help("The device accepted the command but printed nothing. Try --raw or another VRF.")
    )]
    EmptyResponse { device: String },

    // ── Output processing ────────────────────────────────────────────
    #[error("Could not parse {parser} output")]
    #[diagnostic(
        code(peerscope::parsing),
        help("{message}\nRe-run with --raw to see what the device returned.")
    )]
    Parsing { parser: String, message: String },

    #[error("Plugin {plugin} stopped the query")]
    #[diagnostic(code(peerscope::plugin), help("{message}"))]
    Plugin { plugin: String, message: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Configuration file not found")]
    #[diagnostic(
        code(peerscope::no_config),
        help(
            "Create one with: peerscope config init\n\
             Expected at: {path}"
        )
    )]
    NoConfig { path: String },

    #[error("{message}")]
    #[diagnostic(code(peerscope::configuration))]
    Configuration { message: String },

    #[error(transparent)]
    #[diagnostic(code(peerscope::config))]
    Config(Box<figment::Error>),

    #[error("Keyring error: {0}")]
    #[diagnostic(
        code(peerscope::keyring),
        help("Use password_env or signing_secret_env when no system keyring is available.")
    )]
    Keyring(String),

    #[error("Internal error: {0}")]
    #[diagnostic(code(peerscope::internal))]
    Internal(String),

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Rejected { .. } | Self::Validation { .. } => exit_code::USAGE,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::ConnectionFailed { .. } | Self::TunnelFailed { .. } => exit_code::CONNECTION,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            _ => exit_code::GENERAL,
        }
    }
}

fn rejection_hint(kind: ValidationFailure) -> &'static str {
    match kind {
        ValidationFailure::OutOfRange => "The prefix length is outside what this directive allows.",
        ValidationFailure::Denied => "This target is not allowed on this looking glass.",
        ValidationFailure::NoMatch => "No rule of this directive accepts the target.",
        ValidationFailure::MultipleTargets => "This directive takes a single target.",
        ValidationFailure::Format => "Check the target's format for this directive.",
        ValidationFailure::Plugin => "A query check rejected the target.",
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InputValidation { kind, message, .. } => CliError::Rejected {
                message,
                hint: rejection_hint(kind).into(),
            },
            CoreError::AuthenticationFailed { device, message } => {
                CliError::AuthFailed { device, message }
            }
            CoreError::ConnectionTimeout {
                device,
                timeout_secs,
            } => CliError::Timeout {
                device,
                seconds: timeout_secs,
            },
            CoreError::ConnectionFailed { device, reason } => {
                CliError::ConnectionFailed { device, reason }
            }
            CoreError::TunnelFailed {
                device,
                proxy,
                reason,
            } => CliError::TunnelFailed {
                device,
                proxy,
                reason,
            },
            CoreError::EmptyResponse { device } => CliError::EmptyResponse { device },
            CoreError::Parsing { parser, message } => CliError::Parsing { parser, message },
            CoreError::Plugin { plugin, message } => CliError::Plugin { plugin, message },
            CoreError::Configuration { message } => CliError::Configuration { message },
            CoreError::Internal(message) => CliError::Internal(message),
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::NoCredentials { name } => CliError::NoCredentials { name },
            ConfigError::Figment(e) => CliError::Config(e),
            ConfigError::Keyring(e) => CliError::Keyring(e.to_string()),
            ConfigError::Io(e) => CliError::Io(e),
            other @ (ConfigError::Exists { .. } | ConfigError::Serialization(_)) => {
                CliError::Configuration {
                    message: other.to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_follow_error_family() {
        let denied = CliError::from(CoreError::validation(
            ValidationFailure::Denied,
            "10.0.0.0/8",
            "10.0.0.0/8 is not allowed",
        ));
        assert_eq!(denied.exit_code(), exit_code::USAGE);

        let timeout = CliError::from(CoreError::ConnectionTimeout {
            device: "Edge 1".into(),
            timeout_secs: 90,
        });
        assert_eq!(timeout.exit_code(), exit_code::TIMEOUT);

        let tunnel = CliError::from(CoreError::TunnelFailed {
            device: "Edge 1".into(),
            proxy: "jump".into(),
            reason: "refused".into(),
        });
        assert_eq!(tunnel.exit_code(), exit_code::CONNECTION);

        let auth = CliError::from(ConfigError::NoCredentials { name: "lg".into() });
        assert_eq!(auth.exit_code(), exit_code::AUTH);

        let parsing = CliError::from(CoreError::parsing("juniper", "bad xml"));
        assert_eq!(parsing.exit_code(), exit_code::GENERAL);
    }
}
