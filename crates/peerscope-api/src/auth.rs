use std::path::PathBuf;

use secrecy::SecretString;

/// Secret material for an SSH login.
#[derive(Debug, Clone)]
pub enum SshSecret {
    /// Keyboard password.
    Password(SecretString),
    /// Private key file with an optional passphrase.
    KeyFile {
        path: PathBuf,
        passphrase: Option<SecretString>,
    },
}

/// Credentials for authenticating an SSH session (device or proxy).
#[derive(Debug, Clone)]
pub struct SshCredentials {
    pub username: String,
    pub secret: SshSecret,
}

impl SshCredentials {
    pub fn password(username: impl Into<String>, password: SecretString) -> Self {
        Self {
            username: username.into(),
            secret: SshSecret::Password(password),
        }
    }

    pub fn key_file(username: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            username: username.into(),
            secret: SshSecret::KeyFile {
                path: path.into(),
                passphrase: None,
            },
        }
    }
}

/// Where an SSH session should be opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_display_brackets_ipv6() {
        assert_eq!(Endpoint::new("192.0.2.1", 22).to_string(), "192.0.2.1:22");
        assert_eq!(Endpoint::new("2001:db8::1", 830).to_string(), "[2001:db8::1]:830");
    }
}
