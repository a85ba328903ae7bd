// SSH session transport.
//
// `SshSession` runs commands over a direct connection. `ProxyTunnel` binds a
// local ephemeral port that forwards to the device through a jump host, so the
// same session code runs unchanged on top of it.

mod session;
mod tunnel;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use russh::client;
use russh_keys::key;
use tracing::debug;

pub use session::SshSession;
pub use tunnel::ProxyTunnel;

/// Tuning for SSH connections.
#[derive(Debug, Clone)]
pub struct SshConfig {
    /// Budget for TCP connect + key exchange + authentication.
    pub connect_timeout: Duration,
    /// Drop the session after this much silence.
    pub inactivity_timeout: Option<Duration>,
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            inactivity_timeout: Some(Duration::from_secs(60)),
        }
    }
}

impl SshConfig {
    pub(crate) fn client_config(&self) -> Arc<client::Config> {
        Arc::new(client::Config {
            inactivity_timeout: self.inactivity_timeout,
            ..client::Config::default()
        })
    }
}

/// Client handler shared by device sessions and proxy tunnels.
///
/// Network devices are reached by address from inventory, so host keys are
/// accepted and logged rather than pinned.
pub(crate) struct DeviceHandler {
    host: String,
}

impl DeviceHandler {
    pub(crate) fn new(host: &str) -> Self {
        Self { host: host.to_owned() }
    }
}

#[async_trait]
impl client::Handler for DeviceHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &key::PublicKey,
    ) -> Result<bool, Self::Error> {
        debug!(
            host = %self.host,
            fingerprint = %server_public_key.fingerprint(),
            "accepting host key"
        );
        Ok(true)
    }
}
