// ── Execution connector ──
//
// Runs synthesized commands on a device over whichever transport its
// inventory entry names. Every session and tunnel lives only for the
// duration of one call; cancelling the returned future drops them, which
// closes the underlying connections.

use std::time::Duration;

use async_trait::async_trait;
use peerscope_api::{
    ProxyTunnel, SignedClient, SshConfig, SshCredentials, SshSession, TlsMode, TransportConfig,
};
use secrecy::SecretString;
use tracing::{debug, info};

use crate::config::{Device, DeviceTransport, Proxy};
use crate::error::CoreError;

/// Executes commands on a device and returns one output per command.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn execute(&self, device: &Device, commands: &[String]) -> Result<Vec<String>, CoreError>;
}

/// The production connector: SSH (direct or proxied) or signed HTTP.
#[derive(Debug, Clone)]
pub struct DeviceConnector {
    ssh: SshConfig,
    http_timeout: Duration,
}

impl Default for DeviceConnector {
    fn default() -> Self {
        Self {
            ssh: SshConfig::default(),
            http_timeout: Duration::from_secs(30),
        }
    }
}

impl DeviceConnector {
    pub fn new(ssh: SshConfig, http_timeout: Duration) -> Self {
        Self { ssh, http_timeout }
    }

    async fn run_direct(
        &self,
        device: &Device,
        credential: &SshCredentials,
        commands: &[String],
    ) -> Result<Vec<String>, CoreError> {
        let name = device.display_name.as_str();
        let session = SshSession::connect(&device.endpoint(), credential, &self.ssh)
            .await
            .map_err(|e| CoreError::from_transport(e, name, None))?;
        let result = session.run_all(commands).await;
        session.close().await;
        result.map_err(|e| CoreError::from_transport(e, name, None))
    }

    async fn run_proxied(
        &self,
        device: &Device,
        credential: &SshCredentials,
        proxy: &Proxy,
        commands: &[String],
    ) -> Result<Vec<String>, CoreError> {
        let name = device.display_name.as_str();
        let remote = device.endpoint();
        let tunnel = ProxyTunnel::open(
            &proxy.name,
            &proxy.endpoint,
            &proxy.credential,
            &remote,
            &self.ssh,
        )
        .await
        .map_err(|e| CoreError::from_transport(e, name, Some(&proxy.name)))?;

        let session = match tunnel.session(&remote, credential, &self.ssh).await {
            Ok(session) => session,
            Err(e) => {
                tunnel.close().await;
                return Err(CoreError::from_transport(e, name, Some(&proxy.name)));
            }
        };
        let result = session.run_all(commands).await;
        session.close().await;
        tunnel.close().await;
        result.map_err(|e| CoreError::from_transport(e, name, None))
    }

    async fn run_signed(
        &self,
        device: &Device,
        secret: &SecretString,
        tls: &TlsMode,
        commands: &[String],
    ) -> Result<Vec<String>, CoreError> {
        let name = device.display_name.as_str();
        let transport = TransportConfig::new(tls.clone(), self.http_timeout);
        let client = SignedClient::new(&device.address, device.port, secret.clone(), &transport)
            .map_err(|e| CoreError::from_transport(e, name, None))?;
        client
            .send_all(commands)
            .await
            .map_err(|e| CoreError::from_transport(e, name, None))
    }
}

#[async_trait]
impl Connector for DeviceConnector {
    async fn execute(&self, device: &Device, commands: &[String]) -> Result<Vec<String>, CoreError> {
        info!(
            device = %device.name,
            transport = %device.transport.kind(),
            proxy = device.transport.proxy().map(|p| p.name.as_str()),
            command_count = commands.len(),
            "executing commands"
        );
        let outputs = match &device.transport {
            DeviceTransport::Session {
                credential,
                proxy: None,
            } => self.run_direct(device, credential, commands).await?,
            DeviceTransport::Session {
                credential,
                proxy: Some(proxy),
            } => {
                self.run_proxied(device, credential, proxy, commands)
                    .await?
            }
            DeviceTransport::Signed { secret, tls } => {
                self.run_signed(device, secret, tls, commands).await?
            }
        };
        debug!(
            device = %device.name,
            bytes = outputs.iter().map(String::len).sum::<usize>(),
            "device responded"
        );
        Ok(outputs)
    }
}
