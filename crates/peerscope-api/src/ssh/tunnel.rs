use std::net::SocketAddr;
use std::sync::Arc;

use russh::client::{self, Handle};
use russh::Disconnect;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::session::{authenticate, connect_error};
use super::{DeviceHandler, SshConfig, SshSession};
use crate::auth::{Endpoint, SshCredentials};
use crate::error::Error;

/// Local port forward to a device through an SSH jump host.
///
/// The tunnel binds `127.0.0.1:0`; connections accepted there are carried to
/// the remote endpoint over `direct-tcpip` channels on the proxy session.
/// Dropping the tunnel cancels the forwarder and releases the proxy session.
pub struct ProxyTunnel {
    proxy_name: String,
    local_addr: SocketAddr,
    proxy: Arc<Handle<DeviceHandler>>,
    cancel: CancellationToken,
}

impl ProxyTunnel {
    /// Authenticate to the proxy and start forwarding to `remote`.
    ///
    /// Every failure in here is reported as [`Error::Tunnel`] naming the proxy.
    pub async fn open(
        proxy_name: &str,
        proxy: &Endpoint,
        credentials: &SshCredentials,
        remote: &Endpoint,
        config: &SshConfig,
    ) -> Result<Self, Error> {
        let tunnel_err = |message: String| Error::Tunnel {
            proxy: proxy_name.to_owned(),
            message,
        };

        let budget = config.connect_timeout;
        let handle = tokio::time::timeout(budget, async {
            let mut handle = client::connect(
                config.client_config(),
                (proxy.host.as_str(), proxy.port),
                DeviceHandler::new(&proxy.host),
            )
            .await
            .map_err(|e| connect_error(proxy, e))?;
            authenticate(&mut handle, credentials).await?;
            Ok::<_, Error>(handle)
        })
        .await
        .map_err(|_| tunnel_err(format!("timed out after {}s", budget.as_secs())))?
        .map_err(|e| tunnel_err(e.to_string()))?;

        let listener = TcpListener::bind(("127.0.0.1", 0))
            .await
            .map_err(|e| tunnel_err(format!("failed to bind local port: {e}")))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| tunnel_err(format!("failed to read local address: {e}")))?;

        let proxy_handle = Arc::new(handle);
        let cancel = CancellationToken::new();

        tokio::spawn(forward(
            listener,
            Arc::clone(&proxy_handle),
            remote.clone(),
            cancel.clone(),
        ));

        debug!(
            proxy = proxy_name,
            local = %local_addr,
            remote = %remote,
            "tunnel established"
        );

        Ok(Self {
            proxy_name: proxy_name.to_owned(),
            local_addr,
            proxy: proxy_handle,
            cancel,
        })
    }

    pub fn proxy_name(&self) -> &str {
        &self.proxy_name
    }

    /// The local endpoint that reaches the remote device.
    pub fn local_endpoint(&self) -> Endpoint {
        Endpoint::new(self.local_addr.ip().to_string(), self.local_addr.port())
    }

    /// Open an authenticated session to the remote device through the tunnel.
    pub async fn session(
        &self,
        remote: &Endpoint,
        credentials: &SshCredentials,
        config: &SshConfig,
    ) -> Result<SshSession, Error> {
        let local = self.local_endpoint();
        let budget = config.connect_timeout;

        tokio::time::timeout(budget, async {
            let stream = TcpStream::connect(self.local_addr).await?;
            let mut handle = client::connect_stream(
                config.client_config(),
                stream,
                DeviceHandler::new(&remote.host),
            )
            .await
            .map_err(|e| connect_error(&local, e))?;
            authenticate(&mut handle, credentials).await?;
            Ok::<_, Error>(SshSession::from_handle(handle, remote.clone()))
        })
        .await
        .map_err(|_| Error::Timeout {
            timeout_secs: budget.as_secs(),
        })?
    }

    /// Stop forwarding and disconnect from the proxy.
    pub async fn close(self) {
        self.cancel.cancel();
        if let Err(e) = self
            .proxy
            .disconnect(Disconnect::ByApplication, "", "en")
            .await
        {
            warn!(proxy = %self.proxy_name, error = %e, "proxy disconnect failed");
        }
    }
}

impl Drop for ProxyTunnel {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn forward(
    listener: TcpListener,
    proxy: Arc<Handle<DeviceHandler>>,
    remote: Endpoint,
    cancel: CancellationToken,
) {
    loop {
        let (mut socket, peer) = tokio::select! {
            () = cancel.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok(pair) => pair,
                Err(e) => {
                    warn!(error = %e, "tunnel accept failed");
                    break;
                }
            },
        };

        let proxy = Arc::clone(&proxy);
        let remote = remote.clone();
        let cancel = cancel.clone();

        tokio::spawn(async move {
            let channel = match proxy
                .channel_open_direct_tcpip(
                    remote.host.clone(),
                    u32::from(remote.port),
                    peer.ip().to_string(),
                    u32::from(peer.port()),
                )
                .await
            {
                Ok(channel) => channel,
                Err(e) => {
                    warn!(remote = %remote, error = %e, "direct-tcpip open failed");
                    return;
                }
            };

            let mut stream = channel.into_stream();
            tokio::select! {
                () = cancel.cancelled() => {}
                copied = tokio::io::copy_bidirectional(&mut socket, &mut stream) => {
                    if let Err(e) = copied {
                        debug!(remote = %remote, error = %e, "tunnel stream closed");
                    }
                }
            }
        });
    }
}
